use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::error::DumpError;

/// A fixed-size little-endian element that can appear in a dump.
pub trait Element: Copy {
    const SIZE: usize;
    fn from_le(bytes: &[u8]) -> Self;
    fn put_le(self, out: &mut Vec<u8>);
}

macro_rules! impl_element {
    ($($t:ty),*) => {$(
        impl Element for $t {
            const SIZE: usize = std::mem::size_of::<$t>();

            fn from_le(bytes: &[u8]) -> Self {
                let mut b = [0u8; std::mem::size_of::<$t>()];
                b.copy_from_slice(bytes);
                <$t>::from_le_bytes(b)
            }

            fn put_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
        }
    )*};
}

impl_element!(i8, u8, i32, f32);

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> DumpError + '_ {
    move |source| DumpError::Io { path: path.to_path_buf(), source }
}

/// Reads a whole file, gunzipping it when the name ends in `.gz`.
pub fn read_bytes<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, DumpError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(io_err(path))?;
    let mut reader: Box<dyn Read> = if path.extension().is_some_and(|e| e == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).map_err(io_err(path))?;
    Ok(buf)
}

fn decode<T: Element>(path: &Path, bytes: &[u8]) -> Result<Vec<T>, DumpError> {
    if bytes.len() % T::SIZE != 0 {
        return Err(DumpError::Misaligned { path: path.to_path_buf(), len: bytes.len(), size: T::SIZE });
    }
    Ok(bytes.chunks_exact(T::SIZE).map(T::from_le).collect())
}

fn encode<T: Element>(values: &[T], out: &mut Vec<u8>) {
    out.reserve(values.len() * T::SIZE);
    for &v in values {
        v.put_le(out);
    }
}

/// Reads a raw dump: the file is nothing but elements.
pub fn read_elements<T: Element, P: AsRef<Path>>(path: P) -> Result<Vec<T>, DumpError> {
    let path = path.as_ref();
    let bytes = read_bytes(path)?;
    decode(path, &bytes)
}

/// Writes a raw dump.
pub fn write_elements<T: Element, P: AsRef<Path>>(path: P, values: &[T]) -> Result<(), DumpError> {
    let mut bytes = Vec::new();
    encode(values, &mut bytes);
    write_bytes(path, &bytes)
}

/// Reads a counted dump: `[i32 LE count][count elements]`.
pub fn read_counted<T: Element, P: AsRef<Path>>(path: P) -> Result<Vec<T>, DumpError> {
    let path = path.as_ref();
    let bytes = read_bytes(path)?;
    if bytes.len() < 4 {
        return Err(DumpError::MissingHeader { path: path.to_path_buf() });
    }
    let declared = <i32 as Element>::from_le(&bytes[..4]).max(0) as usize;
    let values = decode::<T>(path, &bytes[4..])?;
    if values.len() != declared {
        return Err(DumpError::CountMismatch { path: path.to_path_buf(), declared, found: values.len() });
    }
    Ok(values)
}

/// Writes a counted dump, used for variable-length arrays such as scales and zero points.
pub fn write_counted<T: Element, P: AsRef<Path>>(path: P, values: &[T]) -> Result<(), DumpError> {
    let mut bytes = Vec::with_capacity(4 + values.len() * T::SIZE);
    (values.len() as i32).put_le(&mut bytes);
    encode(values, &mut bytes);
    write_bytes(path, &bytes)
}

pub fn write_bytes<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<(), DumpError> {
    let path = path.as_ref();
    let file = File::create(path).map_err(io_err(path))?;
    let mut w = BufWriter::new(file);
    w.write_all(bytes).map_err(io_err(path))?;
    w.flush().map_err(io_err(path))
}

/// Reinterprets raw bytes as int8 values.
pub fn bytes_as_i8(bytes: &[u8]) -> Vec<i8> {
    bytes.iter().map(|&b| b as i8).collect()
}

/// Int8 values as raw bytes.
pub fn i8_as_bytes(values: &[i8]) -> Vec<u8> {
    values.iter().map(|&v| v as u8).collect()
}

/// Decodes little-endian int32 values from raw bytes. Trailing partial words are ignored.
pub fn bytes_as_i32(bytes: &[u8]) -> Vec<i32> {
    bytes.chunks_exact(4).map(<i32 as Element>::from_le).collect()
}
