use std::fmt;

/// Result of comparing a reference buffer with an emulated one byte by byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteComparison {
    /// Length of the reference buffer.
    pub len: usize,
    pub emulated_len: usize,
    /// Positions (within the common prefix) where the bytes differ.
    pub mismatches: usize,
    pub first_mismatch: Option<usize>,
    /// Largest difference when both buffers are read as int8.
    pub max_abs_diff: u8,
}

impl ByteComparison {
    /// Same length and no differing byte.
    pub fn is_exact(&self) -> bool {
        self.len == self.emulated_len && self.mismatches == 0
    }

    /// Fraction of compared positions that differ.
    pub fn mismatch_ratio(&self) -> f64 {
        let n = self.len.min(self.emulated_len);
        if n == 0 {
            return 0.0;
        }
        self.mismatches as f64 / n as f64
    }
}

impl fmt::Display for ByteComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_exact() {
            return write!(f, "{} bytes identical", self.len);
        }
        if self.len != self.emulated_len {
            write!(f, "length {} vs {}; ", self.len, self.emulated_len)?;
        }
        write!(
            f,
            "{} mismatching bytes ({:.2}%), max int8 diff {}",
            self.mismatches,
            self.mismatch_ratio() * 100.0,
            self.max_abs_diff
        )?;
        if let Some(i) = self.first_mismatch {
            write!(f, ", first at {}", i)?;
        }
        Ok(())
    }
}

/// Compares two raw buffers. Bytes are also read as int8 to report the largest
/// numeric deviation.
pub fn compare_bytes(reference: &[u8], emulated: &[u8]) -> ByteComparison {
    let mut mismatches = 0;
    let mut first_mismatch = None;
    let mut max_abs_diff = 0u8;
    for (i, (&r, &e)) in reference.iter().zip(emulated).enumerate() {
        if r != e {
            mismatches += 1;
            first_mismatch.get_or_insert(i);
            let diff = ((r as i8) as i16 - (e as i8) as i16).unsigned_abs() as u8;
            max_abs_diff = max_abs_diff.max(diff);
        }
    }
    if first_mismatch.is_none() && reference.len() != emulated.len() {
        first_mismatch = Some(reference.len().min(emulated.len()));
    }
    ByteComparison {
        len: reference.len(),
        emulated_len: emulated.len(),
        mismatches,
        first_mismatch,
        max_abs_diff,
    }
}
