use std::fmt;

/// Storage order of a 4D tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// Batch, height, width, channel. The inference runtime's native order.
    #[default]
    Nhwc,
    /// Batch, channel, height, width.
    Nchw,
}

/// A 4D shape with a storage layout.
///
/// Every kernel addresses its flat buffers through [`Shape::offset`], so switching
/// between NHWC and NCHW storage only touches this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub number: usize,
    pub height: usize,
    pub width: usize,
    pub channel: usize,
    pub layout: Layout,
}

impl Shape {
    /// NHWC shape. Panics if any extent is zero.
    pub fn new(number: usize, height: usize, width: usize, channel: usize) -> Self {
        Self::with_layout(number, height, width, channel, Layout::Nhwc)
    }

    pub fn with_layout(number: usize, height: usize, width: usize, channel: usize, layout: Layout) -> Self {
        assert!(
            number > 0 && height > 0 && width > 0 && channel > 0,
            "shape extents must be positive, got {}x{}x{}x{}",
            number, height, width, channel
        );
        Shape { number, height, width, channel, layout }
    }

    /// Builds an NHWC shape from runtime dims of rank 1 to 4.
    ///
    /// Lower ranks are right-aligned: `[C]` becomes `1x1x1xC`, `[W, C]` becomes `1x1xWxC`.
    /// Returns `None` for rank 0, rank above 4, or any zero extent.
    pub fn from_dims(dims: &[usize]) -> Option<Self> {
        if dims.is_empty() || dims.len() > 4 || dims.contains(&0) {
            return None;
        }
        let mut full = [1usize; 4];
        full[4 - dims.len()..].copy_from_slice(dims);
        Some(Shape::new(full[0], full[1], full[2], full[3]))
    }

    pub fn num_elements(&self) -> usize {
        self.number * self.height * self.width * self.channel
    }

    /// Linear index of `(n, y, x, c)` in a flat buffer of this shape.
    #[inline]
    pub fn offset(&self, n: usize, y: usize, x: usize, c: usize) -> usize {
        debug_assert!(n < self.number, "n={} out of range for {}", n, self);
        debug_assert!(y < self.height, "y={} out of range for {}", y, self);
        debug_assert!(x < self.width, "x={} out of range for {}", x, self);
        debug_assert!(c < self.channel, "c={} out of range for {}", c, self);

        match self.layout {
            Layout::Nhwc => ((n * self.height + y) * self.width + x) * self.channel + c,
            Layout::Nchw => ((n * self.channel + c) * self.height + y) * self.width + x,
        }
    }
}

impl Default for Shape {
    fn default() -> Self {
        Shape::new(1, 1, 1, 1)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}x{} ({:?})", self.number, self.height, self.width, self.channel, self.layout)
    }
}
