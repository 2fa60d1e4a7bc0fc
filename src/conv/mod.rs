//! Convolution kernels.
//!
//! Provides the float reference convolution, the quantized int8 dense and depthwise
//! kernels, and the padding arithmetic shared by all of them. All kernels work on
//! caller-owned flat buffers addressed through [`Shape`](crate::tensor::Shape).

mod naive;
mod int8;
mod depthwise;
pub mod padding;

pub use naive::conv2d_reference;
pub use int8::conv2d_int8;
pub use depthwise::depthwise_conv2d_int8;
pub use padding::{compute_output_size, compute_padding, Padding, PaddingValues};

/// Stride, dilation and leading padding of a convolution window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvWindow {
    pub stride_height: usize,
    pub stride_width: usize,
    pub dilation_height: usize,
    pub dilation_width: usize,
    pub padding_height: usize,
    pub padding_width: usize,
}

impl ConvWindow {
    /// Window with unit dilation.
    pub fn new(stride_height: usize, stride_width: usize, padding_height: usize, padding_width: usize) -> Self {
        ConvWindow {
            stride_height,
            stride_width,
            dilation_height: 1,
            dilation_width: 1,
            padding_height,
            padding_width,
        }
    }

    pub fn with_dilation(mut self, dilation_height: usize, dilation_width: usize) -> Self {
        self.dilation_height = dilation_height;
        self.dilation_width = dilation_width;
        self
    }
}

impl Default for ConvWindow {
    fn default() -> Self {
        ConvWindow::new(1, 1, 0, 0)
    }
}

/// Integer parameters of a quantized convolution.
///
/// `input_offset` is added to every input value before multiplication (the negated
/// input zero point); `output_offset` is added after rescaling (the output zero point).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantConvParams {
    pub window: ConvWindow,
    pub input_offset: i32,
    pub output_offset: i32,
    pub activation_min: i32,
    pub activation_max: i32,
}

impl QuantConvParams {
    pub fn new(window: ConvWindow, input_offset: i32, output_offset: i32) -> Self {
        QuantConvParams {
            window,
            input_offset,
            output_offset,
            activation_min: i8::MIN as i32,
            activation_max: i8::MAX as i32,
        }
    }

    pub fn with_activation(mut self, activation_min: i32, activation_max: i32) -> Self {
        self.activation_min = activation_min;
        self.activation_max = activation_max;
        self
    }

    pub(crate) fn check(&self) {
        let w = &self.window;
        assert!(w.stride_height >= 1 && w.stride_width >= 1, "stride must be at least 1");
        assert!(w.dilation_height >= 1 && w.dilation_width >= 1, "dilation must be at least 1");
        assert!(
            self.activation_min <= self.activation_max,
            "activation_min {} > activation_max {}",
            self.activation_min, self.activation_max
        );
        assert!(
            self.activation_min >= i8::MIN as i32 && self.activation_max <= i8::MAX as i32,
            "activation range [{}, {}] exceeds int8",
            self.activation_min, self.activation_max
        );
    }
}
