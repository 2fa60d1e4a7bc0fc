use serde::{Deserialize, Serialize};

/// Padding mode recorded on a convolution node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Padding {
    /// Output extent is `ceil(input / stride)`; the input is padded as needed.
    Same,
    /// No padding; the window never leaves the input.
    Valid,
}

/// Leading padding and trailing asymmetry along one spatial axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaddingValues {
    /// Padding applied before the first output position.
    pub padding: usize,
    /// 1 when the total padding is odd; the extra pixel goes on the trailing side.
    pub offset: usize,
}

/// Derives the padding amount for an already-known output extent.
///
/// `total = max(0, (output - 1) * stride + ((filter - 1) * dilation + 1) - input)`,
/// split as `total / 2` leading and `total % 2` extra trailing.
pub fn compute_padding(stride: usize, dilation: usize, input: usize, filter: usize, output: usize) -> PaddingValues {
    debug_assert!(stride >= 1 && dilation >= 1 && output >= 1 && filter >= 1);
    let effective_filter = (filter - 1) * dilation + 1;
    let needed = (output - 1) * stride + effective_filter;
    let total = needed.saturating_sub(input);
    PaddingValues { padding: total / 2, offset: total % 2 }
}

/// Output extent the runtime computes for a padding mode. Zero when a VALID
/// window does not fit at all.
pub fn compute_output_size(padding: Padding, input: usize, filter: usize, stride: usize, dilation: usize) -> usize {
    let effective_filter = (filter - 1) * dilation + 1;
    match padding {
        Padding::Same => (input + stride - 1) / stride,
        Padding::Valid => {
            if input < effective_filter {
                0
            } else {
                (input - effective_filter + stride) / stride
            }
        }
    }
}
