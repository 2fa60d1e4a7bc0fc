use serde::{Deserialize, Serialize};

/// Affine quantization parameters: `real_value = scale * (quantized_value - zero_point)`.
///
/// A single entry describes per-tensor quantization. Per-channel quantization carries
/// one entry per slice along `quantized_dimension` (the output channel for filters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantParams {
    pub scale: Vec<f32>,
    pub zero_point: Vec<i32>,
    #[serde(default)]
    pub quantized_dimension: usize,
}

impl QuantParams {
    pub fn per_tensor(scale: f32, zero_point: i32) -> Self {
        QuantParams { scale: vec![scale], zero_point: vec![zero_point], quantized_dimension: 0 }
    }

    /// Per-channel parameters. Panics if `scale` and `zero_point` differ in length.
    pub fn per_channel(scale: Vec<f32>, zero_point: Vec<i32>, quantized_dimension: usize) -> Self {
        assert_eq!(scale.len(), zero_point.len(), "scale/zero_point length mismatch");
        QuantParams { scale, zero_point, quantized_dimension }
    }

    pub fn len(&self) -> usize {
        self.scale.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scale.is_empty()
    }

    pub fn is_per_channel(&self) -> bool {
        self.scale.len() > 1
    }

    /// Both arrays non-empty, equally long, and every zero point representable in `[min, max]`.
    pub fn is_valid_for(&self, min: i32, max: i32) -> bool {
        !self.scale.is_empty()
            && self.scale.len() == self.zero_point.len()
            && self.zero_point.iter().all(|&zp| zp >= min && zp <= max)
    }
}

/// Fixed-point form of a real scale ratio: `real ≈ multiplier * 2^-(31 + shift)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rescale {
    pub multiplier: i32,
    pub shift: i32,
}

impl Rescale {
    /// Multiplier 0.5 in Q31 with a one-bit left shift.
    pub const IDENTITY: Rescale = Rescale { multiplier: 1 << 30, shift: -1 };

    /// The real value this pair stands for.
    pub fn to_f64(self) -> f64 {
        self.multiplier as f64 * 2f64.powi(-(31 + self.shift))
    }
}

/// Splits `real` into a Q31 multiplier and shift.
///
/// Returns `None` when `real` is negative, not finite, or so large that the shift would
/// leave the Q31 window (ratios of `2^30` and above, including those whose mantissa rounds
/// up to it). Values too small to survive the 62-bit shift window collapse to a zero
/// multiplier.
pub fn try_quantize_multiplier(real: f64) -> Option<Rescale> {
    if !(real >= 0.0 && real.is_finite()) {
        return None;
    }
    if real == 0.0 {
        return Some(Rescale::default());
    }

    let (mantissa, mut exponent) = libm::frexp(real);
    let mut q = libm::round(mantissa * (1i64 << 31) as f64) as i64;
    debug_assert!(q <= 1i64 << 31);
    if q == 1i64 << 31 {
        q /= 2;
        exponent += 1;
    }

    let shift = -exponent;
    if shift > 31 {
        return Some(Rescale::default());
    }
    if shift <= -31 {
        return None;
    }
    Some(Rescale { multiplier: q as i32, shift })
}

/// Like [`try_quantize_multiplier`], for ratios known to be in range. Panics otherwise.
pub fn quantize_multiplier(real: f64) -> Rescale {
    match try_quantize_multiplier(real) {
        Some(r) => r,
        None => panic!("scale ratio {} cannot be represented as a Q31 rescale", real),
    }
}

/// Per-output-channel rescale parameters for a quantized convolution.
///
/// Each channel's ratio is `filter_scale[i] * (input_scale / output_scale)` in double
/// precision. A single filter scale is broadcast to `num_channels`. Returns `None` if any
/// channel's ratio is out of range for [`try_quantize_multiplier`].
pub fn try_compute_rescale(
    input_scale: f32,
    output_scale: f32,
    filter_scales: &[f32],
    num_channels: usize,
) -> Option<Vec<Rescale>> {
    assert!(
        filter_scales.len() == 1 || filter_scales.len() == num_channels,
        "expected 1 or {} filter scales, got {}",
        num_channels,
        filter_scales.len()
    );
    let ratio = input_scale as f64 / output_scale as f64;
    (0..num_channels)
        .map(|ch| {
            let filter_scale = if filter_scales.len() == 1 { filter_scales[0] } else { filter_scales[ch] };
            try_quantize_multiplier(filter_scale as f64 * ratio)
        })
        .collect()
}

/// Panicking form of [`try_compute_rescale`].
pub fn compute_rescale(input_scale: f32, output_scale: f32, filter_scales: &[f32], num_channels: usize) -> Vec<Rescale> {
    match try_compute_rescale(input_scale, output_scale, filter_scales, num_channels) {
        Some(r) => r,
        None => panic!("scale ratio cannot be represented as a Q31 rescale"),
    }
}

/// Applies a rescale to an accumulator with round-half-up, using 64-bit intermediates.
#[inline]
pub fn apply_rescale(acc: i32, rescale: Rescale) -> i32 {
    let total_shift = 31 + rescale.shift;
    debug_assert!((1..=62).contains(&total_shift), "rescale shift {} out of range", rescale.shift);
    let half = 1i64 << (total_shift - 1);
    ((acc as i64 * rescale.multiplier as i64 + half) >> total_shift) as i32
}

/// Activation fused into a convolution by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FusedActivation {
    #[default]
    None,
    Relu,
    Relu6,
    ReluN1To1,
}

/// Clamp range in the int8 output domain for a fused activation.
pub fn activation_range_i8(activation: FusedActivation, output_scale: f32, output_zero_point: i32) -> (i32, i32) {
    let qmin = i8::MIN as i32;
    let qmax = i8::MAX as i32;
    // Summed in i64: with a tiny output scale the rounded quotient saturates the cast.
    let quantize = |v: f32| {
        let q = output_zero_point as i64 + libm::roundf(v / output_scale) as i64;
        q.clamp(qmin as i64, qmax as i64) as i32
    };
    match activation {
        FusedActivation::None => (qmin, qmax),
        FusedActivation::Relu => (qmin.max(quantize(0.0)), qmax),
        FusedActivation::Relu6 => (qmin.max(quantize(0.0)), qmax.min(quantize(6.0))),
        FusedActivation::ReluN1To1 => (qmin.max(quantize(-1.0)), qmax.min(quantize(1.0))),
    }
}

/// Shifts raw uint8 image bytes into the int8 domain (`v - 128`).
pub fn offset_u8_to_i8(input: &[u8], output: &mut [i8]) {
    assert_eq!(input.len(), output.len(), "offset_u8_to_i8: length mismatch");
    for (o, &v) in output.iter_mut().zip(input) {
        *o = (v as i32 - 128) as i8;
    }
}

/// Quantizes real values to int8 with per-tensor parameters.
pub fn quantize_values(values: &[f32], scale: f32, zero_point: i32) -> Vec<i8> {
    values
        .iter()
        .map(|&v| (libm::roundf(v / scale) as i32 + zero_point).clamp(-128, 127) as i8)
        .collect()
}

/// Dequantize int8 values back to real values.
pub fn dequantize_values(values: &[i8], scale: f32, zero_point: i32) -> Vec<f32> {
    values.iter().map(|&v| (v as i32 - zero_point) as f32 * scale).collect()
}
