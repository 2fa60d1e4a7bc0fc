use crate::quantization::{apply_rescale, Rescale};
use crate::tensor::Shape;
use super::QuantConvParams;

/// Per-channel quantized dense convolution, int8 in and out.
///
/// Filter layout is `[out_channels, kh, kw, in_channels]`, bias is one int32 per output
/// channel and `rescale` holds one entry per output channel.
///
/// For every output cell: accumulate `filter * (input + input_offset)` in i32 over the
/// taps that land inside the input, add the bias, rescale with round-half-up in i64,
/// add `output_offset`, clamp to the activation range and narrow to i8. Integer sums
/// wrap like the runtime's int32 arithmetic.
pub fn conv2d_int8(
    params: &QuantConvParams,
    rescale: &[Rescale],
    input_shape: &Shape,
    input: &[i8],
    filter_shape: &Shape,
    filter: &[i8],
    bias: &[i32],
    output_shape: &Shape,
    output: &mut [i8],
) {
    params.check();
    assert_eq!(input_shape.channel, filter_shape.channel, "Conv2d: input/filter channel mismatch");
    assert_eq!(filter_shape.number, output_shape.channel, "Conv2d: filter count != output channels");
    assert_eq!(bias.len(), output_shape.channel, "Conv2d: bias length != output channels");
    assert_eq!(rescale.len(), output_shape.channel, "Conv2d: rescale length != output channels");
    assert_eq!(input_shape.number, output_shape.number, "Conv2d: batch mismatch");
    assert!(input.len() >= input_shape.num_elements(), "Conv2d: input buffer too small");
    assert!(filter.len() >= filter_shape.num_elements(), "Conv2d: filter buffer too small");
    assert!(output.len() >= output_shape.num_elements(), "Conv2d: output buffer too small");

    let window = &params.window;
    let in_h = input_shape.height as isize;
    let in_w = input_shape.width as isize;

    for n in 0..output_shape.number {
        for out_y in 0..output_shape.height {
            let in_y_start = (out_y * window.stride_height) as isize - window.padding_height as isize;
            for out_x in 0..output_shape.width {
                let in_x_start = (out_x * window.stride_width) as isize - window.padding_width as isize;
                for oc in 0..output_shape.channel {
                    let mut acc: i32 = 0;
                    for ky in 0..filter_shape.height {
                        let in_y = in_y_start + (ky * window.dilation_height) as isize;
                        if in_y < 0 || in_y >= in_h {
                            continue;
                        }
                        for kx in 0..filter_shape.width {
                            let in_x = in_x_start + (kx * window.dilation_width) as isize;
                            if in_x < 0 || in_x >= in_w {
                                continue;
                            }
                            for ic in 0..input_shape.channel {
                                let v = input[input_shape.offset(n, in_y as usize, in_x as usize, ic)] as i32;
                                let w = filter[filter_shape.offset(oc, ky, kx, ic)] as i32;
                                acc = acc.wrapping_add(w * (v + params.input_offset));
                            }
                        }
                    }
                    acc = acc.wrapping_add(bias[oc]);
                    output[output_shape.offset(n, out_y, out_x, oc)] = requantize(acc, rescale[oc], params);
                }
            }
        }
    }
}

/// Rescale, offset, clamp and narrow one accumulator.
#[inline]
pub(super) fn requantize(acc: i32, rescale: Rescale, params: &QuantConvParams) -> i8 {
    let v = apply_rescale(acc, rescale).wrapping_add(params.output_offset);
    v.clamp(params.activation_min, params.activation_max) as i8
}
