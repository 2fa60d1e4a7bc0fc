use crate::quantization::Rescale;
use crate::tensor::Shape;
use super::int8::requantize;
use super::QuantConvParams;

/// Per-channel quantized depthwise convolution, int8 in and out.
///
/// Filter layout is `[1, kh, kw, in_channels * depth_multiplier]`. Output channel `oc`
/// reads only input channel `oc / depth_multiplier`. Accumulation, rescale, offsets and
/// clamping are the same as [`conv2d_int8`](super::conv2d_int8).
pub fn depthwise_conv2d_int8(
    params: &QuantConvParams,
    depth_multiplier: usize,
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
    assert!(depth_multiplier >= 1, "DepthwiseConv2d: depth multiplier must be at least 1");
    assert_eq!(filter_shape.number, 1, "DepthwiseConv2d: filter batch must be 1");
    assert_eq!(filter_shape.channel, output_shape.channel, "DepthwiseConv2d: filter channels != output channels");
    assert_eq!(
        output_shape.channel,
        input_shape.channel * depth_multiplier,
        "DepthwiseConv2d: output channels != input channels * depth multiplier"
    );
    assert_eq!(bias.len(), output_shape.channel, "DepthwiseConv2d: bias length != output channels");
    assert_eq!(rescale.len(), output_shape.channel, "DepthwiseConv2d: rescale length != output channels");
    assert_eq!(input_shape.number, output_shape.number, "DepthwiseConv2d: batch mismatch");
    assert!(input.len() >= input_shape.num_elements(), "DepthwiseConv2d: input buffer too small");
    assert!(filter.len() >= filter_shape.num_elements(), "DepthwiseConv2d: filter buffer too small");
    assert!(output.len() >= output_shape.num_elements(), "DepthwiseConv2d: output buffer too small");

    let window = &params.window;
    let in_h = input_shape.height as isize;
    let in_w = input_shape.width as isize;

    for n in 0..output_shape.number {
        for out_y in 0..output_shape.height {
            let in_y_start = (out_y * window.stride_height) as isize - window.padding_height as isize;
            for out_x in 0..output_shape.width {
                let in_x_start = (out_x * window.stride_width) as isize - window.padding_width as isize;
                for oc in 0..output_shape.channel {
                    let ic = oc / depth_multiplier;
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
                            let v = input[input_shape.offset(n, in_y as usize, in_x as usize, ic)] as i32;
                            let w = filter[filter_shape.offset(0, ky, kx, oc)] as i32;
                            acc = acc.wrapping_add(w * (v + params.input_offset));
                        }
                    }
                    acc = acc.wrapping_add(bias[oc]);
                    output[output_shape.offset(n, out_y, out_x, oc)] = requantize(acc, rescale[oc], params);
                }
            }
        }
    }
}
