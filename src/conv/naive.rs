use std::ops::{AddAssign, Mul};

use crate::tensor::Shape;
use super::ConvWindow;

/// Direct floating-point convolution (reference implementation).
///
/// Filter layout is `[out_channels, kh, kw, in_channels]`. Taps that fall outside the
/// input are skipped, which is the same as zero padding. Used as a correctness oracle
/// for the windowing logic, not for the quantized path.
pub fn conv2d_reference<T>(
    window: &ConvWindow,
    input_shape: &Shape,
    input: &[T],
    filter_shape: &Shape,
    filter: &[T],
    bias: &[T],
    output_shape: &Shape,
    output: &mut [T],
) where
    T: Copy + Default + AddAssign + Mul<Output = T>,
{
    assert_eq!(input_shape.channel, filter_shape.channel, "Conv2d: input/filter channel mismatch");
    assert_eq!(filter_shape.number, output_shape.channel, "Conv2d: filter count != output channels");
    assert_eq!(bias.len(), output_shape.channel, "Conv2d: bias length != output channels");
    assert_eq!(input_shape.number, output_shape.number, "Conv2d: batch mismatch");
    assert!(input.len() >= input_shape.num_elements());
    assert!(filter.len() >= filter_shape.num_elements());
    assert!(output.len() >= output_shape.num_elements());

    let in_h = input_shape.height as isize;
    let in_w = input_shape.width as isize;

    for n in 0..output_shape.number {
        for out_y in 0..output_shape.height {
            let in_y_start = (out_y * window.stride_height) as isize - window.padding_height as isize;
            for out_x in 0..output_shape.width {
                let in_x_start = (out_x * window.stride_width) as isize - window.padding_width as isize;
                for oc in 0..output_shape.channel {
                    let mut sum = T::default();
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
                                let v = input[input_shape.offset(n, in_y as usize, in_x as usize, ic)];
                                let w = filter[filter_shape.offset(oc, ky, kx, ic)];
                                sum += w * v;
                            }
                        }
                    }
                    sum += bias[oc];
                    output[output_shape.offset(n, out_y, out_x, oc)] = sum;
                }
            }
        }
    }
}
