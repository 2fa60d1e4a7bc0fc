use qconv::conv::{compute_padding, conv2d_int8, conv2d_reference, ConvWindow, QuantConvParams};
use qconv::quantization::{apply_rescale, dequantize_values, quantize_multiplier, quantize_values, Rescale};
use qconv::tensor::Shape;

/// Deterministic pseudo-random int8 values.
fn fill_i8(len: usize, seed: usize) -> Vec<i8> {
    (0..len).map(|i| (((i * 37 + seed * 11) % 251) as i32 - 125) as i8).collect()
}

#[test]
fn conv_int8_1x1_identity_rescale() {
    let shape = Shape::new(1, 1, 1, 1);
    let input_zero_point = 128;
    let output_zero_point = 128;
    let params = QuantConvParams::new(ConvWindow::default(), input_zero_point, -output_zero_point);
    let mut output = [0i8; 1];

    conv2d_int8(
        &params, &[Rescale::IDENTITY],
        &shape, &[(1 - 128) as i8],
        &shape, &[10],
        &[0],
        &shape, &mut output,
    );

    assert_eq!(output[0], (10 - 128) as i8);
}

#[test]
fn conv_int8_1x1_two_filters() {
    let input_shape = Shape::new(1, 1, 1, 1);
    let filter_shape = Shape::new(2, 1, 1, 1);
    let output_shape = Shape::new(1, 1, 1, 2);
    let zero_point = 128;
    let params = QuantConvParams::new(ConvWindow::default(), zero_point, -zero_point);
    let mut output = [0i8; 2];

    conv2d_int8(
        &params, &[Rescale::IDENTITY; 2],
        &input_shape, &[(1 - zero_point) as i8],
        &filter_shape, &[1, -1],
        &[-1, 123],
        &output_shape, &mut output,
    );

    assert_eq!(output, [(0 - zero_point) as i8, (122 - zero_point) as i8]);
}

#[test]
fn conv_int8_respects_activation_range() {
    let input_shape = Shape::new(1, 4, 4, 3);
    let filter_shape = Shape::new(2, 3, 3, 3);
    let output_shape = Shape::new(1, 4, 4, 2);
    let input = fill_i8(input_shape.num_elements(), 1);
    let filter = fill_i8(filter_shape.num_elements(), 2);
    let bias = [500, -700];
    // A large rescale pushes most sums far outside int8.
    let rescale = [quantize_multiplier(0.05), quantize_multiplier(0.02)];
    let window = ConvWindow::new(1, 1, 1, 1);

    let mut unclamped = vec![0i8; output_shape.num_elements()];
    let full = QuantConvParams::new(window, 3, -7);
    conv2d_int8(&full, &rescale, &input_shape, &input, &filter_shape, &filter, &bias, &output_shape, &mut unclamped);
    assert!(unclamped.iter().any(|&v| v == i8::MIN || v == i8::MAX), "fixture should saturate");

    for (lo, hi) in [(-128, 127), (-50, 50), (0, 10), (-128, -100), (20, 20), (-7, 127)] {
        let params = full.with_activation(lo, hi);
        let mut output = vec![0i8; output_shape.num_elements()];
        conv2d_int8(&params, &rescale, &input_shape, &input, &filter_shape, &filter, &bias, &output_shape, &mut output);
        for (i, (&v, &u)) in output.iter().zip(&unclamped).enumerate() {
            assert!((lo..=hi).contains(&(v as i32)), "[{}, {}]: output {} = {} escapes range", lo, hi, i, v);
            assert_eq!(v as i32, (u as i32).clamp(lo, hi), "[{}, {}]: output {} not a clamp", lo, hi, i);
        }
    }
}

/// Dense quantized convolution over an input that already contains its padding.
/// Every tap is read; nothing is skipped.
fn conv_int8_prepadded(
    params: &QuantConvParams,
    rescale: &[Rescale],
    input_shape: &Shape,
    input: &[i8],
    filter_shape: &Shape,
    filter: &[i8],
    bias: &[i32],
    output_shape: &Shape,
) -> Vec<i8> {
    let w = &params.window;
    let mut output = vec![0i8; output_shape.num_elements()];
    for oy in 0..output_shape.height {
        for ox in 0..output_shape.width {
            for oc in 0..output_shape.channel {
                let mut acc = 0i32;
                for ky in 0..filter_shape.height {
                    for kx in 0..filter_shape.width {
                        for ic in 0..input_shape.channel {
                            let v = input[input_shape.offset(0, oy * w.stride_height + ky, ox * w.stride_width + kx, ic)] as i32;
                            let f = filter[filter_shape.offset(oc, ky, kx, ic)] as i32;
                            acc += f * (v + params.input_offset);
                        }
                    }
                }
                acc += bias[oc];
                let v = apply_rescale(acc, rescale[oc]) + params.output_offset;
                output[output_shape.offset(0, oy, ox, oc)] = v.clamp(params.activation_min, params.activation_max) as i8;
            }
        }
    }
    output
}

#[test]
fn skipped_taps_equal_explicit_zero_padding() {
    // 5x4 input, 3x3 filter, stride 2, SAME: rows pad 1 before and 1 after,
    // columns pad 0 before and 1 after.
    let input_shape = Shape::new(1, 5, 4, 3);
    let filter_shape = Shape::new(2, 3, 3, 3);
    let output_shape = Shape::new(1, 3, 2, 2);
    let pad_h = compute_padding(2, 1, 5, 3, 3);
    let pad_w = compute_padding(2, 1, 4, 3, 2);
    assert_eq!((pad_h.padding, pad_h.offset), (1, 0));
    assert_eq!((pad_w.padding, pad_w.offset), (0, 1));

    let input_zero_point = -5;
    let input = fill_i8(input_shape.num_elements(), 3);
    let filter = fill_i8(filter_shape.num_elements(), 4);
    let bias = [1000, -2000];
    let rescale = [quantize_multiplier(0.003), quantize_multiplier(0.0071)];
    let window = ConvWindow::new(2, 2, pad_h.padding, pad_w.padding);
    let params = QuantConvParams::new(window, -input_zero_point, 3);

    let mut clipped = vec![0i8; output_shape.num_elements()];
    conv2d_int8(&params, &rescale, &input_shape, &input, &filter_shape, &filter, &bias, &output_shape, &mut clipped);

    // Pad with the zero point, whose offset value is exactly zero.
    let padded_h = 5 + 2 * pad_h.padding + pad_h.offset;
    let padded_w = 4 + 2 * pad_w.padding + pad_w.offset;
    let padded_shape = Shape::new(1, padded_h, padded_w, 3);
    let mut padded = vec![input_zero_point as i8; padded_shape.num_elements()];
    for y in 0..5 {
        for x in 0..4 {
            for c in 0..3 {
                padded[padded_shape.offset(0, y + pad_h.padding, x + pad_w.padding, c)] = input[input_shape.offset(0, y, x, c)];
            }
        }
    }
    let explicit_params = QuantConvParams::new(ConvWindow::new(2, 2, 0, 0), -input_zero_point, 3);
    let explicit = conv_int8_prepadded(
        &explicit_params, &rescale, &padded_shape, &padded, &filter_shape, &filter, &bias, &output_shape,
    );

    assert_eq!(clipped, explicit);
}

#[test]
fn conv_int8_dilation() {
    let input_shape = Shape::new(1, 5, 5, 1);
    let filter_shape = Shape::new(1, 3, 3, 1);
    let output_shape = Shape::new(1, 1, 1, 1);
    let input: Vec<i8> = (0..25).map(|i| (i % 7 - 3) as i8).collect();
    let filter: Vec<i8> = (1..=9).collect();
    let window = ConvWindow::new(1, 1, 0, 0).with_dilation(2, 2);
    let params = QuantConvParams::new(window, 0, 0);
    let mut output = [0i8];
    conv2d_int8(&params, &[Rescale::IDENTITY], &input_shape, &input, &filter_shape, &filter, &[0], &output_shape, &mut output);

    let mut expected = 0i32;
    for ky in 0..3 {
        for kx in 0..3 {
            expected += filter[ky * 3 + kx] as i32 * input[(2 * ky) * 5 + 2 * kx] as i32;
        }
    }
    assert_eq!(output[0] as i32, expected);
}

#[test]
fn conv_int8_batches_are_independent() {
    let input_shape = Shape::new(2, 1, 1, 1);
    let filter_shape = Shape::new(1, 1, 1, 1);
    let output_shape = Shape::new(2, 1, 1, 1);
    let params = QuantConvParams::new(ConvWindow::default(), 0, 0);
    let mut output = [0i8; 2];
    conv2d_int8(&params, &[Rescale::IDENTITY], &input_shape, &[3, -4], &filter_shape, &[5], &[1], &output_shape, &mut output);
    assert_eq!(output, [16, -19]);
}

#[test]
fn conv_int8_tracks_float_reference() {
    let input_shape = Shape::new(1, 5, 5, 2);
    let filter_shape = Shape::new(3, 3, 3, 2);
    let output_shape = Shape::new(1, 5, 5, 3);
    let window = ConvWindow::new(1, 1, 1, 1);

    let input_scale = 1.0 / 127.0;
    let input_zero_point = 4;
    let output_scale = 0.05;
    let output_zero_point = -3;
    let real_input: Vec<f32> = (0..input_shape.num_elements()).map(|i| ((i as f32) * 0.37).sin() * 0.9).collect();
    let real_filter: Vec<f32> = (0..filter_shape.num_elements()).map(|i| ((i as f32) * 0.21 + 0.3).cos() * 0.6).collect();
    let real_bias = [0.2f32, -0.1, 0.05];

    let q_input = quantize_values(&real_input, input_scale, input_zero_point);
    let per_oc = filter_shape.num_elements() / filter_shape.number;
    let mut filter_scales = Vec::new();
    let mut q_filter = Vec::new();
    let mut dq_filter = Vec::new();
    for oc in 0..filter_shape.number {
        let chunk = &real_filter[oc * per_oc..(oc + 1) * per_oc];
        let max_abs = chunk.iter().fold(0.0f32, |m, v| m.max(v.abs()));
        let scale = max_abs / 127.0;
        let q = quantize_values(chunk, scale, 0);
        dq_filter.extend(dequantize_values(&q, scale, 0));
        q_filter.extend(q);
        filter_scales.push(scale);
    }
    let q_bias: Vec<i32> = real_bias
        .iter()
        .zip(&filter_scales)
        .map(|(b, s)| (*b / (input_scale * s)).round() as i32)
        .collect();

    // Float oracle on exactly the values the integer path sees.
    let dq_input = dequantize_values(&q_input, input_scale, input_zero_point);
    let dq_bias: Vec<f32> = q_bias.iter().zip(&filter_scales).map(|(b, s)| *b as f32 * input_scale * s).collect();
    let mut real_output = vec![0.0f32; output_shape.num_elements()];
    conv2d_reference(&window, &input_shape, &dq_input, &filter_shape, &dq_filter, &dq_bias, &output_shape, &mut real_output);

    let rescale: Vec<Rescale> = filter_scales
        .iter()
        .map(|&s| quantize_multiplier(s as f64 * (input_scale as f64 / output_scale as f64)))
        .collect();
    let params = QuantConvParams::new(window, -input_zero_point, output_zero_point);
    let mut output = vec![0i8; output_shape.num_elements()];
    conv2d_int8(&params, &rescale, &input_shape, &q_input, &filter_shape, &q_filter, &q_bias, &output_shape, &mut output);

    let expected = quantize_values(&real_output, output_scale, output_zero_point);
    for (i, (&got, &want)) in output.iter().zip(&expected).enumerate() {
        assert!((got as i32 - want as i32).abs() <= 1, "output {}: got {} want {}", i, got, want);
    }
}

#[test]
#[should_panic(expected = "bias length")]
fn conv_int8_checks_bias_length() {
    let shape = Shape::new(1, 1, 1, 1);
    let params = QuantConvParams::new(ConvWindow::default(), 0, 0);
    let mut output = [0i8];
    conv2d_int8(&params, &[Rescale::IDENTITY], &shape, &[1], &shape, &[1], &[0, 0], &shape, &mut output);
}

#[test]
#[should_panic(expected = "activation_min")]
fn conv_int8_checks_activation_order() {
    let shape = Shape::new(1, 1, 1, 1);
    let params = QuantConvParams::new(ConvWindow::default(), 0, 0).with_activation(10, -10);
    let mut output = [0i8];
    conv2d_int8(&params, &[Rescale::IDENTITY], &shape, &[1], &shape, &[1], &[0], &shape, &mut output);
}

#[test]
fn conv_int8_extreme_bias_wraps_like_int32() {
    let shape = Shape::new(1, 1, 1, 1);
    let params = QuantConvParams::new(ConvWindow::default(), 0, 0);

    // i32::MAX + 1 wraps to i32::MIN and clamps to the int8 floor.
    let mut output = [0i8];
    conv2d_int8(&params, &[Rescale::IDENTITY], &shape, &[1], &shape, &[1], &[i32::MAX], &shape, &mut output);
    assert_eq!(output, [-128]);

    // i32::MIN - 1 wraps to i32::MAX and clamps to the int8 ceiling.
    conv2d_int8(&params, &[Rescale::IDENTITY], &shape, &[1], &shape, &[-1], &[i32::MIN], &shape, &mut output);
    assert_eq!(output, [127]);
}
