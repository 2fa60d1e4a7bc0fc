use qconv::conv::{compute_output_size, compute_padding, conv2d_reference, ConvWindow, Padding};
use qconv::tensor::Shape;

/// Runs the float reference with a square all-ones filter over an all-ones input.
fn ones_conv(in_hw: (usize, usize), k: usize, stride: usize, padding: Padding) -> (Shape, Vec<f32>) {
    let input_shape = Shape::new(1, in_hw.0, in_hw.1, 1);
    let filter_shape = Shape::new(1, k, k, 1);
    let out_h = compute_output_size(padding, in_hw.0, k, stride, 1);
    let out_w = compute_output_size(padding, in_hw.1, k, stride, 1);
    let output_shape = Shape::new(1, out_h, out_w, 1);
    let pad_h = compute_padding(stride, 1, in_hw.0, k, out_h);
    let pad_w = compute_padding(stride, 1, in_hw.1, k, out_w);
    let window = ConvWindow::new(stride, stride, pad_h.padding, pad_w.padding);

    let input = vec![1.0f32; input_shape.num_elements()];
    let filter = vec![1.0f32; filter_shape.num_elements()];
    let mut output = vec![0.0f32; output_shape.num_elements()];
    conv2d_reference(&window, &input_shape, &input, &filter_shape, &filter, &[0.0], &output_shape, &mut output);
    (output_shape, output)
}

#[test]
fn conv_1x1_subtracts_bias() {
    let shape = Shape::new(1, 1, 1, 1);
    let mut output = [0.0f32; 1];
    conv2d_reference(&ConvWindow::default(), &shape, &[1.0], &shape, &[1.0], &[-1.0], &shape, &mut output);
    assert_eq!(output[0], 0.0);
}

#[test]
fn conv_1x1_two_filters() {
    let input_shape = Shape::new(1, 1, 1, 1);
    let filter_shape = Shape::new(2, 1, 1, 1);
    let output_shape = Shape::new(1, 1, 1, 2);
    let mut output = [0.0f32; 2];
    conv2d_reference(
        &ConvWindow::default(),
        &input_shape, &[1.0],
        &filter_shape, &[1.0, -1.0],
        &[-1.0, 123.0],
        &output_shape, &mut output,
    );
    assert_eq!(output, [0.0, 122.0]);
}

#[test]
fn conv_1x1_sums_input_channels() {
    let input_shape = Shape::new(1, 1, 1, 2);
    let filter_shape = Shape::new(1, 1, 1, 2);
    let output_shape = Shape::new(1, 1, 1, 1);
    let mut output = [0.0f32; 1];
    conv2d_reference(
        &ConvWindow::default(),
        &input_shape, &[1.0, 1.0],
        &filter_shape, &[1.0, 1.0],
        &[123.0],
        &output_shape, &mut output,
    );
    assert_eq!(output[0], 125.0);
}

#[test]
fn conv_3x3_valid() {
    let (shape, out) = ones_conv((3, 3), 3, 1, Padding::Valid);
    assert_eq!((shape.height, shape.width), (1, 1));
    assert_eq!(out, vec![9.0]);
}

#[test]
fn conv_3x3_same_over_1x1() {
    let (_, out) = ones_conv((1, 1), 3, 1, Padding::Same);
    assert_eq!(out, vec![1.0]);
}

#[test]
fn conv_3x3_same_over_2x2() {
    let (_, out) = ones_conv((2, 2), 3, 1, Padding::Same);
    assert_eq!(out, vec![4.0; 4]);
}

#[test]
fn conv_3x3_same_counts_valid_taps() {
    let (_, out) = ones_conv((3, 3), 3, 1, Padding::Same);
    let expected = vec![
        4.0, 6.0, 4.0,
        6.0, 9.0, 6.0,
        4.0, 6.0, 4.0,
    ];
    assert_eq!(out, expected);
}

#[test]
fn conv_stride2_same_pads_trailing_side() {
    // Total padding is 1, so the first window starts at the top-left corner
    // and only the last row/column of windows is clipped.
    let (shape, out) = ones_conv((4, 4), 3, 2, Padding::Same);
    assert_eq!((shape.height, shape.width), (2, 2));
    assert_eq!(out, vec![9.0, 6.0, 6.0, 4.0]);
}

#[test]
fn conv_reference_is_generic_over_integers() {
    let shape = Shape::new(1, 3, 3, 1);
    let filter_shape = Shape::new(1, 3, 3, 1);
    let mut output = vec![0i32; 9];
    conv2d_reference(&ConvWindow::new(1, 1, 1, 1), &shape, &[1; 9], &filter_shape, &[1; 9], &[0], &shape, &mut output);
    assert_eq!(output, vec![4, 6, 4, 6, 9, 6, 4, 6, 4]);
}

#[test]
fn conv_reference_dilation() {
    // 5x5 input numbered 0..25, 3x3 ones filter dilated by 2 sees the even coordinates.
    let input_shape = Shape::new(1, 5, 5, 1);
    let filter_shape = Shape::new(1, 3, 3, 1);
    let output_shape = Shape::new(1, 1, 1, 1);
    let input: Vec<f32> = (0..25).map(|i| i as f32).collect();
    let mut output = [0.0f32];
    let window = ConvWindow::new(1, 1, 0, 0).with_dilation(2, 2);
    conv2d_reference(&window, &input_shape, &input, &filter_shape, &[1.0; 9], &[0.0], &output_shape, &mut output);
    let expected: f32 = [0, 2, 4, 10, 12, 14, 20, 22, 24].iter().map(|&i| i as f32).sum();
    assert_eq!(output[0], expected);
}

#[test]
#[should_panic(expected = "channel mismatch")]
fn conv_reference_checks_channels() {
    let mut output = [0.0f32];
    conv2d_reference(
        &ConvWindow::default(),
        &Shape::new(1, 1, 1, 2), &[1.0, 1.0],
        &Shape::new(1, 1, 1, 1), &[1.0],
        &[0.0],
        &Shape::new(1, 1, 1, 1), &mut output,
    );
}
