use log::debug;

use crate::conv::{
    compute_output_size, compute_padding, conv2d_int8, depthwise_conv2d_int8, ConvWindow, QuantConvParams,
};
use crate::error::EmulationError;
use crate::loader::dump::{bytes_as_i32, bytes_as_i8, i8_as_bytes};
use crate::quantization::{activation_range_i8, offset_u8_to_i8, try_compute_rescale, QuantParams};
use crate::tensor::Shape;
use super::graph::{ElementType, OperatorGraph, TensorInfo};
use super::{NodeContext, NodeEmulation, OperatorKind};

/// Emulates one node and returns its reference and emulated outputs.
///
/// Every graph-derived precondition is checked here, so the kernels' own assertions
/// only fire on programming errors. Operators other than Conv2D and DepthwiseConv2D
/// are an error, never skipped.
pub fn emulate_node<G: OperatorGraph + ?Sized>(ctx: &NodeContext<'_, G>) -> Result<NodeEmulation, EmulationError> {
    match ctx.kind() {
        OperatorKind::Conv2D => emulate_conv(ctx, false),
        OperatorKind::DepthwiseConv2D => emulate_conv(ctx, true),
        OperatorKind::Unsupported(op) => Err(EmulationError::UnsupportedOperator { node: ctx.index(), op }),
    }
}

fn expect_type(tensor: &TensorInfo, expected: ElementType) -> Result<(), EmulationError> {
    if tensor.element_type != expected {
        return Err(EmulationError::ElementType {
            tensor: tensor.name.clone(),
            expected,
            found: tensor.element_type,
        });
    }
    Ok(())
}

fn shape_of(tensor: &TensorInfo) -> Result<Shape, EmulationError> {
    Shape::from_dims(&tensor.dims).ok_or_else(|| EmulationError::Rank {
        tensor: tensor.name.clone(),
        dims: tensor.dims.clone(),
    })
}

fn data_of(tensor: &TensorInfo) -> Result<&[u8], EmulationError> {
    let expected = tensor.num_elements() * tensor.element_type.size();
    if tensor.data.len() != expected {
        return Err(EmulationError::BufferSize {
            tensor: tensor.name.clone(),
            expected,
            found: tensor.data.len(),
        });
    }
    Ok(&tensor.data)
}

fn quant_of(tensor: &TensorInfo) -> Result<&QuantParams, EmulationError> {
    quant_in(tensor, i8::MIN as i32, i8::MAX as i32)
}

/// Affine parameters whose zero points lie in `[min, max]`, with positive finite scales.
fn quant_in(tensor: &TensorInfo, min: i32, max: i32) -> Result<&QuantParams, EmulationError> {
    let q = tensor.quantization.as_ref().ok_or_else(|| EmulationError::Quantization {
        tensor: tensor.name.clone(),
        detail: "expected affine quantization".to_string(),
    })?;
    if !q.is_valid_for(min, max) {
        return Err(EmulationError::Quantization {
            tensor: tensor.name.clone(),
            detail: format!("malformed parameters {:?}", q),
        });
    }
    if let Some(&s) = q.scale.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
        return Err(EmulationError::Quantization {
            tensor: tensor.name.clone(),
            detail: format!("scale {} is not a positive finite value", s),
        });
    }
    Ok(q)
}

/// A single-entry quantization; returns its scale and zero point.
fn per_tensor(tensor: &TensorInfo) -> Result<(f32, i32), EmulationError> {
    per_tensor_in(tensor, i8::MIN as i32, i8::MAX as i32)
}

fn per_tensor_in(tensor: &TensorInfo, min: i32, max: i32) -> Result<(f32, i32), EmulationError> {
    let q = quant_in(tensor, min, max)?;
    if q.is_per_channel() {
        return Err(EmulationError::Quantization {
            tensor: tensor.name.clone(),
            detail: format!("expected per-tensor quantization, found {} channels", q.len()),
        });
    }
    Ok((q.scale[0], q.zero_point[0]))
}

fn mismatch(node: usize, detail: String) -> EmulationError {
    EmulationError::ShapeMismatch { node, detail }
}

fn emulate_conv<G: OperatorGraph + ?Sized>(
    ctx: &NodeContext<'_, G>,
    depthwise: bool,
) -> Result<NodeEmulation, EmulationError> {
    let node = ctx.index();
    let options = &ctx.node().options;

    let input = ctx.input(0, "input")?;
    let filter = ctx.input(1, "filter")?;
    let bias = ctx.optional_input(2);
    let output = ctx.output(0, "output")?;

    // Raw uint8 image bytes are accepted as the input and offset into the int8 domain.
    let image_input = input.element_type == ElementType::UInt8;
    if !image_input {
        expect_type(input, ElementType::Int8)?;
    }
    expect_type(filter, ElementType::Int8)?;
    expect_type(output, ElementType::Int8)?;
    if let Some(b) = bias {
        expect_type(b, ElementType::Int32)?;
    }

    let input_shape = shape_of(input)?;
    let filter_shape = shape_of(filter)?;
    let output_shape = shape_of(output)?;
    let out_channels = output_shape.channel;

    if input_shape.number != output_shape.number {
        return Err(mismatch(node, format!("input batch {} != output batch {}", input_shape.number, output_shape.number)));
    }

    let depth_multiplier = if depthwise {
        let m = options.depth_multiplier.unwrap_or(out_channels / input_shape.channel);
        if filter_shape.number != 1 {
            return Err(mismatch(node, format!("depthwise filter batch is {}, expected 1", filter_shape.number)));
        }
        if filter_shape.channel != out_channels {
            return Err(mismatch(node, format!("filter channels {} != output channels {}", filter_shape.channel, out_channels)));
        }
        if m == 0 || input_shape.channel * m != out_channels {
            return Err(mismatch(node, format!(
                "output channels {} != input channels {} * depth multiplier {}",
                out_channels, input_shape.channel, m
            )));
        }
        m
    } else {
        if input_shape.channel != filter_shape.channel {
            return Err(mismatch(node, format!("input channels {} != filter channels {}", input_shape.channel, filter_shape.channel)));
        }
        if filter_shape.number != out_channels {
            return Err(mismatch(node, format!("filter count {} != output channels {}", filter_shape.number, out_channels)));
        }
        1
    };

    if options.stride_h == 0 || options.stride_w == 0 || options.dilation_h == 0 || options.dilation_w == 0 {
        return Err(EmulationError::InvalidOption {
            node,
            detail: format!(
                "stride {}x{} dilation {}x{}",
                options.stride_h, options.stride_w, options.dilation_h, options.dilation_w
            ),
        });
    }
    if let Some(mode) = options.padding {
        let out_h = compute_output_size(mode, input_shape.height, filter_shape.height, options.stride_h, options.dilation_h);
        let out_w = compute_output_size(mode, input_shape.width, filter_shape.width, options.stride_w, options.dilation_w);
        if (out_h, out_w) != (output_shape.height, output_shape.width) {
            return Err(mismatch(node, format!(
                "{:?} padding gives {}x{} output, runtime has {}x{}",
                mode, out_h, out_w, output_shape.height, output_shape.width
            )));
        }
    }

    let pad_h = compute_padding(options.stride_h, options.dilation_h, input_shape.height, filter_shape.height, output_shape.height);
    let pad_w = compute_padding(options.stride_w, options.dilation_w, input_shape.width, filter_shape.width, output_shape.width);
    let window = ConvWindow::new(options.stride_h, options.stride_w, pad_h.padding, pad_w.padding)
        .with_dilation(options.dilation_h, options.dilation_w);

    let (input_scale, input_zero_point) = if image_input {
        let (scale, zero_point) = per_tensor_in(input, u8::MIN as i32, u8::MAX as i32)?;
        (scale, zero_point - 128)
    } else {
        per_tensor(input)?
    };
    let (output_scale, output_zero_point) = per_tensor(output)?;
    let filter_quant = quant_of(filter)?;
    if filter_quant.len() != 1 && filter_quant.len() != out_channels {
        return Err(EmulationError::Quantization {
            tensor: filter.name.clone(),
            detail: format!("{} scales for {} output channels", filter_quant.len(), out_channels),
        });
    }
    let channel_axis = if depthwise { 3 } else { 0 };
    if filter_quant.is_per_channel() && filter_quant.quantized_dimension != channel_axis {
        return Err(EmulationError::Quantization {
            tensor: filter.name.clone(),
            detail: format!("quantized along dimension {}, expected {}", filter_quant.quantized_dimension, channel_axis),
        });
    }
    if filter_quant.zero_point.iter().any(|&zp| zp != 0) {
        return Err(EmulationError::Quantization {
            tensor: filter.name.clone(),
            detail: "filter zero points must be 0".to_string(),
        });
    }
    let rescale = try_compute_rescale(input_scale, output_scale, &filter_quant.scale, out_channels).ok_or_else(|| {
        let max_scale = filter_quant.scale.iter().fold(0f64, |m, &s| m.max(s as f64));
        EmulationError::Quantization {
            tensor: output.name.clone(),
            detail: format!(
                "scale ratio {} cannot be represented as a Q31 rescale",
                max_scale * (input_scale as f64 / output_scale as f64)
            ),
        }
    })?;

    let (activation_min, activation_max) = activation_range_i8(options.fused_activation, output_scale, output_zero_point);
    if activation_min > activation_max {
        return Err(EmulationError::InvalidOption {
            node,
            detail: format!("empty activation range [{}, {}]", activation_min, activation_max),
        });
    }
    let params = QuantConvParams::new(window, -input_zero_point, output_zero_point)
        .with_activation(activation_min, activation_max);

    let input_values = if image_input {
        let raw = data_of(input)?;
        let mut values = vec![0i8; raw.len()];
        offset_u8_to_i8(raw, &mut values);
        values
    } else {
        bytes_as_i8(data_of(input)?)
    };
    let filter_values = bytes_as_i8(data_of(filter)?);
    let bias_values = match bias {
        Some(b) => {
            let values = bytes_as_i32(data_of(b)?);
            if values.len() != out_channels {
                return Err(mismatch(node, format!("bias length {} != output channels {}", values.len(), out_channels)));
            }
            values
        }
        None => vec![0; out_channels],
    };
    let reference = data_of(output)?.to_vec();

    debug!(
        "node {}: {} in={} filter={} out={} {:?} input_offset={} output_offset={} act=[{}, {}]",
        node, ctx.kind(), input_shape, filter_shape, output_shape, window,
        params.input_offset, params.output_offset, activation_min, activation_max
    );

    let mut emulated = vec![0i8; output_shape.num_elements()];
    if depthwise {
        depthwise_conv2d_int8(
            &params, depth_multiplier, &rescale,
            &input_shape, &input_values,
            &filter_shape, &filter_values,
            &bias_values,
            &output_shape, &mut emulated,
        );
    } else {
        conv2d_int8(
            &params, &rescale,
            &input_shape, &input_values,
            &filter_shape, &filter_values,
            &bias_values,
            &output_shape, &mut emulated,
        );
    }

    Ok(NodeEmulation {
        node,
        kind: ctx.kind(),
        reference,
        emulated: i8_as_bytes(&emulated),
    })
}
