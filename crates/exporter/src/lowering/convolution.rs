//! 2-D convolution lowering: one `Conv` node.

use super::{LoweringContext, LoweringRule};
use crate::builder::{Attribute, GraphBuilder};
use crate::source::{Convolution2DLink, Link, Operation};
use crate::{ExportError, Result};

#[derive(Debug, Default, Clone, Copy)]
pub struct Convolution2DRule;

impl Convolution2DRule {
    fn link<'a>(ctx: &LoweringContext<'a>) -> Result<&'a Convolution2DLink> {
        match &ctx.node.operation {
            Operation::Link {
                link: Link::Convolution2D(conv),
            } => Ok(conv),
            other => Err(ExportError::invalid_argument(
                "Convolution2D",
                format!("node is bound to {}, not a Convolution2D layer", other),
            )),
        }
    }
}

impl LoweringRule for Convolution2DRule {
    fn name(&self) -> &str {
        "Convolution2D"
    }

    fn lower(&self, ctx: &LoweringContext<'_>, builder: &mut GraphBuilder) -> Result<()> {
        let conv = Self::link(ctx)?;
        let x = builder.tensor(ctx.input_name(0)?)?.name.clone();
        let y = builder.tensor(ctx.output_name(0)?)?.name.clone();

        let kernel_shape = conv.ksize.pair();
        let strides = conv.stride.pair();
        let [pad_h, pad_w] = conv.pad.pair();
        if kernel_shape.iter().any(|&k| k <= 0) || strides.iter().any(|&s| s <= 0) {
            return Err(ExportError::invalid_argument(
                "Convolution2D",
                format!(
                    "kernel {:?} and stride {:?} must be positive",
                    kernel_shape, strides
                ),
            ));
        }

        let mut inputs = vec![x];
        inputs.push(builder.declare_constant(&conv.w, ctx.scoped("W"))?.name);
        if let Some(bias) = &conv.b {
            inputs.push(builder.declare_constant(bias, ctx.scoped("b"))?.name);
        }
        let inputs: Vec<&str> = inputs.iter().map(String::as_str).collect();

        let location = ctx.location();
        builder.emit_operator(
            "Conv",
            &inputs,
            &[&y],
            Some(&location),
            &[
                ("kernel_shape", Attribute::from(kernel_shape)),
                // ONNX pads are all begins, then all ends
                ("pads", Attribute::Ints(vec![pad_h, pad_w, pad_h, pad_w])),
                ("strides", Attribute::from(strides)),
            ],
        )
    }
}
