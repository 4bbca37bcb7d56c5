//! Single-node activations.

use super::{LoweringContext, LoweringRule};
use crate::builder::{Attribute, GraphBuilder};
use crate::source::ValueKind;
use crate::{ExportError, Result};

/// Softmax axis when the call does not pass one
const DEFAULT_SOFTMAX_AXIS: i64 = 1;

/// One input, one output, no attributes
#[derive(Debug, Clone, Copy)]
pub struct PointwiseRule {
    op_type: &'static str,
}

impl PointwiseRule {
    pub fn new(op_type: &'static str) -> Self {
        Self { op_type }
    }
}

impl LoweringRule for PointwiseRule {
    fn name(&self) -> &str {
        self.op_type
    }

    fn lower(&self, ctx: &LoweringContext<'_>, builder: &mut GraphBuilder) -> Result<()> {
        let location = ctx.location();
        builder.emit_operator(
            self.op_type,
            &[ctx.input_name(0)?],
            &[ctx.output_name(0)?],
            Some(&location),
            &[],
        )
    }
}

/// `softmax(x, axis)`; the axis is the call's second argument
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftmaxRule;

impl SoftmaxRule {
    fn axis(ctx: &LoweringContext<'_>) -> Result<i64> {
        if ctx.node.inputs.len() < 2 {
            return Ok(DEFAULT_SOFTMAX_AXIS);
        }
        match &ctx.input(1)?.kind {
            ValueKind::Number { value } => value.as_int().ok_or_else(|| {
                ExportError::invalid_argument("Softmax", format!("axis {:?} is not an integer", value))
            }),
            other => Err(ExportError::invalid_argument(
                "Softmax",
                format!("axis must be a number, got {:?}", other),
            )),
        }
    }
}

impl LoweringRule for SoftmaxRule {
    fn name(&self) -> &str {
        "Softmax"
    }

    fn lower(&self, ctx: &LoweringContext<'_>, builder: &mut GraphBuilder) -> Result<()> {
        let axis = Self::axis(ctx)?;
        let location = ctx.location();
        builder.emit_operator(
            "Softmax",
            &[ctx.input_name(0)?],
            &[ctx.output_name(0)?],
            Some(&location),
            &[("axis", Attribute::Int(axis))],
        )
    }
}
