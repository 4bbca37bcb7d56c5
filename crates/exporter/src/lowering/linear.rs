//! Fully-connected layer lowering.
//!
//! The input is first flattened to `(batch, -1)` with a small shape
//! computation, so inputs of any rank work:
//!
//! ```text
//! x_shape      = Shape(x)
//! batch_size_1 = Gather(x_shape, Zero)
//! batch_size_2 = Unsqueeze(batch_size_1, axes=[0])
//! mat_shape    = Concat(batch_size_2, Minus1, axis=0)
//! x_reshape    = Reshape(x, mat_shape)
//! y            = Gemm(x_reshape, W, B, transA=0, transB=1)
//! ```
//!
//! Without a bias the `Gemm` becomes `Temp = Transpose(W, perm=[1, 0])`
//! followed by `y = MatMul(x_reshape, Temp)`.

use super::{LoweringContext, LoweringRule};
use crate::builder::{Attribute, GraphBuilder, TensorDim};
use crate::proto::tensor_proto::DataType;
use crate::source::{Array, LinearLink, Link, Operation};
use crate::{ExportError, Result};

#[derive(Debug, Default, Clone, Copy)]
pub struct LinearRule;

impl LinearRule {
    fn link<'a>(ctx: &LoweringContext<'a>) -> Result<&'a LinearLink> {
        match &ctx.node.operation {
            Operation::Link {
                link: Link::Linear(linear),
            } => Ok(linear),
            other => Err(ExportError::invalid_argument(
                "Linear",
                format!("node is bound to {}, not a Linear layer", other),
            )),
        }
    }
}

impl LoweringRule for LinearRule {
    fn name(&self) -> &str {
        "Linear"
    }

    fn lower(&self, ctx: &LoweringContext<'_>, builder: &mut GraphBuilder) -> Result<()> {
        let linear = Self::link(ctx)?;
        let x = builder.tensor(ctx.input_name(0)?)?.name.clone();
        let y = builder.tensor(ctx.output_name(0)?)?.name.clone();
        let location = ctx.location();
        let diag = Some(location.as_str());

        let w = builder.declare_constant(&linear.w, ctx.scoped("W"))?.name;

        let undefined = || vec![TensorDim::undefined()];
        let x_shape = builder
            .declare_tensor(undefined(), DataType::Int64, ctx.scoped("x_shape"))?
            .name;
        let batch_size_1 = builder
            .declare_tensor(undefined(), DataType::Int64, ctx.scoped("batch_size_1"))?
            .name;
        let batch_size_2 = builder
            .declare_tensor(undefined(), DataType::Int64, ctx.scoped("batch_size_2"))?
            .name;
        let mat_shape = builder
            .declare_tensor(undefined(), DataType::Int64, ctx.scoped("mat_shape"))?
            .name;
        let x_reshape = builder
            .declare_tensor(
                vec![TensorDim::undefined(), TensorDim::undefined()],
                DataType::Float,
                ctx.scoped("x_reshape"),
            )?
            .name;

        builder.emit_operator("Shape", &[&x], &[&x_shape], diag, &[])?;

        let zero = builder
            .declare_constant(&Array::scalar_i64(0), ctx.scoped("Zero"))?
            .name;
        builder.emit_operator("Gather", &[&x_shape, &zero], &[&batch_size_1], diag, &[])?;
        builder.emit_operator(
            "Unsqueeze",
            &[&batch_size_1],
            &[&batch_size_2],
            diag,
            &[("axes", Attribute::Ints(vec![0]))],
        )?;

        let minus1 = builder
            .declare_constant(&Array::from_i64(vec![-1]), ctx.scoped("Minus1"))?
            .name;
        builder.emit_operator(
            "Concat",
            &[&batch_size_2, &minus1],
            &[&mat_shape],
            diag,
            &[("axis", Attribute::Int(0))],
        )?;
        builder.emit_operator("Reshape", &[&x, &mat_shape], &[&x_reshape], diag, &[])?;

        match &linear.b {
            Some(bias) => {
                let b = builder.declare_constant(bias, ctx.scoped("B"))?.name;
                builder.emit_operator(
                    "Gemm",
                    &[&x_reshape, &w, &b],
                    &[&y],
                    diag,
                    &[("transA", Attribute::Int(0)), ("transB", Attribute::Int(1))],
                )?;
            }
            None => {
                let temp = builder
                    .declare_tensor(
                        vec![TensorDim::undefined(), TensorDim::undefined()],
                        DataType::Float,
                        ctx.scoped("Temp"),
                    )?
                    .name;
                builder.emit_operator(
                    "Transpose",
                    &[&w],
                    &[&temp],
                    diag,
                    &[("perm", Attribute::Ints(vec![1, 0]))],
                )?;
                builder.emit_operator("MatMul", &[&x_reshape, &temp], &[&y], diag, &[])?;
            }
        }
        Ok(())
    }
}
