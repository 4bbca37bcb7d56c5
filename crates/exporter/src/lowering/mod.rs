//! Operator lowering rules
//!
//! Each rule expands one kind of traced call into primitive ONNX operator
//! nodes (plus the constants they need). Rules are looked up in a
//! [`RuleRegistry`] keyed by builtin function name or layer type name;
//! operations without a registered rule resolve to [`NoopRule`].
//!
//! # Catalogue
//!
//! | Traced call      | Emitted ONNX nodes                                   |
//! |------------------|------------------------------------------------------|
//! | `relu`           | `Relu`                                               |
//! | `sigmoid`        | `Sigmoid`                                            |
//! | `tanh`           | `Tanh`                                               |
//! | `softmax`        | `Softmax(axis)`                                      |
//! | `Linear`         | `Shape, Gather, Unsqueeze, Concat, Reshape` + `Gemm` |
//! |                  | (or `Transpose, MatMul` without bias)                |
//! | `Convolution2D`  | `Conv`                                               |

mod activation;
mod convolution;
mod linear;

pub use activation::{PointwiseRule, SoftmaxRule};
pub use convolution::Convolution2DRule;
pub use linear::LinearRule;

use rustc_hash::FxHashMap;

use crate::builder::GraphBuilder;
use crate::source::{Node, Operation, Value};
use crate::{ExportError, Result};

/// Read-only view of the node being lowered and the values it touches
#[derive(Debug, Clone, Copy)]
pub struct LoweringContext<'a> {
    pub node: &'a Node,
    values: &'a [Value],
}

impl<'a> LoweringContext<'a> {
    pub fn new(node: &'a Node, values: &'a [Value]) -> Self {
        Self { node, values }
    }

    fn value(&self, ids: &[usize], index: usize, role: &str) -> Result<&'a Value> {
        let id = ids.get(index).copied().ok_or_else(|| {
            ExportError::invalid_argument(&self.node.to_string(), format!("missing {} {}", role, index))
        })?;
        self.values.get(id).ok_or(ExportError::UnknownValue(id))
    }

    pub fn input(&self, index: usize) -> Result<&'a Value> {
        self.value(&self.node.inputs, index, "input")
    }

    pub fn output(&self, index: usize) -> Result<&'a Value> {
        self.value(&self.node.outputs, index, "output")
    }

    pub fn input_name(&self, index: usize) -> Result<&'a str> {
        Ok(self.input(index)?.onnx_name.as_str())
    }

    pub fn output_name(&self, index: usize) -> Result<&'a str> {
        Ok(self.output(index)?.onnx_name.as_str())
    }

    /// Diagnostic name for emitted nodes: the call's source location
    pub fn location(&self) -> String {
        self.node.lineprop.to_string()
    }

    /// Name for a tensor owned by this node: `<node>/<role>`
    pub fn scoped(&self, role: &str) -> String {
        format!("{}/{}", self.node.onnx_name, role)
    }
}

/// Translates one traced call into ONNX nodes
pub trait LoweringRule: Send + Sync {
    /// Name of this rule (for logging/debugging)
    fn name(&self) -> &str;

    fn lower(&self, ctx: &LoweringContext<'_>, builder: &mut GraphBuilder) -> Result<()>;

    /// True for the fallback rule that emits nothing
    fn is_noop(&self) -> bool {
        false
    }
}

/// Fallback for calls with no graph-level representation
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRule;

impl LoweringRule for NoopRule {
    fn name(&self) -> &str {
        "noop"
    }

    fn lower(&self, _ctx: &LoweringContext<'_>, _builder: &mut GraphBuilder) -> Result<()> {
        Ok(())
    }

    fn is_noop(&self) -> bool {
        true
    }
}

/// Catalogue of lowering rules
///
/// Builtin functions are matched before layer calls.
pub struct RuleRegistry {
    functions: FxHashMap<String, Box<dyn LoweringRule>>,
    links: FxHashMap<String, Box<dyn LoweringRule>>,
    fallback: NoopRule,
}

impl RuleRegistry {
    /// Registry with no rules; every node resolves to the fallback
    pub fn empty() -> Self {
        Self {
            functions: FxHashMap::default(),
            links: FxHashMap::default(),
            fallback: NoopRule,
        }
    }

    /// The standard catalogue
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry
            .register_function("relu", PointwiseRule::new("Relu"))
            .register_function("sigmoid", PointwiseRule::new("Sigmoid"))
            .register_function("tanh", PointwiseRule::new("Tanh"))
            .register_function("softmax", SoftmaxRule)
            .register_link("Linear", LinearRule)
            .register_link("Convolution2D", Convolution2DRule);
        registry
    }

    pub fn register_function(
        &mut self,
        name: impl Into<String>,
        rule: impl LoweringRule + 'static,
    ) -> &mut Self {
        self.functions.insert(name.into(), Box::new(rule));
        self
    }

    pub fn register_link(
        &mut self,
        type_name: impl Into<String>,
        rule: impl LoweringRule + 'static,
    ) -> &mut Self {
        self.links.insert(type_name.into(), Box::new(rule));
        self
    }

    pub fn len(&self) -> usize {
        self.functions.len() + self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rule for an operation, or the no-op fallback
    pub fn resolve(&self, operation: &Operation) -> &dyn LoweringRule {
        let rule = match operation {
            Operation::Function { name } => self.functions.get(name),
            Operation::Link { link } => self.links.get(link.type_name()),
            Operation::Control { .. } | Operation::Other { .. } => None,
        };
        rule.map_or(&self.fallback as &dyn LoweringRule, |r| r.as_ref())
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut functions: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        let mut links: Vec<&str> = self.links.keys().map(String::as_str).collect();
        functions.sort_unstable();
        links.sort_unstable();
        f.debug_struct("RuleRegistry")
            .field("functions", &functions)
            .field("links", &links)
            .finish()
    }
}
