//! Traced graphs and the trace handed over by the front-end.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::node::Node;
use super::value::{Value, ValueId, ValueKind};
use crate::{ExportError, Result};

/// Ordered sequence of traced nodes (a model body or a control-flow body)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: Node) -> &mut Self {
        self.nodes.push(node);
        self
    }

    /// Visit every node, descending into subgraphs after their owner
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Node)) {
        for node in &self.nodes {
            visit(node);
            for subgraph in &node.subgraphs {
                subgraph.walk(visit);
            }
        }
    }
}

/// One traced forward pass: value arena, boundary values and root graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub values: Vec<Value>,
    pub inputs: Vec<ValueId>,
    pub outputs: Vec<ValueId>,
    pub graph: Graph,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_value(&mut self, value: Value) -> ValueId {
        let id = self.values.len();
        self.values.push(value);
        id
    }

    pub fn value(&self, id: ValueId) -> Result<&Value> {
        self.values.get(id).ok_or(ExportError::UnknownValue(id))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reject value ids pointing outside the arena
    pub fn validate(&self) -> Result<()> {
        let len = self.values.len();
        let check = |id: ValueId| {
            if id < len {
                Ok(())
            } else {
                Err(ExportError::UnknownValue(id))
            }
        };

        for &id in self.inputs.iter().chain(&self.outputs) {
            check(id)?;
        }
        for value in &self.values {
            if let ValueKind::Tuple { elements } = &value.kind {
                for &id in elements {
                    check(id)?;
                }
            }
        }

        let mut result = Ok(());
        self.graph.walk(&mut |node: &Node| {
            if result.is_ok() {
                result = node
                    .inputs
                    .iter()
                    .chain(&node.outputs)
                    .try_for_each(|&id| check(id));
            }
        });
        result
    }
}

/// Upstream tracer contract: produce the trace of one forward pass
pub trait Frontend {
    fn convert_model(&self) -> Result<Trace>;
}

impl Frontend for Trace {
    fn convert_model(&self) -> Result<Trace> {
        Ok(self.clone())
    }
}

/// A trace serialized to JSON by an external tracer
#[derive(Debug, Clone)]
pub struct TraceFile {
    path: PathBuf,
}

impl TraceFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Frontend for TraceFile {
    fn convert_model(&self) -> Result<Trace> {
        let json = std::fs::read_to_string(&self.path)?;
        Trace::from_json(&json)
    }
}
