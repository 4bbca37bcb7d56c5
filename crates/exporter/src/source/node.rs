//! Traced operations.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::array::Array;
use super::graph::Graph;
use super::value::{LineProp, ValueId};

/// Size argument of a 2-D layer: one value for both spatial axes, or (h, w)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Size2d {
    Scalar(i64),
    Pair(i64, i64),
}

impl Size2d {
    /// Normalize to an explicit `[h, w]` pair
    pub fn pair(self) -> [i64; 2] {
        match self {
            Size2d::Scalar(n) => [n, n],
            Size2d::Pair(h, w) => [h, w],
        }
    }
}

impl From<i64> for Size2d {
    fn from(n: i64) -> Self {
        Size2d::Scalar(n)
    }
}

impl From<(i64, i64)> for Size2d {
    fn from((h, w): (i64, i64)) -> Self {
        Size2d::Pair(h, w)
    }
}

/// Fully-connected layer parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearLink {
    /// Weight matrix, shape `(out_size, in_size)`
    #[serde(rename = "W")]
    pub w: Array,
    #[serde(default)]
    pub b: Option<Array>,
}

/// 2-D convolution layer parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Convolution2DLink {
    /// Filter, shape `(out_channels, in_channels, kh, kw)`
    #[serde(rename = "W")]
    pub w: Array,
    #[serde(default)]
    pub b: Option<Array>,
    pub ksize: Size2d,
    #[serde(default = "unit_size")]
    pub stride: Size2d,
    #[serde(default = "zero_size")]
    pub pad: Size2d,
}

fn unit_size() -> Size2d {
    Size2d::Scalar(1)
}

fn zero_size() -> Size2d {
    Size2d::Scalar(0)
}

/// The layer instance a call is bound to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Link {
    Linear(LinearLink),
    Convolution2D(Convolution2DLink),
    /// Layer type with no dedicated parameters
    Unknown { type_name: String },
}

impl Link {
    /// Catalogue key for this layer type
    pub fn type_name(&self) -> &str {
        match self {
            Link::Linear(_) => "Linear",
            Link::Convolution2D(_) => "Convolution2D",
            Link::Unknown { type_name } => type_name,
        }
    }
}

/// What a traced node does
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Call to a builtin framework function (`relu`, `softmax`, ...)
    Function { name: String },
    /// Call of a layer instance
    Link { link: Link },
    /// Control-flow construct; its bodies are the node's subgraphs
    Control { name: String },
    /// Anything else the tracer recorded
    Other { name: String },
}

impl Operation {
    pub fn function(name: impl Into<String>) -> Self {
        Operation::Function { name: name.into() }
    }

    pub fn link(link: Link) -> Self {
        Operation::Link { link }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Function { name } => write!(f, "{}", name),
            Operation::Link { link } => write!(f, "{}", link.type_name()),
            Operation::Control { name } | Operation::Other { name } => write!(f, "{}", name),
        }
    }
}

/// A traced operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(flatten)]
    pub operation: Operation,
    #[serde(default)]
    pub inputs: Vec<ValueId>,
    #[serde(default)]
    pub outputs: Vec<ValueId>,
    #[serde(default)]
    pub lineprop: LineProp,
    #[serde(default)]
    pub subgraphs: Vec<Graph>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub onnx_name: String,
}

impl Node {
    pub fn new(operation: Operation, inputs: Vec<ValueId>, outputs: Vec<ValueId>) -> Self {
        Self {
            operation,
            inputs,
            outputs,
            lineprop: LineProp::default(),
            subgraphs: Vec::new(),
            onnx_name: String::new(),
        }
    }

    pub fn at(mut self, lineprop: LineProp) -> Self {
        self.lineprop = lineprop;
        self
    }

    pub fn with_subgraph(mut self, graph: Graph) -> Self {
        self.subgraphs.push(graph);
        self
    }

    pub fn is_named(&self) -> bool {
        !self.onnx_name.is_empty()
    }
}

/// Rendering used as the node's candidate name: `op@location`
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lineprop.is_empty() {
            write!(f, "{}", self.operation)
        } else {
            write!(f, "{}@{}", self.operation, self.lineprop)
        }
    }
}
