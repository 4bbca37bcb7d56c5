//! Traced values: tensors, scalars and tuples flowing between traced calls.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::array::ElementType;

/// Index of a value in the trace's value arena
pub type ValueId = usize;

/// One dimension of a traced tensor shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Dim {
    Fixed(i64),
    Unknown,
}

impl From<i64> for Dim {
    fn from(d: i64) -> Self {
        if d < 0 {
            Dim::Unknown
        } else {
            Dim::Fixed(d)
        }
    }
}

impl From<Dim> for i64 {
    fn from(d: Dim) -> Self {
        match d {
            Dim::Fixed(n) => n,
            Dim::Unknown => -1,
        }
    }
}

/// Source location of a traced call, used in diagnostics and names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineProp {
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub line: u32,
}

impl LineProp {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.file.is_empty() && self.line == 0
    }
}

impl fmt::Display for LineProp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.file.is_empty() {
            write!(f, "L{}", self.line)
        } else {
            write!(f, "{}:{}", self.file, self.line)
        }
    }
}

/// Python-like scalar recorded by the tracer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
}

impl Scalar {
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Scalar::Int(i) => Some(i),
            Scalar::Float(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueKind {
    Tensor {
        #[serde(default)]
        shape: Vec<Dim>,
        #[serde(default)]
        dtype: Option<ElementType>,
    },
    Number {
        value: Scalar,
    },
    /// Ordered aggregate of other values
    Tuple {
        elements: Vec<ValueId>,
    },
    Other,
}

/// A value in the traced graph
///
/// Created by the front-end. The exporter only writes `onnx_name`, once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Value {
    #[serde(default)]
    pub name: String,
    /// Location of the call that produced this value, if any
    #[serde(default)]
    pub generator: Option<LineProp>,
    pub kind: ValueKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub onnx_name: String,
}

impl Value {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            generator: None,
            kind,
            onnx_name: String::new(),
        }
    }

    pub fn tensor(name: impl Into<String>, shape: Vec<Dim>) -> Self {
        Self::new(name, ValueKind::Tensor { shape, dtype: None })
    }

    pub fn number(name: impl Into<String>, value: Scalar) -> Self {
        Self::new(name, ValueKind::Number { value })
    }

    pub fn tuple(name: impl Into<String>, elements: Vec<ValueId>) -> Self {
        Self::new(name, ValueKind::Tuple { elements })
    }

    pub fn with_generator(mut self, lineprop: LineProp) -> Self {
        self.generator = Some(lineprop);
        self
    }

    pub fn with_dtype(mut self, element_type: ElementType) -> Self {
        if let ValueKind::Tensor { dtype, .. } = &mut self.kind {
            *dtype = Some(element_type);
        }
        self
    }

    pub fn is_named(&self) -> bool {
        !self.onnx_name.is_empty()
    }

    pub fn tuple_elements(&self) -> Option<&[ValueId]> {
        match &self.kind {
            ValueKind::Tuple { elements } => Some(elements),
            _ => None,
        }
    }
}
