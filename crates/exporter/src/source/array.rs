//! Host array payloads carried by traced layers (weights, biases).

use serde::{Deserialize, Serialize};

use crate::proto::tensor_proto::DataType;
use crate::{ExportError, Result};

/// Element type of a host array or traced tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Float32,
    Float64,
    Int32,
    Int64,
}

impl ElementType {
    /// ONNX `TensorProto.DataType` for this element type
    pub fn data_type(self) -> DataType {
        match self {
            ElementType::Float32 => DataType::Float,
            ElementType::Float64 => DataType::Double,
            ElementType::Int32 => DataType::Int32,
            ElementType::Int64 => DataType::Int64,
        }
    }
}

/// Flattened (row-major) array contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dtype", content = "values", rename_all = "lowercase")]
pub enum ArrayData {
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
}

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Float32(v) => v.len(),
            ArrayData::Float64(v) => v.len(),
            ArrayData::Int32(v) => v.len(),
            ArrayData::Int64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            ArrayData::Float32(_) => ElementType::Float32,
            ArrayData::Float64(_) => ElementType::Float64,
            ArrayData::Int32(_) => ElementType::Int32,
            ArrayData::Int64(_) => ElementType::Int64,
        }
    }
}

/// A dense host array: shape plus flattened data
///
/// An empty shape denotes a scalar holding exactly one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Array {
    pub shape: Vec<usize>,
    pub data: ArrayData,
}

impl Array {
    pub fn new(shape: Vec<usize>, data: ArrayData) -> Self {
        Self { shape, data }
    }

    pub fn from_f32(shape: Vec<usize>, values: Vec<f32>) -> Self {
        Self::new(shape, ArrayData::Float32(values))
    }

    /// Zero-filled float32 array of the given shape
    pub fn zeros_f32(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self::from_f32(shape, vec![0.0; len])
    }

    pub fn scalar_i64(value: i64) -> Self {
        Self::new(Vec::new(), ArrayData::Int64(vec![value]))
    }

    pub fn from_i64(values: Vec<i64>) -> Self {
        Self::new(vec![values.len()], ArrayData::Int64(values))
    }

    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    /// Check that the flattened data fills the declared shape exactly
    pub fn validate(&self) -> Result<()> {
        if self.num_elements() != self.data.len() {
            return Err(ExportError::ShapeMismatch {
                shape: self.shape.clone(),
                len: self.data.len(),
            });
        }
        Ok(())
    }
}
