//! ONNX graph builder
//!
//! Accumulates tensor declarations, constant initializers and operator nodes
//! while the generator walks the trace, then assembles them into a
//! [`GraphProto`].

use rustc_hash::{FxHashMap, FxHashSet};

use crate::proto::attribute_proto::AttributeType;
use crate::proto::tensor_proto::DataType;
use crate::proto::tensor_shape_proto::{dimension, Dimension};
use crate::proto::{
    type_proto, AttributeProto, GraphProto, NodeProto, TensorProto, TensorShapeProto, TypeProto,
    ValueInfoProto,
};
use crate::source::{Array, ArrayData, Dim, Value, ValueKind};
use crate::{ExportError, Result};

/// Symbolic dimension written for anything the trace does not know
pub const UNDEFINED_DIM: &str = "Undefined";

/// A declared dimension: concrete extent or symbolic parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TensorDim {
    Value(i64),
    Param(String),
}

impl TensorDim {
    pub fn undefined() -> Self {
        TensorDim::Param(UNDEFINED_DIM.to_string())
    }

    fn to_proto(&self) -> Dimension {
        let value = match self {
            TensorDim::Value(v) => dimension::Value::DimValue(*v),
            TensorDim::Param(p) => dimension::Value::DimParam(p.clone()),
        };
        Dimension {
            value: Some(value),
            ..Default::default()
        }
    }
}

impl From<Dim> for TensorDim {
    fn from(dim: Dim) -> Self {
        match dim {
            Dim::Fixed(n) => TensorDim::Value(n),
            Dim::Unknown => TensorDim::undefined(),
        }
    }
}

/// Operator attribute payload
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Int(i64),
    Ints(Vec<i64>),
    Float(f32),
    Floats(Vec<f32>),
    String(String),
}

impl Attribute {
    pub fn to_proto(&self, name: &str) -> AttributeProto {
        let mut proto = AttributeProto {
            name: name.to_string(),
            ..Default::default()
        };
        let attr_type = match self {
            Attribute::Int(i) => {
                proto.i = *i;
                AttributeType::Int
            }
            Attribute::Ints(ints) => {
                proto.ints = ints.clone();
                AttributeType::Ints
            }
            Attribute::Float(f) => {
                proto.f = *f;
                AttributeType::Float
            }
            Attribute::Floats(floats) => {
                proto.floats = floats.clone();
                AttributeType::Floats
            }
            Attribute::String(s) => {
                proto.s = s.as_bytes().to_vec();
                AttributeType::String
            }
        };
        proto.r#type = attr_type as i32;
        proto
    }
}

impl From<i64> for Attribute {
    fn from(i: i64) -> Self {
        Attribute::Int(i)
    }
}

impl From<Vec<i64>> for Attribute {
    fn from(ints: Vec<i64>) -> Self {
        Attribute::Ints(ints)
    }
}

impl<const N: usize> From<[i64; N]> for Attribute {
    fn from(ints: [i64; N]) -> Self {
        Attribute::Ints(ints.to_vec())
    }
}

impl From<f32> for Attribute {
    fn from(f: f32) -> Self {
        Attribute::Float(f)
    }
}

/// A constant tensor registered with the builder
#[derive(Debug, Clone, PartialEq)]
pub struct Initializer {
    pub name: String,
    pub data_type: DataType,
    pub dims: Vec<i64>,
    pub tensor: TensorProto,
}

/// Build a `ValueInfoProto` for a tensor of the given element type and dims
pub fn make_tensor_value_info(name: &str, data_type: DataType, dims: &[TensorDim]) -> ValueInfoProto {
    let tensor_type = type_proto::Tensor {
        elem_type: data_type as i32,
        shape: Some(TensorShapeProto {
            dim: dims.iter().map(TensorDim::to_proto).collect(),
        }),
    };
    ValueInfoProto {
        name: name.to_string(),
        r#type: Some(TypeProto {
            value: Some(type_proto::Value::TensorType(tensor_type)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build a `TensorProto` holding `array` in its typed data field
pub fn make_tensor(name: &str, array: &Array) -> TensorProto {
    let mut tensor = TensorProto {
        name: name.to_string(),
        dims: array.shape.iter().map(|&d| d as i64).collect(),
        data_type: array.element_type().data_type() as i32,
        ..Default::default()
    };
    match &array.data {
        ArrayData::Float32(v) => tensor.float_data = v.clone(),
        ArrayData::Float64(v) => tensor.double_data = v.clone(),
        ArrayData::Int32(v) => tensor.int32_data = v.clone(),
        ArrayData::Int64(v) => tensor.int64_data = v.clone(),
    }
    tensor
}

/// Accumulating builder for one ONNX graph
#[derive(Debug, Default)]
pub struct GraphBuilder {
    tensors: FxHashMap<String, ValueInfoProto>,
    initializers: Vec<Initializer>,
    initializer_index: FxHashMap<String, usize>,
    nodes: Vec<NodeProto>,
    inputs: Vec<ValueInfoProto>,
    outputs: Vec<ValueInfoProto>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a placeholder tensor; names must be unique within the graph
    pub fn declare_tensor(
        &mut self,
        dims: Vec<TensorDim>,
        data_type: DataType,
        name: impl Into<String>,
    ) -> Result<ValueInfoProto> {
        let name = name.into();
        if self.tensors.contains_key(&name) {
            return Err(ExportError::DuplicateTensor(name));
        }
        let info = make_tensor_value_info(&name, data_type, &dims);
        self.tensors.insert(name, info.clone());
        Ok(info)
    }

    /// Declare the tensor standing for a traced value, keyed by its `onnx_name`
    ///
    /// Tensors with a known non-empty shape keep it (unknown extents become
    /// `Undefined`); everything else is a rank-1 tensor of undefined length.
    /// The element type defaults to float32.
    pub fn declare_tensor_for_value(&mut self, value: &Value) -> Result<ValueInfoProto> {
        let (dims, data_type): (Vec<TensorDim>, DataType) = match &value.kind {
            ValueKind::Tensor { shape, dtype } if !shape.is_empty() => (
                shape.iter().copied().map(TensorDim::from).collect(),
                dtype.map_or(DataType::Float, |t| t.data_type()),
            ),
            ValueKind::Tensor { dtype, .. } => (
                vec![TensorDim::undefined()],
                dtype.map_or(DataType::Float, |t| t.data_type()),
            ),
            _ => (vec![TensorDim::undefined()], DataType::Float),
        };
        self.declare_tensor(dims, data_type, value.onnx_name.clone())
    }

    /// Register a constant initializer built from host array data
    pub fn declare_constant(&mut self, array: &Array, name: impl Into<String>) -> Result<TensorProto> {
        let name = name.into();
        array.validate()?;
        if self.initializer_index.contains_key(&name) {
            return Err(ExportError::DuplicateTensor(name));
        }

        let tensor = make_tensor(&name, array);
        self.initializer_index
            .insert(name.clone(), self.initializers.len());
        self.initializers.push(Initializer {
            name,
            data_type: array.element_type().data_type(),
            dims: tensor.dims.clone(),
            tensor: tensor.clone(),
        });
        Ok(tensor)
    }

    pub fn tensor(&self, name: &str) -> Result<&ValueInfoProto> {
        self.tensors
            .get(name)
            .ok_or_else(|| ExportError::MissingTensor(name.to_string()))
    }

    pub fn initializer(&self, name: &str) -> Option<&Initializer> {
        self.initializer_index
            .get(name)
            .map(|&index| &self.initializers[index])
    }

    /// True if `name` resolves to a declaration or an initializer
    pub fn resolves(&self, name: &str) -> bool {
        self.tensors.contains_key(name) || self.initializer_index.contains_key(name)
    }

    /// Append an operator node
    ///
    /// Every input and output must be a non-empty name that resolves to a
    /// declared tensor or initializer; anything else is a bug in the calling
    /// lowering rule and aborts the conversion.
    pub fn emit_operator(
        &mut self,
        op_type: &str,
        inputs: &[&str],
        outputs: &[&str],
        name: Option<&str>,
        attributes: &[(&str, Attribute)],
    ) -> Result<()> {
        for &tensor_name in inputs.iter().chain(outputs) {
            if tensor_name.trim().is_empty() {
                return Err(ExportError::MalformedOperator {
                    op_type: op_type.to_string(),
                    reason: "empty tensor identifier".to_string(),
                });
            }
            if !self.resolves(tensor_name) {
                return Err(ExportError::UnresolvedName {
                    op_type: op_type.to_string(),
                    name: tensor_name.to_string(),
                });
            }
        }

        self.nodes.push(NodeProto {
            input: inputs.iter().map(|s| s.to_string()).collect(),
            output: outputs.iter().map(|s| s.to_string()).collect(),
            name: name.unwrap_or_default().to_string(),
            op_type: op_type.to_string(),
            attribute: attributes
                .iter()
                .map(|(attr_name, attr)| attr.to_proto(attr_name))
                .collect(),
            ..Default::default()
        });
        Ok(())
    }

    pub fn set_inputs<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) -> Result<()> {
        self.inputs = self.lookup_all(names)?;
        Ok(())
    }

    pub fn set_outputs<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) -> Result<()> {
        self.outputs = self.lookup_all(names)?;
        Ok(())
    }

    fn lookup_all<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Vec<ValueInfoProto>> {
        names
            .into_iter()
            .map(|name| self.tensor(name).cloned())
            .collect()
    }

    pub fn nodes(&self) -> &[NodeProto] {
        &self.nodes
    }

    pub fn initializers(&self) -> &[Initializer] {
        &self.initializers
    }

    /// Assemble the graph
    ///
    /// Inputs are the boundary inputs followed by one declaration per
    /// initializer; initializers sharing a name with a boundary input or output
    /// are left out entirely so no name is listed twice.
    pub fn finalize(self, name: &str) -> GraphProto {
        let boundary: FxHashSet<&str> = self
            .inputs
            .iter()
            .chain(&self.outputs)
            .map(|info| info.name.as_str())
            .collect();

        let mut inputs = self.inputs.clone();
        let mut initializers = Vec::new();
        for init in &self.initializers {
            if boundary.contains(init.name.as_str()) {
                continue;
            }
            let dims: Vec<TensorDim> = init.dims.iter().map(|&d| TensorDim::Value(d)).collect();
            inputs.push(make_tensor_value_info(&init.name, init.data_type, &dims));
            initializers.push(init.tensor.clone());
        }

        GraphProto {
            node: self.nodes,
            name: name.to_string(),
            initializer: initializers,
            input: inputs,
            output: self.outputs,
            ..Default::default()
        }
    }
}
