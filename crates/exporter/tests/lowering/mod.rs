//! Lowering Test Infrastructure
//!
//! Helpers for building small traces around one traced call, converting them,
//! and inspecting the emitted ONNX graph.

#![allow(dead_code)]

use std::collections::HashSet;

use elichika_onnx_exporter::proto::attribute_proto::AttributeType;
use elichika_onnx_exporter::proto::tensor_shape_proto::dimension::Value as DimValue;
use elichika_onnx_exporter::proto::type_proto::Value as TypeValue;
use elichika_onnx_exporter::proto::{AttributeProto, GraphProto, ModelProto, NodeProto, ValueInfoProto};
use elichika_onnx_exporter::source::{
    Array, Convolution2DLink, Dim, LineProp, LinearLink, Link, Node, Operation, Size2d, Value,
};
use elichika_onnx_exporter::{ExportConfig, OnnxGenerator, Trace};

// ============================================================================
// Trace Construction
// ============================================================================

/// Deterministic float data: 0.0, 0.1, 0.2, ...
pub fn ramp(count: usize) -> Vec<f32> {
    (0..count).map(|i| i as f32 * 0.1).collect()
}

/// `y = Linear(x)` with `W: (out, in)` and an optional bias
pub fn linear_trace(out_size: usize, in_size: usize, with_bias: bool) -> Trace {
    let link = Link::Linear(LinearLink {
        w: Array::from_f32(vec![out_size, in_size], ramp(out_size * in_size)),
        b: with_bias.then(|| Array::from_f32(vec![out_size], ramp(out_size))),
    });

    let mut trace = Trace::new();
    let x = trace.add_value(Value::tensor(
        "x",
        vec![Dim::Unknown, Dim::Fixed(in_size as i64)],
    ));
    let y = trace.add_value(
        Value::tensor("y", vec![Dim::Unknown, Dim::Fixed(out_size as i64)])
            .with_generator(LineProp::new("mlp.py", 12)),
    );
    trace.inputs = vec![x];
    trace.outputs = vec![y];
    trace
        .graph
        .push(Node::new(Operation::link(link), vec![x], vec![y]).at(LineProp::new("mlp.py", 12)));
    trace
}

/// `y = Convolution2D(x)` with 4 output channels over a 1-channel input
pub fn conv_trace(ksize: Size2d, stride: Size2d, pad: Size2d, with_bias: bool) -> Trace {
    let [kh, kw] = ksize.pair();
    let (kh, kw) = (kh as usize, kw as usize);
    let link = Link::Convolution2D(Convolution2DLink {
        w: Array::zeros_f32(vec![4, 1, kh, kw]),
        b: with_bias.then(|| Array::zeros_f32(vec![4])),
        ksize,
        stride,
        pad,
    });

    let mut trace = Trace::new();
    let x = trace.add_value(Value::tensor(
        "x",
        vec![Dim::Unknown, Dim::Fixed(1), Dim::Fixed(28), Dim::Fixed(28)],
    ));
    let y = trace.add_value(Value::tensor("h", vec![]));
    trace.inputs = vec![x];
    trace.outputs = vec![y];
    trace
        .graph
        .push(Node::new(Operation::link(link), vec![x], vec![y]).at(LineProp::new("cnn.py", 20)));
    trace
}

// ============================================================================
// Conversion
// ============================================================================

pub fn convert(trace: &mut Trace) -> ModelProto {
    OnnxGenerator::new(ExportConfig::default())
        .generate_model(trace)
        .expect("conversion failed")
}

pub fn graph_of(model: &ModelProto) -> &GraphProto {
    model.graph.as_ref().expect("model has no graph")
}

// ============================================================================
// Graph Inspection
// ============================================================================

pub fn op_types(graph: &GraphProto) -> Vec<&str> {
    graph.node.iter().map(|n| n.op_type.as_str()).collect()
}

pub fn find_node<'a>(graph: &'a GraphProto, op_type: &str) -> &'a NodeProto {
    graph
        .node
        .iter()
        .find(|n| n.op_type == op_type)
        .unwrap_or_else(|| panic!("no {} node in graph", op_type))
}

pub fn attribute<'a>(node: &'a NodeProto, name: &str) -> &'a AttributeProto {
    node.attribute
        .iter()
        .find(|a| a.name == name)
        .unwrap_or_else(|| panic!("{} has no attribute {}", node.op_type, name))
}

pub fn int_attr(node: &NodeProto, name: &str) -> i64 {
    let attr = attribute(node, name);
    assert_eq!(attr.r#type, AttributeType::Int as i32);
    attr.i
}

pub fn ints_attr(node: &NodeProto, name: &str) -> Vec<i64> {
    let attr = attribute(node, name);
    assert_eq!(attr.r#type, AttributeType::Ints as i32);
    attr.ints.clone()
}

pub fn names(infos: &[ValueInfoProto]) -> Vec<&str> {
    infos.iter().map(|i| i.name.as_str()).collect()
}

pub fn elem_type(info: &ValueInfoProto) -> i32 {
    match info.r#type.as_ref().and_then(|t| t.value.as_ref()) {
        Some(TypeValue::TensorType(t)) => t.elem_type,
        None => panic!("{} has no tensor type", info.name),
    }
}

pub fn dims(info: &ValueInfoProto) -> Vec<DimValue> {
    match info.r#type.as_ref().and_then(|t| t.value.as_ref()) {
        Some(TypeValue::TensorType(t)) => t
            .shape
            .as_ref()
            .map(|s| s.dim.iter().filter_map(|d| d.value.clone()).collect())
            .unwrap_or_default(),
        None => vec![],
    }
}

// ============================================================================
// Property Assertions
// ============================================================================

/// Every node input/output names a graph input, output, initializer or the
/// output of some node
pub fn assert_resolvable(graph: &GraphProto) {
    let mut known: HashSet<&str> = HashSet::new();
    known.extend(graph.input.iter().map(|i| i.name.as_str()));
    known.extend(graph.output.iter().map(|o| o.name.as_str()));
    known.extend(graph.initializer.iter().map(|t| t.name.as_str()));
    known.extend(graph.node.iter().flat_map(|n| n.output.iter().map(String::as_str)));

    for node in &graph.node {
        for name in node.input.iter().chain(&node.output) {
            assert!(!name.is_empty(), "{} has an empty tensor name", node.op_type);
            assert!(
                known.contains(name.as_str()),
                "{} references unknown tensor {}",
                node.op_type,
                name
            );
        }
    }
}

/// No name is listed twice among graph inputs and outputs
pub fn assert_no_double_emission(graph: &GraphProto) {
    let mut seen = HashSet::new();
    for name in graph.input.iter().chain(&graph.output).map(|i| i.name.as_str()) {
        assert!(seen.insert(name), "{} listed twice at the graph boundary", name);
    }
}

/// Every value and node of the trace carries a distinct name
pub fn assert_unique_names(trace: &Trace) {
    let mut seen = HashSet::new();
    for value in &trace.values {
        assert!(!value.onnx_name.is_empty(), "unnamed value {:?}", value.name);
        assert!(seen.insert(value.onnx_name.clone()), "duplicate name {}", value.onnx_name);
    }
    trace.graph.walk(&mut |node: &Node| {
        assert!(!node.onnx_name.is_empty(), "unnamed node {}", node);
        assert!(seen.insert(node.onnx_name.clone()), "duplicate name {}", node.onnx_name);
    });
}
