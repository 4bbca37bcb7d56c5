//! Protobuf text format for ONNX models
//!
//! Fields are printed in field-number order. Singular scalars equal to their
//! proto3 default are omitted; repeated fields print one line per element.

use std::fmt::{Display, Write};

use crate::proto::attribute_proto::AttributeType;
use crate::proto::tensor_shape_proto::{dimension, Dimension};
use crate::proto::{
    type_proto, AttributeProto, GraphProto, ModelProto, NodeProto, OperatorSetIdProto,
    StringStringEntryProto, TensorProto, TensorShapeProto, TypeProto, ValueInfoProto,
};

/// Render a model as protobuf text
pub fn to_text(model: &ModelProto) -> String {
    let mut printer = Printer::default();
    printer.model(model);
    printer.out
}

/// Clear initializer payloads holding at least `threshold` elements
///
/// Returns the number of fields cleared.
pub fn strip_large_values(model: &mut ModelProto, threshold: usize) -> usize {
    fn clear_if_large<T>(field: &mut Vec<T>, threshold: usize) -> usize {
        if field.len() >= threshold {
            field.clear();
            1
        } else {
            0
        }
    }

    let Some(graph) = model.graph.as_mut() else {
        return 0;
    };
    graph
        .initializer
        .iter_mut()
        .map(|t| {
            clear_if_large(&mut t.float_data, threshold)
                + clear_if_large(&mut t.int32_data, threshold)
                + clear_if_large(&mut t.string_data, threshold)
                + clear_if_large(&mut t.int64_data, threshold)
                + clear_if_large(&mut t.raw_data, threshold)
                + clear_if_large(&mut t.double_data, threshold)
                + clear_if_large(&mut t.uint64_data, threshold)
        })
        .sum()
}

#[derive(Default)]
struct Printer {
    out: String,
    depth: usize,
}

impl Printer {
    fn line(&mut self, name: &str, value: impl Display) {
        let _ = writeln!(self.out, "{:indent$}{}: {}", "", name, value, indent = self.depth * 2);
    }

    fn scalar<T: Display + Default + PartialEq>(&mut self, name: &str, value: &T) {
        if *value != T::default() {
            self.line(name, value);
        }
    }

    fn repeated<T: Display>(&mut self, name: &str, values: &[T]) {
        for value in values {
            self.line(name, value);
        }
    }

    fn string(&mut self, name: &str, value: &str) {
        if !value.is_empty() {
            self.quoted(name, value.as_bytes());
        }
    }

    fn strings(&mut self, name: &str, values: &[String]) {
        for value in values {
            self.quoted(name, value.as_bytes());
        }
    }

    fn bytes(&mut self, name: &str, value: &[u8]) {
        if !value.is_empty() {
            self.quoted(name, value);
        }
    }

    fn quoted(&mut self, name: &str, value: &[u8]) {
        self.line(name, format_args!("\"{}\"", escape(value)));
    }

    fn message(&mut self, name: &str, body: impl FnOnce(&mut Self)) {
        let _ = writeln!(self.out, "{:indent$}{} {{", "", name, indent = self.depth * 2);
        self.depth += 1;
        body(self);
        self.depth -= 1;
        let _ = writeln!(self.out, "{:indent$}}}", "", indent = self.depth * 2);
    }

    fn model(&mut self, model: &ModelProto) {
        self.scalar("ir_version", &model.ir_version);
        self.string("producer_name", &model.producer_name);
        self.string("producer_version", &model.producer_version);
        self.string("domain", &model.domain);
        self.scalar("model_version", &model.model_version);
        self.string("doc_string", &model.doc_string);
        if let Some(graph) = &model.graph {
            self.message("graph", |p| p.graph(graph));
        }
        for opset in &model.opset_import {
            self.message("opset_import", |p| p.opset(opset));
        }
        for prop in &model.metadata_props {
            self.message("metadata_props", |p| p.entry(prop));
        }
    }

    fn graph(&mut self, graph: &GraphProto) {
        for node in &graph.node {
            self.message("node", |p| p.node(node));
        }
        self.string("name", &graph.name);
        for tensor in &graph.initializer {
            self.message("initializer", |p| p.tensor(tensor));
        }
        self.string("doc_string", &graph.doc_string);
        for info in &graph.input {
            self.message("input", |p| p.value_info(info));
        }
        for info in &graph.output {
            self.message("output", |p| p.value_info(info));
        }
        for info in &graph.value_info {
            self.message("value_info", |p| p.value_info(info));
        }
    }

    fn node(&mut self, node: &NodeProto) {
        self.strings("input", &node.input);
        self.strings("output", &node.output);
        self.string("name", &node.name);
        self.string("op_type", &node.op_type);
        for attr in &node.attribute {
            self.message("attribute", |p| p.attribute(attr));
        }
        self.string("doc_string", &node.doc_string);
        self.string("domain", &node.domain);
    }

    fn attribute(&mut self, attr: &AttributeProto) {
        self.string("name", &attr.name);
        self.scalar("f", &attr.f);
        self.scalar("i", &attr.i);
        self.bytes("s", &attr.s);
        if let Some(t) = &attr.t {
            self.message("t", |p| p.tensor(t));
        }
        if let Some(g) = &attr.g {
            self.message("g", |p| p.graph(g));
        }
        self.repeated("floats", &attr.floats);
        self.repeated("ints", &attr.ints);
        for s in &attr.strings {
            self.quoted("strings", s);
        }
        for t in &attr.tensors {
            self.message("tensors", |p| p.tensor(t));
        }
        for g in &attr.graphs {
            self.message("graphs", |p| p.graph(g));
        }
        self.string("doc_string", &attr.doc_string);
        if attr.r#type != 0 {
            match AttributeType::try_from(attr.r#type) {
                Ok(t) => self.line("type", t.as_str_name()),
                Err(_) => self.line("type", attr.r#type),
            }
        }
        self.string("ref_attr_name", &attr.ref_attr_name);
    }

    fn tensor(&mut self, tensor: &TensorProto) {
        self.repeated("dims", &tensor.dims);
        self.scalar("data_type", &tensor.data_type);
        self.repeated("float_data", &tensor.float_data);
        self.repeated("int32_data", &tensor.int32_data);
        for s in &tensor.string_data {
            self.quoted("string_data", s);
        }
        self.repeated("int64_data", &tensor.int64_data);
        self.string("name", &tensor.name);
        self.bytes("raw_data", &tensor.raw_data);
        self.repeated("double_data", &tensor.double_data);
        self.repeated("uint64_data", &tensor.uint64_data);
        self.string("doc_string", &tensor.doc_string);
    }

    fn value_info(&mut self, info: &ValueInfoProto) {
        self.string("name", &info.name);
        if let Some(t) = &info.r#type {
            self.message("type", |p| p.type_proto(t));
        }
        self.string("doc_string", &info.doc_string);
    }

    fn type_proto(&mut self, t: &TypeProto) {
        match &t.value {
            Some(type_proto::Value::TensorType(tensor)) => {
                self.message("tensor_type", |p| {
                    p.scalar("elem_type", &tensor.elem_type);
                    if let Some(shape) = &tensor.shape {
                        p.message("shape", |p| p.shape(shape));
                    }
                });
            }
            None => {}
        }
        self.string("denotation", &t.denotation);
    }

    fn shape(&mut self, shape: &TensorShapeProto) {
        for dim in &shape.dim {
            self.message("dim", |p| p.dimension(dim));
        }
    }

    fn dimension(&mut self, dim: &Dimension) {
        // oneof members print even when they hold the default
        match &dim.value {
            Some(dimension::Value::DimValue(v)) => self.line("dim_value", v),
            Some(dimension::Value::DimParam(s)) => self.quoted("dim_param", s.as_bytes()),
            None => {}
        }
        self.string("denotation", &dim.denotation);
    }

    fn opset(&mut self, opset: &OperatorSetIdProto) {
        self.string("domain", &opset.domain);
        self.scalar("version", &opset.version);
    }

    fn entry(&mut self, entry: &StringStringEntryProto) {
        self.string("key", &entry.key);
        self.string("value", &entry.value);
    }
}

/// C-style escaping; bytes outside printable ASCII become octal
fn escape(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b'"' => out.push_str("\\\""),
            b'\'' => out.push_str("\\'"),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(b as char),
            _ => {
                let _ = write!(out, "\\{:03o}", b);
            }
        }
    }
    out
}
