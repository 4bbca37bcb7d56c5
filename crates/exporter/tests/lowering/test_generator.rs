//! Whole-graph generation tests

use crate::lowering::*;
use elichika_onnx_exporter::builder::GraphBuilder;
use elichika_onnx_exporter::lowering::{LoweringContext, LoweringRule, PointwiseRule, RuleRegistry};
use elichika_onnx_exporter::proto::tensor_shape_proto::dimension::Value as DimValue;
use elichika_onnx_exporter::source::{Dim, Graph, LineProp, Link, Node, Operation, Scalar, Value};
use elichika_onnx_exporter::{compile_model, ExportConfig, ExportError, OnnxGenerator, Trace, TraceFile};

/// x → relu → h → <op> → y
fn trace_with(operation: Operation) -> Trace {
    let mut trace = Trace::new();
    let x = trace.add_value(Value::tensor("x", vec![Dim::Unknown, Dim::Fixed(16)]));
    let h = trace.add_value(Value::tensor("h", vec![Dim::Unknown, Dim::Fixed(16)]));
    let y = trace.add_value(Value::tensor("y", vec![]));
    trace.inputs = vec![x];
    trace.outputs = vec![y];
    trace.graph.push(
        Node::new(Operation::function("relu"), vec![x], vec![h]).at(LineProp::new("net.py", 3)),
    );
    trace
        .graph
        .push(Node::new(operation, vec![h], vec![y]).at(LineProp::new("net.py", 4)));
    trace
}

#[test]
fn test_unsupported_node_is_skipped_but_tensors_registered() {
    let unknown = Operation::link(Link::Unknown {
        type_name: "BatchNormalization".to_string(),
    });
    let mut trace = trace_with(unknown);
    let mut generator = OnnxGenerator::new(ExportConfig::default());
    let model = generator.generate_model(&mut trace).unwrap();
    let graph = graph_of(&model);

    assert_eq!(op_types(graph), vec!["Relu"]);
    assert_eq!(generator.stats().nodes_skipped, 1);
    assert_eq!(generator.stats().nodes_lowered, 1);

    // the skipped node's output is still declared, with a placeholder shape
    assert_eq!(names(&graph.output), vec!["y"]);
    assert_eq!(
        dims(&graph.output[0]),
        vec![DimValue::DimParam("Undefined".to_string())]
    );
}

#[test]
fn test_activation_catalogue() {
    for (function, op_type) in [("relu", "Relu"), ("sigmoid", "Sigmoid"), ("tanh", "Tanh")] {
        let mut trace = trace_with(Operation::function(function));
        let model = convert(&mut trace);
        assert_eq!(op_types(graph_of(&model))[1], op_type);
    }
}

#[test]
fn test_softmax_axis_from_trace() {
    let mut trace = trace_with(Operation::function("softmax"));
    let axis = trace.add_value(Value::number("axis", Scalar::Int(-1)));
    trace.graph.nodes[1].inputs.push(axis);

    let model = convert(&mut trace);
    let softmax = find_node(graph_of(&model), "Softmax");
    assert_eq!(softmax.input, vec!["h"]);
    assert_eq!(int_attr(softmax, "axis"), -1);
}

#[test]
fn test_naming_is_idempotent_across_conversions() {
    let mut trace = trace_with(Operation::function("relu"));
    let first = convert(&mut trace);
    let named = trace.clone();

    let second = convert(&mut trace);
    assert_eq!(trace, named);
    assert_eq!(first, second);
}

#[test]
fn test_names_unique_across_subgraphs() {
    let mut trace = trace_with(Operation::function("relu"));
    let h = trace.graph.nodes[0].outputs[0];

    let mut body = Graph::new();
    let inner = trace.add_value(Value::tensor("h", vec![]));
    body.push(Node::new(Operation::function("relu"), vec![h], vec![inner]).at(LineProp::new("net.py", 3)));
    trace.graph.push(
        Node::new(
            Operation::Control {
                name: "for".to_string(),
            },
            vec![h],
            vec![],
        )
        .at(LineProp::new("net.py", 6))
        .with_subgraph(body),
    );

    let model = convert(&mut trace);

    assert_unique_names(&trace);
    assert_eq!(trace.values[inner].onnx_name, "h_1");
    // control nodes have no rule; their bodies are only named
    assert_eq!(op_types(graph_of(&model)), vec!["Relu", "Relu"]);
}

#[test]
fn test_boundary_value_without_nodes_is_declared() {
    let mut trace = trace_with(Operation::function("relu"));
    let mask = trace.add_value(Value::tensor("mask", vec![Dim::Fixed(16)]));
    trace.inputs.push(mask);

    let model = convert(&mut trace);
    let graph = graph_of(&model);
    assert_eq!(&names(&graph.input)[..2], &["x", "mask"]);
    assert_resolvable(graph);
}

#[test]
fn test_preassigned_output_name_does_not_alias_input() {
    let mut trace = trace_with(Operation::function("relu"));
    trace.values[2].onnx_name = "x".to_string();

    let model = convert(&mut trace);
    let graph = graph_of(&model);
    assert_eq!(names(&graph.input), vec!["x_1"]);
    assert_eq!(names(&graph.output), vec!["x"]);
    assert_eq!(graph.node[0].input, vec!["x_1"]);
    assert_eq!(graph.node[1].output, vec!["x"]);
    assert_resolvable(graph);
    assert_unique_names(&trace);
}

#[test]
fn test_duplicate_preassigned_names_abort() {
    let mut trace = trace_with(Operation::function("relu"));
    trace.values[0].onnx_name = "z".to_string();
    trace.values[2].onnx_name = "z".to_string();

    let err = OnnxGenerator::new(ExportConfig::default())
        .generate_model(&mut trace)
        .unwrap_err();
    assert!(matches!(err, ExportError::DuplicateName(ref name) if name == "z"));
}

#[test]
fn test_initializer_named_like_boundary_listed_once() {
    struct ConstantOutput;

    impl LoweringRule for ConstantOutput {
        fn name(&self) -> &str {
            "ConstantOutput"
        }

        fn lower(&self, ctx: &LoweringContext<'_>, builder: &mut GraphBuilder) -> elichika_onnx_exporter::Result<()> {
            let array = elichika_onnx_exporter::source::Array::zeros_f32(vec![16]);
            builder.declare_constant(&array, ctx.output_name(0)?)?;
            Ok(())
        }
    }

    let mut rules = RuleRegistry::standard();
    rules.register_function("constant_like", ConstantOutput);
    let mut trace = trace_with(Operation::function("constant_like"));

    let model = OnnxGenerator::new(ExportConfig::default())
        .with_rules(rules)
        .generate_model(&mut trace)
        .unwrap();
    let graph = graph_of(&model);

    assert_eq!(names(&graph.input), vec!["x"]);
    assert_eq!(names(&graph.output), vec!["y"]);
    assert!(graph.initializer.is_empty());
    assert_no_double_emission(graph);
}

#[test]
fn test_custom_registry_overrides_catalogue() {
    let mut rules = RuleRegistry::empty();
    rules.register_function("swish", PointwiseRule::new("Swish"));
    let mut trace = trace_with(Operation::function("swish"));

    let mut generator = OnnxGenerator::new(ExportConfig::default()).with_rules(rules);
    let model = generator.generate_model(&mut trace).unwrap();

    // relu is not registered in the empty catalogue
    assert_eq!(op_types(graph_of(&model)), vec!["Swish"]);
    assert_eq!(generator.stats().nodes_skipped, 1);
}

#[test]
fn test_qualified_value_names() {
    let mut trace = trace_with(Operation::function("relu"));
    trace.values[1].generator = Some(LineProp::new("net.py", 3));

    let config = ExportConfig::default().with_qualified_value_names(true);
    let model = OnnxGenerator::new(config).generate_model(&mut trace).unwrap();

    assert_eq!(trace.values[1].onnx_name, "h_net.py:3");
    assert_eq!(find_node(graph_of(&model), "Relu").output, vec!["h_net.py:3"]);
}

#[test]
fn test_malformed_trace_aborts_without_model() {
    let mut trace = trace_with(Operation::function("relu"));
    trace.graph.nodes[1].inputs.push(99);

    let err = OnnxGenerator::new(ExportConfig::default())
        .generate_model(&mut trace)
        .unwrap_err();
    assert!(matches!(err, ExportError::UnknownValue(99)));
}

#[test]
fn test_compile_from_json_trace() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.json");
    std::fs::write(
        &path,
        r#"{
            "values": [
                {"name": "x", "kind": {"type": "tensor", "shape": [-1, 2]}},
                {"name": "h", "kind": {"type": "tensor", "shape": [-1, 3]}},
                {"name": "y", "kind": {"type": "tensor", "shape": [-1, 3]}},
                {"name": "", "kind": {"type": "number", "value": 1}}
            ],
            "inputs": [0],
            "outputs": [2],
            "graph": {"nodes": [
                {
                    "op": "link",
                    "link": {
                        "type": "Linear",
                        "W": {"shape": [3, 2], "data": {"dtype": "float32", "values": [1, 2, 3, 4, 5, 6]}},
                        "b": {"shape": [3], "data": {"dtype": "float32", "values": [0, 0, 0]}}
                    },
                    "inputs": [0], "outputs": [1],
                    "lineprop": {"file": "mlp.py", "line": 7}
                },
                {
                    "op": "function", "name": "softmax",
                    "inputs": [1, 3], "outputs": [2],
                    "lineprop": {"file": "mlp.py", "line": 8}
                }
            ]}
        }"#,
    )
    .unwrap();

    let model = compile_model(&TraceFile::new(&path), &ExportConfig::default()).unwrap();
    let graph = graph_of(&model.model);

    assert_eq!(
        op_types(graph),
        vec!["Shape", "Gather", "Unsqueeze", "Concat", "Reshape", "Gemm", "Softmax"]
    );
    assert_eq!(int_attr(find_node(graph, "Softmax"), "axis"), 1);
    assert_eq!(model.input_names(), vec!["x"]);
    assert_eq!(model.output_names(), vec!["y"]);
    assert_resolvable(graph);
}
