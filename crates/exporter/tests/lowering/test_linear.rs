//! Fully-connected layer lowering tests

use crate::lowering::*;
use elichika_onnx_exporter::proto::tensor_proto::DataType;
use elichika_onnx_exporter::proto::tensor_shape_proto::dimension::Value as DimValue;

#[test]
fn test_linear_with_bias_emits_gemm() {
    let mut trace = linear_trace(10, 784, true);
    let model = convert(&mut trace);
    let graph = graph_of(&model);

    assert_eq!(
        op_types(graph),
        vec!["Shape", "Gather", "Unsqueeze", "Concat", "Reshape", "Gemm"]
    );

    let gemm = find_node(graph, "Gemm");
    assert_eq!(int_attr(gemm, "transA"), 0);
    assert_eq!(int_attr(gemm, "transB"), 1);

    let node_name = &trace.graph.nodes[0].onnx_name;
    assert_eq!(
        gemm.input,
        vec![
            format!("{}/x_reshape", node_name),
            format!("{}/W", node_name),
            format!("{}/B", node_name),
        ]
    );
    assert_eq!(gemm.output, vec!["y"]);
}

#[test]
fn test_linear_without_bias_transposes_weight() {
    let mut trace = linear_trace(10, 784, false);
    let model = convert(&mut trace);
    let graph = graph_of(&model);

    assert_eq!(
        op_types(graph),
        vec!["Shape", "Gather", "Unsqueeze", "Concat", "Reshape", "Transpose", "MatMul"]
    );
    assert_eq!(ints_attr(find_node(graph, "Transpose"), "perm"), vec![1, 0]);

    let node_name = &trace.graph.nodes[0].onnx_name;
    let matmul = find_node(graph, "MatMul");
    assert_eq!(matmul.input[1], format!("{}/Temp", node_name));
    assert!(graph.initializer.iter().all(|t| !t.name.ends_with("/B")));
}

#[test]
fn test_linear_reshape_sequence_wiring() {
    let mut trace = linear_trace(10, 784, true);
    let model = convert(&mut trace);
    let graph = graph_of(&model);
    let node_name = &trace.graph.nodes[0].onnx_name;
    let scoped = |role: &str| format!("{}/{}", node_name, role);

    let shape = find_node(graph, "Shape");
    assert_eq!(shape.input, vec!["x"]);
    assert_eq!(shape.output, vec![scoped("x_shape")]);

    let gather = find_node(graph, "Gather");
    assert_eq!(gather.input, vec![scoped("x_shape"), scoped("Zero")]);

    let unsqueeze = find_node(graph, "Unsqueeze");
    assert_eq!(ints_attr(unsqueeze, "axes"), vec![0]);

    let concat = find_node(graph, "Concat");
    assert_eq!(concat.input, vec![scoped("batch_size_2"), scoped("Minus1")]);
    assert_eq!(int_attr(concat, "axis"), 0);

    let reshape = find_node(graph, "Reshape");
    assert_eq!(reshape.input, vec!["x".to_string(), scoped("mat_shape")]);

    // every emitted node carries the call site
    assert!(graph.node.iter().all(|n| n.name == "mlp.py:12"));
}

#[test]
fn test_linear_initializers() {
    let mut trace = linear_trace(10, 784, true);
    let model = convert(&mut trace);
    let graph = graph_of(&model);
    let node_name = &trace.graph.nodes[0].onnx_name;

    let init_names: Vec<&str> = graph.initializer.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(
        init_names,
        vec![
            format!("{}/W", node_name),
            format!("{}/Zero", node_name),
            format!("{}/Minus1", node_name),
            format!("{}/B", node_name),
        ]
    );

    let weight = &graph.initializer[0];
    assert_eq!(weight.dims, vec![10, 784]);
    assert_eq!(weight.data_type, DataType::Float as i32);
    assert_eq!(weight.float_data.len(), 7840);

    let zero = &graph.initializer[1];
    assert!(zero.dims.is_empty());
    assert_eq!(zero.int64_data, vec![0]);

    let minus1 = &graph.initializer[2];
    assert_eq!(minus1.dims, vec![1]);
    assert_eq!(minus1.int64_data, vec![-1]);
}

#[test]
fn test_linear_graph_boundary() {
    let mut trace = linear_trace(10, 784, true);
    let model = convert(&mut trace);
    let graph = graph_of(&model);

    // boundary input first, then one declaration per initializer
    assert_eq!(graph.input.len(), 1 + graph.initializer.len());
    assert_eq!(graph.input[0].name, "x");
    assert_eq!(
        dims(&graph.input[0]),
        vec![DimValue::DimParam("Undefined".to_string()), DimValue::DimValue(784)]
    );
    assert_eq!(names(&graph.output), vec!["y"]);

    let zero_input = graph
        .input
        .iter()
        .find(|i| i.name.ends_with("/Zero"))
        .unwrap();
    assert_eq!(elem_type(zero_input), DataType::Int64 as i32);

    assert_resolvable(graph);
    assert_no_double_emission(graph);
}

#[test]
fn test_two_linear_layers_get_distinct_constants() {
    let mut trace = linear_trace(10, 784, true);
    let y = trace.outputs[0];
    let link = trace.graph.nodes[0].operation.clone();
    let z = trace.add_value(elichika_onnx_exporter::source::Value::tensor("y", vec![]));
    trace.outputs = vec![z];
    trace.graph.push(
        elichika_onnx_exporter::source::Node::new(link, vec![y], vec![z])
            .at(elichika_onnx_exporter::source::LineProp::new("mlp.py", 12)),
    );

    let model = convert(&mut trace);
    let graph = graph_of(&model);

    assert_eq!(graph.node.len(), 12);
    assert_eq!(graph.initializer.len(), 8);
    assert_ne!(trace.graph.nodes[0].onnx_name, trace.graph.nodes[1].onnx_name);
    assert_eq!(trace.values[z].onnx_name, "y_1");
    assert_unique_names(&trace);
    assert_resolvable(graph);
}
