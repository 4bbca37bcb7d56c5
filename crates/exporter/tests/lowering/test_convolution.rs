//! 2-D convolution lowering tests

use crate::lowering::*;
use elichika_onnx_exporter::source::Size2d;

#[test]
fn test_conv_scalar_arguments() {
    let mut trace = conv_trace(Size2d::Scalar(3), Size2d::Scalar(1), Size2d::Scalar(1), true);
    let model = convert(&mut trace);
    let graph = graph_of(&model);

    assert_eq!(op_types(graph), vec!["Conv"]);
    let conv = find_node(graph, "Conv");
    assert_eq!(ints_attr(conv, "kernel_shape"), vec![3, 3]);
    assert_eq!(ints_attr(conv, "strides"), vec![1, 1]);
    assert_eq!(ints_attr(conv, "pads"), vec![1, 1, 1, 1]);
    assert_eq!(conv.name, "cnn.py:20");
}

#[test]
fn test_conv_pair_arguments() {
    let mut trace = conv_trace(
        Size2d::Pair(3, 5),
        Size2d::Pair(2, 1),
        Size2d::Pair(1, 2),
        true,
    );
    let model = convert(&mut trace);
    let conv = find_node(graph_of(&model), "Conv");

    assert_eq!(ints_attr(conv, "kernel_shape"), vec![3, 5]);
    assert_eq!(ints_attr(conv, "strides"), vec![2, 1]);
    assert_eq!(ints_attr(conv, "pads"), vec![1, 2, 1, 2]);
}

#[test]
fn test_conv_bias_is_optional_input() {
    let mut with_bias = conv_trace(Size2d::Scalar(3), Size2d::Scalar(1), Size2d::Scalar(0), true);
    let model = convert(&mut with_bias);
    let node_name = &with_bias.graph.nodes[0].onnx_name;
    let conv = find_node(graph_of(&model), "Conv");
    assert_eq!(
        conv.input,
        vec![
            "x".to_string(),
            format!("{}/W", node_name),
            format!("{}/b", node_name),
        ]
    );

    let mut without_bias =
        conv_trace(Size2d::Scalar(3), Size2d::Scalar(1), Size2d::Scalar(0), false);
    let model = convert(&mut without_bias);
    let graph = graph_of(&model);
    assert_eq!(find_node(graph, "Conv").input.len(), 2);
    assert_eq!(graph.initializer.len(), 1);
    assert_eq!(graph.initializer[0].dims, vec![4, 1, 3, 3]);
}

#[test]
fn test_conv_graph_properties() {
    let mut trace = conv_trace(Size2d::Scalar(5), Size2d::Scalar(2), Size2d::Scalar(2), true);
    let model = convert(&mut trace);
    let graph = graph_of(&model);

    assert_eq!(names(&graph.output), vec!["h"]);
    assert_resolvable(graph);
    assert_no_double_emission(graph);
    assert_unique_names(&trace);
}
