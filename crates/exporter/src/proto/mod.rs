//! ONNX protobuf messages
//!
//! Message definitions follow the prost-build output for `onnx.proto3`,
//! restricted to the messages a forward-pass model needs.

#![allow(clippy::derive_partial_eq_without_eq)]

mod onnx;

pub use onnx::*;
