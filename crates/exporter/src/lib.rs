//! # Elichika ONNX exporter
//!
//! Converts the traced graph of one forward pass into an ONNX model.
//!
//! ```text
//! Trace (values + nodes)
//!     ↓  naming     unique onnx_name per value/node
//!     ↓  lowering   one rule per recognized call → ONNX operators
//!     ↓  builder    declarations, initializers, nodes, boundary
//! ModelProto  →  binary (.onnx) or protobuf text
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use elichika_onnx_exporter::{compile_model, save_model, ExportConfig, TraceFile};
//!
//! let model = compile_model(&TraceFile::new("trace.json"), &ExportConfig::default())?;
//! save_model(&model, "model.onnx")?;
//! # Ok::<(), elichika_onnx_exporter::ExportError>(())
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod generator;
pub mod lowering;
pub mod model;
pub mod naming;
pub mod proto;
pub mod source;
pub mod text_format;

pub use builder::{Attribute, GraphBuilder, TensorDim};
pub use config::{ConfigError, ConfigFile, ExportConfig};
pub use error::{ExportError, Result};
pub use generator::{GenerationStats, OnnxGenerator};
pub use lowering::{LoweringContext, LoweringRule, RuleRegistry};
pub use model::{compile_model, compile_trace, load_model, save_model, save_model_as_text, OnnxModel};
pub use naming::NameAllocator;
pub use source::{Frontend, Trace, TraceFile};
