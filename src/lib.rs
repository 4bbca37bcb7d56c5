//! # Elichika ONNX
//!
//! Export traced neural-network graphs to ONNX.
//!
//! ## CLI Usage
//!
//! ```bash
//! # Convert a JSON trace to a binary ONNX model (plus a text dump)
//! elichika-onnx convert --input trace.json --output model.onnx --text model.txt
//!
//! # Print models as protobuf text, hiding large weight payloads
//! elichika-onnx dump model.onnx
//! ```
//!
//! ## Library Usage
//!
//! ```no_run
//! use elichika_onnx::{compile_model, save_model, ExportConfig, TraceFile};
//!
//! let config = ExportConfig::default().with_producer_name("my-tracer");
//! let model = compile_model(&TraceFile::new("trace.json"), &config)?;
//! save_model(&model, "model.onnx")?;
//! # Ok::<(), elichika_onnx::ExportError>(())
//! ```

// Re-export everything from the exporter crate
pub use elichika_onnx_exporter::*;

/// Crate version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
