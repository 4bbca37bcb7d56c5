//! Model-level entry points: convert a traced graph and persist the result.

use std::path::Path;

use prost::Message;
use tracing::info;

use crate::config::ExportConfig;
use crate::generator::{GenerationStats, OnnxGenerator};
use crate::proto::ModelProto;
use crate::source::{Frontend, Trace, Value};
use crate::text_format;
use crate::Result;

/// A converted model together with the trace boundary it was built from
#[derive(Debug, Clone)]
pub struct OnnxModel {
    pub model: ModelProto,
    /// Top-level input values, named
    pub inputs: Vec<Value>,
    /// Top-level output values, named
    pub outputs: Vec<Value>,
    pub stats: GenerationStats,
}

impl OnnxModel {
    /// Graph input names, excluding initializer-backed inputs
    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|v| v.onnx_name.as_str()).collect()
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.outputs.iter().map(|v| v.onnx_name.as_str()).collect()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.model.encode_to_vec()
    }

    pub fn to_text(&self) -> String {
        text_format::to_text(&self.model)
    }
}

/// Trace a model through `frontend` and convert it
pub fn compile_model(frontend: &impl Frontend, config: &ExportConfig) -> Result<OnnxModel> {
    let trace = frontend.convert_model()?;
    compile_trace(trace, config)
}

/// Convert an already traced graph
pub fn compile_trace(mut trace: Trace, config: &ExportConfig) -> Result<OnnxModel> {
    let mut generator = OnnxGenerator::new(config.clone());
    let model = generator.generate_model(&mut trace)?;

    let pick = |ids: &[usize]| -> Result<Vec<Value>> {
        ids.iter().map(|&id| trace.value(id).cloned()).collect()
    };
    Ok(OnnxModel {
        inputs: pick(&trace.inputs)?,
        outputs: pick(&trace.outputs)?,
        model,
        stats: generator.stats().clone(),
    })
}

/// Write the binary protobuf encoding
pub fn save_model(model: &OnnxModel, path: impl AsRef<Path>) -> Result<()> {
    let bytes = model.to_bytes();
    std::fs::write(path.as_ref(), &bytes)?;
    info!("Wrote {} ({} bytes)", path.as_ref().display(), bytes.len());
    Ok(())
}

/// Write the protobuf text form
pub fn save_model_as_text(model: &OnnxModel, path: impl AsRef<Path>) -> Result<()> {
    std::fs::write(path.as_ref(), model.to_text())?;
    info!("Wrote {}", path.as_ref().display());
    Ok(())
}

/// Read a binary ONNX model
pub fn load_model(path: impl AsRef<Path>) -> Result<ModelProto> {
    let bytes = std::fs::read(path.as_ref())?;
    Ok(ModelProto::decode(bytes.as_slice())?)
}
