//! Graph generator
//!
//! Drives one conversion run over a traced graph:
//!
//! ```text
//! Trace
//!     ↓
//! 0. Name → unique onnx_name for every value and node (subgraphs included)
//!     ↓
//! 1. Declare → one tensor per value a node touches
//!     ↓
//! 2. Lower → dispatch each node to its rule (unknown calls are skipped)
//!     ↓
//! 3. Bind → graph inputs/outputs from the trace boundary
//!     ↓
//! 4. Finalize → GraphProto wrapped in a ModelProto
//! ```
//!
//! # Example
//!
//! ```no_run
//! use elichika_onnx_exporter::{ExportConfig, OnnxGenerator, Trace};
//!
//! let mut trace = Trace::from_json(&std::fs::read_to_string("trace.json")?)?;
//! let mut generator = OnnxGenerator::new(ExportConfig::default());
//! let model = generator.generate_model(&mut trace)?;
//! println!("{} nodes", model.graph.map_or(0, |g| g.node.len()));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::time::{Duration, Instant};

use rustc_hash::FxHashSet;
use tracing::{debug, info};

use crate::builder::GraphBuilder;
use crate::config::ExportConfig;
use crate::lowering::{LoweringContext, RuleRegistry};
use crate::naming::NameAllocator;
use crate::proto::{GraphProto, ModelProto, OperatorSetIdProto};
use crate::source::{Trace, Value, ValueId};
use crate::{ExportError, Result};

/// Counters for the last conversion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationStats {
    /// Top-level nodes walked
    pub nodes_visited: usize,
    /// Nodes handled by a lowering rule
    pub nodes_lowered: usize,
    /// Nodes with no rule
    pub nodes_skipped: usize,
    pub operators_emitted: usize,
    pub initializers: usize,
    pub elapsed: Duration,
}

/// Converts traced graphs into ONNX models
///
/// Owns the name allocator for its runs; each `generate_model` call starts
/// from an empty allocator.
pub struct OnnxGenerator {
    config: ExportConfig,
    rules: RuleRegistry,
    names: NameAllocator,
    stats: GenerationStats,
}

impl OnnxGenerator {
    /// Generator with the standard rule catalogue
    pub fn new(config: ExportConfig) -> Self {
        let names = NameAllocator::new().with_qualified_value_names(config.qualify_value_names);
        Self {
            config,
            rules: RuleRegistry::standard(),
            names,
            stats: GenerationStats::default(),
        }
    }

    /// Replace the rule catalogue
    pub fn with_rules(mut self, rules: RuleRegistry) -> Self {
        self.rules = rules;
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    /// Statistics of the most recent run
    pub fn stats(&self) -> &GenerationStats {
        &self.stats
    }

    /// Name the trace and convert it into a model
    ///
    /// Names already assigned in `trace` are kept, so converting the same
    /// trace twice gives the same model.
    pub fn generate_model(&mut self, trace: &mut Trace) -> Result<ModelProto> {
        self.names.clear();
        trace.validate()?;
        self.names.assign_trace(trace)?;
        debug!("Assigned {} names", self.names.len());

        let graph = self.generate_graph(trace)?;

        Ok(ModelProto {
            ir_version: self.config.ir_version,
            opset_import: vec![OperatorSetIdProto {
                domain: String::new(),
                version: self.config.opset_version,
            }],
            producer_name: self.config.producer_name.clone(),
            producer_version: self.config.producer_version.clone(),
            graph: Some(graph),
            ..Default::default()
        })
    }

    /// Convert an already-named trace into a graph (steps 1 to 4)
    pub fn generate_graph(&mut self, trace: &Trace) -> Result<GraphProto> {
        let start = Instant::now();
        let mut stats = GenerationStats::default();
        let mut builder = GraphBuilder::new();
        let mut registry: FxHashSet<String> = FxHashSet::default();

        for node in &trace.graph.nodes {
            stats.nodes_visited += 1;

            for &id in node.inputs.iter().chain(&node.outputs) {
                declare_value(&mut builder, &mut registry, &trace.values, id)?;
            }

            let rule = self.rules.resolve(&node.operation);
            if rule.is_noop() {
                debug!("Skipping {} ({}): no lowering rule", node.onnx_name, node.operation);
                stats.nodes_skipped += 1;
                continue;
            }

            let before = builder.nodes().len();
            rule.lower(&LoweringContext::new(node, &trace.values), &mut builder)?;
            let emitted = builder.nodes().len() - before;
            debug!(
                "Lowered {} with {} rule: {} operator(s)",
                node.onnx_name,
                rule.name(),
                emitted
            );
            stats.nodes_lowered += 1;
            stats.operators_emitted += emitted;
        }

        // Boundary values no node touched still need a declaration
        for &id in trace.inputs.iter().chain(&trace.outputs) {
            declare_value(&mut builder, &mut registry, &trace.values, id)?;
        }
        builder.set_inputs(boundary_names(&trace.values, &trace.inputs)?)?;
        builder.set_outputs(boundary_names(&trace.values, &trace.outputs)?)?;

        stats.initializers = builder.initializers().len();
        let graph = builder.finalize(&self.config.graph_name);
        stats.elapsed = start.elapsed();

        info!(
            "Generated graph '{}': {} nodes visited, {} lowered, {} skipped, {} operators, {} initializers",
            graph.name,
            stats.nodes_visited,
            stats.nodes_lowered,
            stats.nodes_skipped,
            stats.operators_emitted,
            stats.initializers
        );
        self.stats = stats;
        Ok(graph)
    }
}

impl Default for OnnxGenerator {
    fn default() -> Self {
        Self::new(ExportConfig::default())
    }
}

fn value_of(values: &[Value], id: ValueId) -> Result<&Value> {
    values.get(id).ok_or(ExportError::UnknownValue(id))
}

fn declare_value(
    builder: &mut GraphBuilder,
    registry: &mut FxHashSet<String>,
    values: &[Value],
    id: ValueId,
) -> Result<()> {
    let value = value_of(values, id)?;
    if !value.is_named() {
        return Err(ExportError::InvalidTrace(format!(
            "value {} reached the generator without a name",
            id
        )));
    }
    if registry.insert(value.onnx_name.clone()) {
        builder.declare_tensor_for_value(value)?;
    }
    Ok(())
}

fn boundary_names<'a>(values: &'a [Value], ids: &[ValueId]) -> Result<Vec<&'a str>> {
    ids.iter()
        .map(|&id| value_of(values, id).map(|v| v.onnx_name.as_str()))
        .collect()
}
