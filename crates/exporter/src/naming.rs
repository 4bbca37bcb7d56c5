//! Name allocation for ONNX identifiers
//!
//! ONNX refers to every tensor and node by name, so each traced value and node
//! gets a unique, deterministic `onnx_name` before any lowering happens. The
//! allocator is owned by one conversion run and cleared at its start.

use rustc_hash::FxHashSet;

use crate::source::{Graph, Node, Trace, Value, ValueId};
use crate::{ExportError, Result};

/// Base name used when a value and its caller supply no name at all
pub const ANONYMOUS_VALUE: &str = "value";

/// Hands out unique names: `base`, then `base_1`, `base_2`, ...
#[derive(Debug, Default)]
pub struct NameAllocator {
    assigned: FxHashSet<String>,
    qualify_value_names: bool,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `name_<location>` as the base for values with a known generator.
    ///
    /// Off by default: the plain value name is the base.
    pub fn with_qualified_value_names(mut self, enabled: bool) -> Self {
        self.qualify_value_names = enabled;
        self
    }

    pub fn clear(&mut self) {
        self.assigned.clear();
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.assigned.contains(name)
    }

    /// Return `base` if unused, otherwise the first free `base_N`
    pub fn allocate(&mut self, base: &str) -> String {
        let mut name = base.to_string();
        let mut index = 0;
        while self.assigned.contains(&name) {
            index += 1;
            name = format!("{}_{}", base, index);
        }
        self.assigned.insert(name.clone());
        name
    }

    fn value_base_name(&self, value: &Value, default: &str) -> String {
        let base = match &value.generator {
            Some(lineprop) if self.qualify_value_names && !value.name.is_empty() => {
                format!("{}_{}", value.name, lineprop)
            }
            _ => value.name.clone(),
        };

        if !base.is_empty() {
            base
        } else if !default.is_empty() {
            default.to_string()
        } else {
            ANONYMOUS_VALUE.to_string()
        }
    }

    /// Name one value; tuple elements fall back to the tuple's name
    pub fn assign_value(&mut self, values: &mut [Value], id: ValueId, default: &str) -> Result<()> {
        let mut visiting = Vec::new();
        self.assign_value_inner(values, id, default, &mut visiting)
    }

    fn assign_value_inner(
        &mut self,
        values: &mut [Value],
        id: ValueId,
        default: &str,
        visiting: &mut Vec<ValueId>,
    ) -> Result<()> {
        if visiting.contains(&id) {
            return Err(ExportError::CyclicTuple(id));
        }

        let value = values.get_mut(id).ok_or(ExportError::UnknownValue(id))?;
        if value.is_named() {
            self.assigned.insert(value.onnx_name.clone());
        } else {
            let base = self.value_base_name(value, default);
            value.onnx_name = self.allocate(&base);
        }

        let Some(elements) = value.tuple_elements().map(<[ValueId]>::to_vec) else {
            return Ok(());
        };
        let tuple_name = value.onnx_name.clone();

        visiting.push(id);
        for element in elements {
            self.assign_value_inner(values, element, &tuple_name, visiting)?;
        }
        visiting.pop();
        Ok(())
    }

    /// Reserve every name already present in `values` and `graph`
    ///
    /// Runs before any allocation so a fresh name can never shadow one that
    /// is only reached later in the walk. Two values or nodes sharing an
    /// assigned name is an error.
    pub fn reserve_assigned(&mut self, values: &[Value], graph: &Graph) -> Result<()> {
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut duplicate = None;

        for value in values.iter().filter(|v| v.is_named()) {
            if !seen.insert(value.onnx_name.as_str()) {
                duplicate.get_or_insert_with(|| value.onnx_name.clone());
            }
        }
        graph.walk(&mut |node: &Node| {
            if node.is_named() && !seen.insert(node.onnx_name.as_str()) {
                duplicate.get_or_insert_with(|| node.onnx_name.clone());
            }
        });

        if let Some(name) = duplicate {
            return Err(ExportError::DuplicateName(name));
        }
        self.assigned.extend(seen.into_iter().map(str::to_string));
        Ok(())
    }

    /// Name every value touched by a node, then the node, then its subgraphs
    pub fn assign_graph(&mut self, values: &mut [Value], graph: &mut Graph) -> Result<()> {
        self.reserve_assigned(values, graph)?;
        self.assign_graph_inner(values, graph)
    }

    fn assign_graph_inner(&mut self, values: &mut [Value], graph: &mut Graph) -> Result<()> {
        for node in &mut graph.nodes {
            for &id in node.inputs.iter().chain(&node.outputs) {
                self.assign_value(values, id, "")?;
            }

            if node.is_named() {
                self.assigned.insert(node.onnx_name.clone());
            } else {
                node.onnx_name = self.allocate(&node.to_string());
            }

            for subgraph in &mut node.subgraphs {
                self.assign_graph_inner(values, subgraph)?;
            }
        }
        Ok(())
    }

    /// Name the whole trace, including boundary values no node touches
    pub fn assign_trace(&mut self, trace: &mut Trace) -> Result<()> {
        let Trace {
            values,
            inputs,
            outputs,
            graph,
        } = trace;

        self.assign_graph(values, graph)?;
        self.assign_boundary(values, inputs.iter().chain(outputs.iter()).copied())
    }

    /// Name top-level inputs/outputs; already named ones are left alone
    pub fn assign_boundary(
        &mut self,
        values: &mut [Value],
        ids: impl IntoIterator<Item = ValueId>,
    ) -> Result<()> {
        for id in ids {
            self.assign_value(values, id, "")?;
        }
        Ok(())
    }
}
