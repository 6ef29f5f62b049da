//! Batch-evaluation context.

use std::collections::HashMap;

/// Scratch space for one batched evaluation pass.
///
/// Holds per-observable input batches and per-node output buffers. Nodes
/// write their results back into the context keyed by their own name, so a
/// caller can wire several nodes through the same pass and read every result
/// afterwards.
#[derive(Debug, Default)]
pub struct EvalContext {
    inputs: HashMap<String, Vec<f64>>,
    outputs: HashMap<String, Vec<f64>>,
}

impl EvalContext {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Provide the input batch for an observable.
    pub fn set_values(&mut self, observable: impl Into<String>, values: Vec<f64>) {
        self.inputs.insert(observable.into(), values);
    }

    /// Input batch for an observable, if one was provided.
    pub fn values(&self, observable: &str) -> Option<&[f64]> {
        self.inputs.get(observable).map(Vec::as_slice)
    }

    /// Store a node's output batch, returning a view over the stored values.
    pub fn store_output(&mut self, node: impl Into<String>, values: Vec<f64>) -> &[f64] {
        let slot = self.outputs.entry(node.into()).or_default();
        *slot = values;
        slot.as_slice()
    }

    /// Output batch previously stored by a node.
    pub fn output(&self, node: &str) -> Option<&[f64]> {
        self.outputs.get(node).map(Vec::as_slice)
    }
}
