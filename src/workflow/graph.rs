//! Workflow graph structure
//!
//! A graph is a map of node id to node spec. Node inputs are either literals
//! or references to another node's output slot. The JSON shape matches what
//! the engine's submission endpoint expects:
//! `{"<id>": {"class_type": "...", "inputs": {"x": 1, "y": ["<id>", 0]}}}`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use super::slots::{NodeKind, OutputSlot};
use crate::{Result, VidBenchError};

/// Reference to output `slot` of node `node_id`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub node_id: String,
    pub slot: u32,
}

impl Serialize for NodeRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        (&self.node_id, self.slot).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for NodeRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let (node_id, slot) = <(String, u32)>::deserialize(deserializer)?;
        Ok(Self { node_id, slot })
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.node_id, self.slot)
    }
}

/// A literal node input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// A node input: a literal value or a reference to another node's output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Reference(NodeRef),
    Literal(Literal),
}

impl InputValue {
    /// The reference this input carries, if any
    pub fn as_reference(&self) -> Option<&NodeRef> {
        match self {
            InputValue::Reference(r) => Some(r),
            InputValue::Literal(_) => None,
        }
    }
}

impl From<NodeRef> for InputValue {
    fn from(value: NodeRef) -> Self {
        InputValue::Reference(value)
    }
}

impl From<bool> for InputValue {
    fn from(value: bool) -> Self {
        InputValue::Literal(Literal::Bool(value))
    }
}

impl From<i64> for InputValue {
    fn from(value: i64) -> Self {
        InputValue::Literal(Literal::Int(value))
    }
}

impl From<u32> for InputValue {
    fn from(value: u32) -> Self {
        InputValue::Literal(Literal::Int(value as i64))
    }
}

impl From<f64> for InputValue {
    fn from(value: f64) -> Self {
        InputValue::Literal(Literal::Float(value))
    }
}

impl From<&str> for InputValue {
    fn from(value: &str) -> Self {
        InputValue::Literal(Literal::Text(value.to_string()))
    }
}

impl From<String> for InputValue {
    fn from(value: String) -> Self {
        InputValue::Literal(Literal::Text(value))
    }
}

/// One operation in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Engine operation type
    pub class_type: String,
    /// Named inputs
    pub inputs: BTreeMap<String, InputValue>,
}

impl NodeSpec {
    /// Get an input by name
    pub fn input(&self, name: &str) -> Option<&InputValue> {
        self.inputs.get(name)
    }

    /// All references this node consumes
    pub fn references(&self) -> impl Iterator<Item = &NodeRef> {
        self.inputs.values().filter_map(InputValue::as_reference)
    }
}

/// A complete execution request
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowGraph {
    nodes: BTreeMap<String, NodeSpec>,
}

/// A reference whose target node is missing from the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingRef {
    /// Node holding the reference
    pub from: String,
    /// Input name
    pub input: String,
    /// The unresolved reference
    pub target: NodeRef,
}

impl WorkflowGraph {
    /// Get a node by ID
    pub fn get_node(&self, node_id: &str) -> Option<&NodeSpec> {
        self.nodes.get(node_id)
    }

    /// Iterate nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = (&String, &NodeSpec)> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All references whose target node does not exist
    pub fn dangling_references(&self) -> Vec<DanglingRef> {
        let mut dangling = Vec::new();
        for (id, spec) in &self.nodes {
            for (input, value) in &spec.inputs {
                if let Some(target) = value.as_reference() {
                    if !self.nodes.contains_key(&target.node_id) {
                        dangling.push(DanglingRef {
                            from: id.clone(),
                            input: input.clone(),
                            target: target.clone(),
                        });
                    }
                }
            }
        }
        dangling
    }

    /// Check that the graph is non-empty, every reference resolves and there is no cycle
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(VidBenchError::ConfigError(
                "Workflow graph has no nodes".to_string(),
            ));
        }

        let dangling = self.dangling_references();
        if !dangling.is_empty() {
            let described: Vec<String> = dangling
                .iter()
                .map(|d| format!("{}.{} -> {}", d.from, d.input, d.target))
                .collect();
            return Err(VidBenchError::ConfigError(format!(
                "Workflow graph has dangling references: {}",
                described.join(", ")
            )));
        }

        if self.has_cycle() {
            return Err(VidBenchError::ConfigError(
                "Workflow graph contains a cycle".to_string(),
            ));
        }

        Ok(())
    }

    /// Check for cycles using DFS over consumer -> producer edges
    fn has_cycle(&self) -> bool {
        // 0 = unvisited, 1 = in progress, 2 = done
        let mut color: HashMap<&str, u8> =
            self.nodes.keys().map(|id| (id.as_str(), 0u8)).collect();

        fn dfs<'a>(
            node: &'a str,
            nodes: &'a BTreeMap<String, NodeSpec>,
            color: &mut HashMap<&'a str, u8>,
        ) -> bool {
            color.insert(node, 1);

            if let Some(spec) = nodes.get(node) {
                for target in spec.references() {
                    match color.get(target.node_id.as_str()) {
                        Some(1) => return true,
                        Some(0) => {
                            if dfs(target.node_id.as_str(), nodes, color) {
                                return true;
                            }
                        }
                        _ => {}
                    }
                }
            }

            color.insert(node, 2);
            false
        }

        for id in self.nodes.keys() {
            if color.get(id.as_str()) == Some(&0) && dfs(id.as_str(), &self.nodes, &mut color) {
                return true;
            }
        }

        false
    }
}

/// Typed handle to a node added through [`GraphBuilder`]
///
/// References can only be made from a handle plus the output slot type of
/// its node kind, so a slot index can never be borrowed from another kind.
#[derive(Debug)]
pub struct NodeHandle<K: NodeKind> {
    id: String,
    kind: PhantomData<K>,
}

impl<K: NodeKind> NodeHandle<K> {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Reference one of this node's outputs
    pub fn output(&self, slot: K::Slot) -> NodeRef {
        NodeRef {
            node_id: self.id.clone(),
            slot: slot.index(),
        }
    }
}

/// Named inputs for a node under construction
#[derive(Debug, Clone, Default)]
pub struct Inputs(BTreeMap<String, InputValue>);

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input
    pub fn with(mut self, name: &str, value: impl Into<InputValue>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }
}

/// Incremental builder for a [`WorkflowGraph`]
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: BTreeMap<String, NodeSpec>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node of kind `K` under `id`
    pub fn add<K: NodeKind>(&mut self, id: &str, inputs: Inputs) -> NodeHandle<K> {
        self.nodes.insert(
            id.to_string(),
            NodeSpec {
                class_type: K::CLASS_TYPE.to_string(),
                inputs: inputs.0,
            },
        );
        NodeHandle {
            id: id.to_string(),
            kind: PhantomData,
        }
    }

    pub fn build(self) -> WorkflowGraph {
        WorkflowGraph { nodes: self.nodes }
    }
}
