//! Typed model of a ComfyUI workflow in API format.
//!
//! A workflow is a mapping from node id to `{"class_type", "inputs"}`. Each
//! input is either a literal or a link `[source_node_id, output_slot]` to
//! another node. Node classes the engine needs to reason about are parsed into
//! [`NodeClass`] variants; everything else is carried through as
//! [`NodeClass::Other`] and serialized back unchanged.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Node class tags recognised by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeClass {
    /// Standard sampler. Seed input: `seed`.
    KSampler,
    /// Advanced sampler. Seed input: `noise_seed`.
    KSamplerAdvanced,
    /// Text prompt encoder. Text input: `text`.
    ClipTextEncode,
    /// Image output node.
    SaveImage,
    /// Any other node; passed through untouched.
    Other(String),
}

impl NodeClass {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "KSampler" => NodeClass::KSampler,
            "KSamplerAdvanced" => NodeClass::KSamplerAdvanced,
            "CLIPTextEncode" => NodeClass::ClipTextEncode,
            "SaveImage" => NodeClass::SaveImage,
            other => NodeClass::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            NodeClass::KSampler => "KSampler",
            NodeClass::KSamplerAdvanced => "KSamplerAdvanced",
            NodeClass::ClipTextEncode => "CLIPTextEncode",
            NodeClass::SaveImage => "SaveImage",
            NodeClass::Other(tag) => tag,
        }
    }

    /// Whether this node performs the denoising/generation step.
    pub fn is_sampler(&self) -> bool {
        matches!(self, NodeClass::KSampler | NodeClass::KSamplerAdvanced)
    }

    /// Whether this node encodes a text prompt into conditioning.
    pub fn is_prompt_encoder(&self) -> bool {
        matches!(self, NodeClass::ClipTextEncode)
    }

    /// Name of the input that carries the noise seed.
    pub fn seed_input(&self) -> &'static str {
        match self {
            NodeClass::KSamplerAdvanced => "noise_seed",
            _ => "seed",
        }
    }

    /// Name of the input that carries the prompt text.
    pub fn text_input(&self) -> &'static str {
        "text"
    }
}

impl Serialize for NodeClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NodeClass {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(NodeClass::parse(&tag))
    }
}

/// Link to output `slot` of node `node`. Serialized as `["6", 0]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRef(pub String, pub u32);

impl InputRef {
    pub fn node(&self) -> &str {
        &self.0
    }

    pub fn slot(&self) -> u32 {
        self.1
    }
}

/// A node input: either a link to another node or a literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Link(InputRef),
    Literal(Value),
}

impl InputValue {
    pub fn as_link(&self) -> Option<&InputRef> {
        match self {
            InputValue::Link(link) => Some(link),
            InputValue::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            InputValue::Literal(value) => Some(value),
            InputValue::Link(_) => None,
        }
    }
}

impl From<Value> for InputValue {
    fn from(value: Value) -> Self {
        InputValue::Literal(value)
    }
}

/// A single node definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    pub class_type: NodeClass,
    #[serde(default)]
    pub inputs: IndexMap<String, InputValue>,
    /// Fields other than `class_type`/`inputs` (e.g. `_meta`), kept verbatim.
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl NodeDef {
    pub fn new(class_type: NodeClass) -> Self {
        Self {
            class_type,
            inputs: IndexMap::new(),
            extra: IndexMap::new(),
        }
    }

    pub fn input(&self, name: &str) -> Option<&InputValue> {
        self.inputs.get(name)
    }

    /// Set an input, keeping its position if it already exists.
    pub fn set_input(&mut self, name: &str, value: impl Into<InputValue>) {
        self.inputs.insert(name.to_string(), value.into());
    }
}

/// An ordered workflow graph. Iteration follows the order of the source file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowGraph {
    nodes: IndexMap<String, NodeDef>,
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a graph from API-format JSON text, preserving node order.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    pub fn insert(&mut self, id: impl Into<String>, node: NodeDef) {
        self.nodes.insert(id.into(), node);
    }

    pub fn get(&self, id: &str) -> Option<&NodeDef> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut NodeDef> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeDef)> {
        self.nodes.iter().map(|(id, node)| (id.as_str(), node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check that every link points at a node present in this graph.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for (id, node) in &self.nodes {
            for (name, value) in &node.inputs {
                if let InputValue::Link(link) = value {
                    if !self.contains(link.node()) {
                        return Err(format!(
                            "node {} input '{}' references missing node {}",
                            id,
                            name,
                            link.node()
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TXT2IMG: &str = r#"{
        "4": {"class_type": "CheckpointLoaderSimple", "inputs": {"ckpt_name": "dreamshaper_8.safetensors"}},
        "6": {"class_type": "CLIPTextEncode", "inputs": {"text": "placeholder", "clip": ["4", 1]},
              "_meta": {"title": "Positive"}},
        "3": {"class_type": "KSampler", "inputs": {"seed": 5, "steps": 20, "cfg": 7.5,
              "model": ["4", 0], "positive": ["6", 0]}},
        "9": {"class_type": "SaveImage", "inputs": {"filename_prefix": "ComfyUI"}}
    }"#;

    #[test]
    fn test_parse_preserves_file_order() {
        let graph = WorkflowGraph::from_json(TXT2IMG).unwrap();
        let ids: Vec<&str> = graph.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["4", "6", "3", "9"]);
    }

    #[test]
    fn test_node_classes() {
        let graph = WorkflowGraph::from_json(TXT2IMG).unwrap();
        assert_eq!(graph.get("3").unwrap().class_type, NodeClass::KSampler);
        assert_eq!(graph.get("6").unwrap().class_type, NodeClass::ClipTextEncode);
        assert_eq!(
            graph.get("4").unwrap().class_type,
            NodeClass::Other("CheckpointLoaderSimple".into())
        );
    }

    #[test]
    fn test_links_and_literals() {
        let graph = WorkflowGraph::from_json(TXT2IMG).unwrap();
        let sampler = graph.get("3").unwrap();
        assert_eq!(
            sampler.input("positive").and_then(InputValue::as_link),
            Some(&InputRef("6".into(), 0))
        );
        assert_eq!(
            sampler.input("cfg").and_then(InputValue::as_literal),
            Some(&json!(7.5))
        );
    }

    #[test]
    fn test_roundtrip_is_lossless() {
        let graph = WorkflowGraph::from_json(TXT2IMG).unwrap();
        let original: Value = serde_json::from_str(TXT2IMG).unwrap();
        assert_eq!(graph.to_value().unwrap(), original);
        assert_eq!(graph.get("6").unwrap().extra["_meta"]["title"], "Positive");
    }

    #[test]
    fn test_validate_dangling_link() {
        let graph = WorkflowGraph::from_json(
            r#"{"3": {"class_type": "KSampler", "inputs": {"positive": ["99", 0]}}}"#,
        )
        .unwrap();
        let err = graph.validate().unwrap_err();
        assert!(err.contains("missing node 99"));
    }

    #[test]
    fn test_seed_input_per_class() {
        assert_eq!(NodeClass::KSampler.seed_input(), "seed");
        assert_eq!(NodeClass::KSamplerAdvanced.seed_input(), "noise_seed");
        assert!(NodeClass::KSamplerAdvanced.is_sampler());
        assert!(!NodeClass::SaveImage.is_sampler());
    }

    #[test]
    fn test_set_input_keeps_position() {
        let mut graph = WorkflowGraph::from_json(TXT2IMG).unwrap();
        let node = graph.get_mut("6").unwrap();
        node.set_input("text", json!("a cat"));
        let keys: Vec<&String> = node.inputs.keys().collect();
        assert_eq!(keys, vec!["text", "clip"]);
    }
}
