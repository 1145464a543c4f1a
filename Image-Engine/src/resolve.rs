//! Structural discovery of the sampler and positive-prompt nodes.
//!
//! Templates exported from ComfyUI use arbitrary node ids, so the engine
//! locates the nodes it needs to patch by class and data flow instead.

use crate::error::{ImageError, Result};
use crate::graph::{InputValue, WorkflowGraph};

/// Ids of the nodes that receive the seed and the prompt text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNodes {
    pub sampler: String,
    pub prompt: String,
}

/// Locate the sampler and its positive prompt node.
///
/// The first sampler in iteration order is taken and its `positive` link is
/// followed. If that does not yield both ids, the first prompt encoder and the
/// first sampler are picked independently, filling only the ids still missing.
pub fn resolve(graph: &WorkflowGraph) -> Result<ResolvedNodes> {
    let mut sampler: Option<&str> = None;
    let mut prompt: Option<&str> = None;

    if let Some((id, node)) = graph.iter().find(|(_, node)| node.class_type.is_sampler()) {
        sampler = Some(id);
        if let Some(InputValue::Link(link)) = node.input("positive") {
            if graph.contains(link.node()) {
                prompt = Some(link.node());
            }
        }
    }

    if sampler.is_none() || prompt.is_none() {
        tracing::warn!(
            sampler = ?sampler,
            prompt = ?prompt,
            "Sampler to prompt link not found, falling back to first matching nodes"
        );
        for (id, node) in graph.iter() {
            if prompt.is_none() && node.class_type.is_prompt_encoder() {
                prompt = Some(id);
            }
            if sampler.is_none() && node.class_type.is_sampler() {
                sampler = Some(id);
            }
        }
    }

    let sampler = sampler.ok_or(ImageError::SamplerNotFound)?;
    let prompt = prompt.ok_or(ImageError::PromptNodeNotFound)?;

    tracing::info!(sampler, prompt, "Resolved workflow nodes");
    Ok(ResolvedNodes {
        sampler: sampler.to_string(),
        prompt: prompt.to_string(),
    })
}
