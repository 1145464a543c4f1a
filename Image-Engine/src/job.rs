use rand::Rng;
use serde_json::json;

use crate::error::{ImageError, Result};
use crate::graph::WorkflowGraph;
use crate::resolve::ResolvedNodes;

/// Lowest seed handed to the sampler.
pub const SEED_MIN: u64 = 1;
/// Highest seed handed to the sampler.
pub const SEED_MAX: u64 = 1_000_000_000;

/// Draw a fresh seed uniformly from `SEED_MIN..=SEED_MAX`.
pub fn random_seed() -> u64 {
    rand::rng().random_range(SEED_MIN..=SEED_MAX)
}

/// Write the prompt text and seed into the resolved nodes.
///
/// Only these two inputs are touched; everything else in the graph is left
/// exactly as loaded.
pub fn inject(
    graph: &mut WorkflowGraph,
    nodes: &ResolvedNodes,
    prompt_text: &str,
    seed: u64,
) -> Result<()> {
    let prompt_node = graph
        .get_mut(&nodes.prompt)
        .ok_or(ImageError::PromptNodeNotFound)?;
    let text_input = prompt_node.class_type.text_input();
    prompt_node.set_input(text_input, json!(prompt_text));

    let sampler = graph
        .get_mut(&nodes.sampler)
        .ok_or(ImageError::SamplerNotFound)?;
    let seed_input = sampler.class_type.seed_input();
    sampler.set_input(seed_input, json!(seed));

    Ok(())
}
