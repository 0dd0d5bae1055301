use crate::models::{RetrievedChunk, WeatherSnapshot};

pub const PROMPT_PREAMBLE: &str =
    "Based on the following agricultural information, answer the farmer's question clearly and practically.";

pub const NO_CONTEXT_MARKER: &str = "No context available: no relevant passages were found in the document library.";

#[derive(Debug, Clone, Copy)]
pub struct WeatherContext<'a> {
    pub location: &'a str,
    pub snapshot: &'a WeatherSnapshot,
}

pub fn source_citations(results: &[RetrievedChunk]) -> Vec<String> {
    results.iter().map(|hit| hit.chunk.citation()).collect()
}

/// Renders retrieved passages, optional weather and the question into one prompt.
///
/// Passages keep retrieval order and their text is copied verbatim. When the rendered
/// passages exceed `max_context_chars`, the lowest-ranked ones are dropped whole, down
/// to the top-ranked passage which is never dropped.
pub fn assemble_prompt(
    results: &[RetrievedChunk],
    weather: Option<WeatherContext<'_>>,
    question: &str,
    max_context_chars: usize,
) -> String {
    let mut blocks: Vec<String> = results
        .iter()
        .enumerate()
        .map(|(position, hit)| {
            format!(
                "Context {} ({}, page {}):\n{}",
                position + 1,
                hit.chunk.file_name(),
                hit.chunk.page,
                hit.chunk.text
            )
        })
        .collect();

    // The best match is always kept, even when it alone exceeds the budget.
    while blocks.len() > 1 && rendered_len(&blocks) > max_context_chars {
        blocks.pop();
    }
    if blocks.len() < results.len() {
        tracing::warn!(
            kept = blocks.len(),
            dropped = results.len() - blocks.len(),
            max_context_chars,
            "context blocks dropped to fit prompt budget"
        );
    }

    let context = if blocks.is_empty() {
        NO_CONTEXT_MARKER.to_string()
    } else {
        blocks.join("\n\n")
    };

    let mut prompt = format!("{PROMPT_PREAMBLE}\n\n{context}\n\n");
    if let Some(weather) = weather {
        prompt.push_str(&weather_block(weather));
        prompt.push_str("\n\n");
    }
    prompt.push_str(&format!("Question: {question}\n\nAnswer:"));
    prompt
}

fn rendered_len(blocks: &[String]) -> usize {
    let separators = blocks.len().saturating_sub(1) * 2;
    blocks
        .iter()
        .map(|block| block.chars().count())
        .sum::<usize>()
        + separators
}

pub fn weather_block(weather: WeatherContext<'_>) -> String {
    let snapshot = weather.snapshot;
    format!(
        "Current Weather in {}:\nTemperature: {}\u{b0}C\nHumidity: {}%\nConditions: {}\nRainfall: {}mm",
        weather.location,
        snapshot.temperature_c,
        snapshot.humidity_pct,
        snapshot.description,
        snapshot.rainfall_mm
    )
}
