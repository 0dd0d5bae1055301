use crate::error::IngestError;
use crate::models::{Chunk, Document, IngestionOptions};
use regex::Regex;
use sha2::{Digest, Sha256};

/// Break points tried in order before falling back to a hard character cut.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl ChunkingConfig {
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self, IngestError> {
        let config = Self {
            max_chars,
            overlap_chars,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap ({}) must be smaller than chunk size ({})",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

impl TryFrom<&IngestionOptions> for ChunkingConfig {
    type Error = IngestError;

    fn try_from(value: &IngestionOptions) -> Result<Self, Self::Error> {
        Self::new(value.chunk_max_chars, value.chunk_overlap_chars)
    }
}

/// A piece of page text plus the number of leading characters it repeats from its predecessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub text: String,
    pub overlap: usize,
}

/// Collapses horizontal whitespace runs and extra blank lines left behind by PDF
/// extraction while keeping paragraph breaks intact.
pub fn clean_page_text(text: &str) -> Result<String, IngestError> {
    let horizontal = Regex::new(r"[ \t\u{a0}\u{0c}]+")?;
    let around_newline = Regex::new(r" ?\n ?")?;
    let blank_lines = Regex::new(r"\n{3,}")?;

    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let collapsed = horizontal.replace_all(&unified, " ");
    let trimmed_lines = around_newline.replace_all(&collapsed, "\n");
    let paragraphs = blank_lines.replace_all(&trimmed_lines, "\n\n");

    Ok(paragraphs.trim().to_string())
}

pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<TextSpan> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let mut spans = Vec::new();
    let mut start = 0;
    let mut overlap = 0;

    loop {
        let hard_end = (start + config.max_chars).min(chars.len());
        let end = if hard_end == chars.len() {
            hard_end
        } else {
            find_break(&chars, start, hard_end, config.overlap_chars)
        };

        spans.push(TextSpan {
            text: chars[start..end].iter().collect(),
            overlap,
        });

        if end == chars.len() {
            break;
        }

        let next = next_start(&chars, end, config.overlap_chars);
        overlap = end - next;
        start = next;
    }

    spans
}

// Latest separator boundary in the window that still lets the next chunk advance past `start`.
fn find_break(chars: &[char], start: usize, hard_end: usize, overlap: usize) -> usize {
    let earliest = start + overlap + 1;

    for separator in SEPARATORS {
        let pattern: Vec<char> = separator.chars().collect();
        let mut position = hard_end;
        while position >= earliest && position >= start + pattern.len() {
            if chars[position - pattern.len()..position] == pattern[..] {
                return position;
            }
            position -= 1;
        }
    }

    hard_end
}

fn next_start(chars: &[char], end: usize, overlap: usize) -> usize {
    if overlap == 0 {
        return end;
    }

    let candidate = end - overlap;
    (candidate..end)
        .find(|&position| {
            position == 0 || (chars[position - 1].is_whitespace() && !chars[position].is_whitespace())
        })
        .unwrap_or(candidate)
}

/// Splits every page of a document independently, so no chunk spans two pages.
pub fn chunk_document(document: &Document, config: ChunkingConfig) -> Vec<Chunk> {
    let source_path = document.path.to_string_lossy().to_string();
    let mut chunks = Vec::new();

    for page in &document.pages {
        for (index, span) in split_text(&page.text, config).into_iter().enumerate() {
            let chunk_index = index as u32;
            chunks.push(Chunk {
                chunk_id: make_chunk_id(&source_path, page.number, chunk_index, &span.text),
                source_path: source_path.clone(),
                page: page.number,
                chunk_index,
                text: span.text,
                overlap_with_previous: span.overlap,
            });
        }
    }

    chunks
}

pub fn chunk_documents(documents: &[Document], config: ChunkingConfig) -> Result<Vec<Chunk>, IngestError> {
    if documents.is_empty() {
        return Err(IngestError::EmptyCorpus);
    }
    config.validate()?;

    Ok(documents
        .iter()
        .flat_map(|document| chunk_document(document, config))
        .collect())
}

fn make_chunk_id(source_path: &str, page: u32, index: u32, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_path.as_bytes());
    hasher.update(page.to_le_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
