//! Document model: per-page text, content hashing, and the character-window
//! chunking that feeds the retrieval index.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ExtractionError, Result};

/// Chunk window in characters, matched to the retrieval index granularity.
pub const CHUNK_SIZE: usize = 1600;
/// Characters shared between consecutive chunks of the same page.
pub const CHUNK_OVERLAP: usize = 150;

/// One physical page of extracted text. Page numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageText {
    pub page: u32,
    pub text: String,
}

impl PageText {
    pub fn new(page: u32, text: impl Into<String>) -> Self {
        Self {
            page,
            text: text.into(),
        }
    }
}

/// A readable document: content hash plus its ordered pages.
#[derive(Debug, Clone)]
pub struct DocumentText {
    pub doc_hash: String,
    pub pages: Vec<PageText>,
}

impl DocumentText {
    /// Fails with [`ExtractionError::UnreadableDocument`] when no page carries
    /// non-empty text (scanned document without a text layer).
    pub fn new(doc_hash: impl Into<String>, pages: Vec<PageText>) -> Result<Self> {
        if pages.iter().all(|p| p.text.trim().is_empty()) {
            return Err(ExtractionError::UnreadableDocument);
        }
        Ok(Self {
            doc_hash: doc_hash.into(),
            pages,
        })
    }

    /// Convenience constructor hashing the raw document bytes.
    pub fn from_bytes(bytes: &[u8], pages: Vec<PageText>) -> Result<Self> {
        Self::new(content_hash(bytes), pages)
    }

    /// Header metadata lives on the first page.
    pub fn first_page_text(&self) -> &str {
        self.pages.first().map(|p| p.text.as_str()).unwrap_or("")
    }

    /// All pages joined, for whole-document marker scans.
    pub fn full_text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Chunk every non-empty page into overlapping character windows,
    /// keeping page attribution for evidence tracking.
    pub fn chunks(&self) -> Vec<Chunk> {
        let mut out = Vec::new();
        for page in &self.pages {
            if page.text.trim().is_empty() {
                continue;
            }
            for text in split_text(&page.text, CHUNK_SIZE, CHUNK_OVERLAP) {
                out.push(Chunk {
                    text,
                    page: page.page,
                });
            }
        }
        out
    }
}

/// A retrievable text fragment and the page it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub page: u32,
}

/// Lowercase hex SHA-256 of the raw document bytes; the storage key for
/// every artifact derived from the document.
pub fn content_hash(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Split into windows of at most `chunk_size` characters, preferring a
/// paragraph break, then a line break, then a space as the cut point, with
/// `overlap` characters repeated at the start of the next window.
fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= chunk_size {
        let trimmed = text.trim();
        return if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed.to_string()]
        };
    }

    let mut out = Vec::new();
    let mut start = 0usize;
    while start < chars.len() {
        let hard_end = (start + chunk_size).min(chars.len());
        let cut = if hard_end == chars.len() {
            hard_end
        } else {
            find_break(&chars, start, hard_end)
        };

        let piece: String = chars[start..cut].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }

        if cut >= chars.len() {
            break;
        }
        start = cut.saturating_sub(overlap).max(start + 1);
    }
    out
}

/// Best cut point inside `chars[start..end]`, scanning backwards.
fn find_break(chars: &[char], start: usize, end: usize) -> usize {
    let mut last_newline = None;
    let mut last_space = None;
    let mut i = end;
    while i > start + 1 {
        i -= 1;
        let c = chars[i];
        if c == '\n' {
            if chars[i - 1] == '\n' {
                // paragraph boundary
                return i + 1;
            }
            if last_newline.is_none() {
                last_newline = Some(i + 1);
            }
        } else if c == ' ' && last_space.is_none() {
            last_space = Some(i + 1);
        }
    }
    last_newline.or(last_space).unwrap_or(end)
}
