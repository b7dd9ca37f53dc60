use std::collections::VecDeque;

use uuid::Uuid;

/// Separators tried in order, coarsest first. The empty separator splits into characters.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Text chunk produced by the chunker.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Unique chunk id
    pub id: Uuid,
    /// Raw text of the chunk
    pub text: String,
    /// Position of the chunk inside its document
    pub index: usize,
    /// File name of the originating document
    pub document: String,
    /// Full path of the originating document
    pub source: String,
}

impl Chunk {
    pub fn new(
        text: String,
        index: usize,
        document: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            index,
            document: document.into(),
            source: source.into(),
        }
    }
}

/// Recursive character splitter with overlap, measured in characters.
#[derive(Debug, Clone)]
pub struct Chunker {
    size: usize,
    overlap: usize,
    separators: Vec<String>,
}

impl Chunker {
    /// Create a new chunker.
    pub fn new(size: usize, overlap: usize) -> Self {
        Self::with_separators(size, overlap, &DEFAULT_SEPARATORS)
    }

    pub fn with_separators(size: usize, overlap: usize, separators: &[&str]) -> Self {
        let size = size.max(1);
        Self {
            size,
            overlap: overlap.min(size.saturating_sub(1)),
            separators: separators.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Split a document into chunks tagged with its name and path.
    pub fn chunk(&self, text: &str, document: &str, source: &str) -> Vec<Chunk> {
        self.split_text(text)
            .into_iter()
            .enumerate()
            .map(|(index, piece)| Chunk::new(piece, index, document, source))
            .collect()
    }

    /// Split text into pieces of at most `size` characters where separators allow.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        // First separator present in the text wins; "" always matches.
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep.as_str()));
        let (separator, remaining) = match position {
            Some(idx) => (separators[idx].as_str(), &separators[idx + 1..]),
            None => ("", &separators[separators.len()..]),
        };

        let splits: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<String> = Vec::new();

        for split in splits {
            if char_len(&split) < self.size {
                pending.push(split);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge_splits(&pending, separator));
                pending.clear();
            }
            if remaining.is_empty() {
                chunks.push(split);
            } else {
                chunks.extend(self.split_recursive(&split, remaining));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge_splits(&pending, separator));
        }

        chunks
    }

    /// Greedily join small splits up to `size`, carrying `overlap` characters forward.
    fn merge_splits(&self, splits: &[String], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for split in splits {
            let len = char_len(split);
            let joiner = if current.is_empty() { 0 } else { sep_len };

            if total + len + joiner > self.size && !current.is_empty() {
                push_joined(&mut docs, &current, separator);

                while total > self.overlap
                    || (total + len + if current.is_empty() { 0 } else { sep_len } > self.size
                        && total > 0)
                {
                    let Some(front) = current.pop_front() else {
                        break;
                    };
                    let removed_joiner = if current.is_empty() { 0 } else { sep_len };
                    total = total.saturating_sub(char_len(front) + removed_joiner);
                }
            }

            let joiner = if current.is_empty() { 0 } else { sep_len };
            current.push_back(split);
            total += len + joiner;
        }

        push_joined(&mut docs, &current, separator);
        docs
    }
}

fn push_joined(docs: &mut Vec<String>, parts: &VecDeque<&str>, separator: &str) {
    let joined = parts
        .iter()
        .copied()
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
