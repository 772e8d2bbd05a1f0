//! Bilingual Content Splitter.
//!
//! The structurer emits the Chinese document, a `---` separator line, then the
//! English document. Segments are trimmed and not validated; schema conformance
//! is the structurer's job.

use crate::models::{ContentDocument, Language, SplitMode};

pub const SEPARATOR: &str = "---";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitOutcome {
    Bilingual {
        zh: ContentDocument,
        en: ContentDocument,
    },
    /// The separator convention was not honoured; the whole trimmed input.
    Fallback(ContentDocument),
}

impl SplitOutcome {
    pub fn mode(&self) -> SplitMode {
        match self {
            SplitOutcome::Bilingual { .. } => SplitMode::Bilingual,
            SplitOutcome::Fallback(_) => SplitMode::Fallback,
        }
    }

    /// Documents in persistence order (zh before en).
    pub fn documents(&self) -> Vec<&ContentDocument> {
        match self {
            SplitOutcome::Bilingual { zh, en } => vec![zh, en],
            SplitOutcome::Fallback(doc) => vec![doc],
        }
    }
}

/// Splits raw structurer output on separator lines.
///
/// A separator is a line that is exactly `---` once surrounding whitespace is
/// removed. Segments are positional: with two or more segments the first is
/// `zh` and the second `en`, even when one of them is empty, and any further
/// segments are discarded. The only segment skipped is an empty one before a
/// leading YAML document marker, and only when two more segments follow it.
pub fn split(raw: &str) -> SplitOutcome {
    let segments = segments(raw);
    if segments.len() >= 2 {
        return SplitOutcome::Bilingual {
            zh: ContentDocument::new(Some(Language::Zh), segments[0]),
            en: ContentDocument::new(Some(Language::En), segments[1]),
        };
    }
    SplitOutcome::Fallback(ContentDocument::new(None, raw.trim()))
}

fn segments(raw: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut offset = 0;

    for line in raw.split_inclusive('\n') {
        if line.trim() == SEPARATOR {
            segments.push(raw[start..offset].trim());
            start = offset + line.len();
        }
        offset += line.len();
    }
    segments.push(raw[start..].trim());

    if segments.len() > 2 && segments[0].is_empty() {
        segments.remove(0);
    }
    segments
}
