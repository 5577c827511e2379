use serde::{Deserialize, Serialize};

use crate::models::regex_match::RegexMatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterStatus {
    Pending,
    Extracted,
    Failed,
}

/// One paragraph of structured chapter text, as produced by the (out-of-scope)
/// chunker/parser layer. Offsets are into the raw chapter text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paragraph {
    pub text: String,
    pub char_start: usize,
    pub char_end: usize,
    pub paragraph_type: ParagraphType,
    #[serde(default)]
    pub speaker: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParagraphType {
    Narration,
    Dialogue,
    BlueBox,
    SceneBreak,
    Header,
}

/// A chapter's text is immutable once stored; only `status`, `regex_matches`,
/// and `mention_summary` change after ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub book_id: String,
    pub number: i64,
    #[serde(default)]
    pub title: Option<String>,
    pub text: String,
    pub word_count: i64,
    pub status: ChapterStatus,
    #[serde(default)]
    pub regex_matches: Vec<RegexMatch>,
    #[serde(default)]
    pub mention_summary: Option<MentionSummary>,
    #[serde(default)]
    pub batch_id: Option<String>,
}

/// Compact per-chapter summary written alongside the mention graph edges so
/// callers can render counts without a graph traversal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MentionSummary {
    pub total_mentions: usize,
    pub entities_mentioned: usize,
    pub by_type: std::collections::BTreeMap<String, usize>,
}

impl Chapter {
    /// Split on blank-line boundaries, the only paragraph delimiter §6 of the
    /// spec guarantees is always present (the richer `Paragraph` structure is
    /// optional and produced upstream by the chunker).
    pub fn paragraph_spans(&self) -> Vec<(usize, usize)> {
        let mut spans = Vec::new();
        let mut start = 0usize;
        let bytes = self.text.as_bytes();
        let mut i = 0usize;
        while i < bytes.len() {
            if bytes[i] == b'\n' && i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
                if i > start {
                    spans.push((start, i));
                }
                i += 2;
                start = i;
                continue;
            }
            i += 1;
        }
        if start < self.text.len() {
            spans.push((start, self.text.len()));
        }
        spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(text: &str) -> Chapter {
        Chapter {
            book_id: "b1".into(),
            number: 1,
            title: None,
            text: text.to_string(),
            word_count: 0,
            status: ChapterStatus::Pending,
            regex_matches: vec![],
            mention_summary: None,
            batch_id: None,
        }
    }

    #[test]
    fn paragraph_spans_split_on_blank_lines() {
        let c = chapter("first paragraph.\n\nsecond one.\n\nthird.");
        let spans = c.paragraph_spans();
        assert_eq!(spans.len(), 3);
        assert_eq!(&c.text[spans[0].0..spans[0].1], "first paragraph.");
        assert_eq!(&c.text[spans[1].0..spans[1].1], "second one.");
        assert_eq!(&c.text[spans[2].0..spans[2].1], "third.");
    }

    #[test]
    fn single_paragraph_chapter() {
        let c = chapter("no blank lines here");
        assert_eq!(c.paragraph_spans(), vec![(0, c.text.len())]);
    }
}
