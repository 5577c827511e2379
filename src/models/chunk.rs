use serde::{Deserialize, Serialize};

/// A fixed-size, token-bounded, paragraph-aligned slice of a chapter. Produced
/// by the (out-of-scope) chunker; embeddings are filled lazily by the
/// embedding job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub book_id: String,
    pub chapter_id: String,
    pub position: i64,
    pub text: String,
    pub token_count: i64,
    pub char_offset_start: usize,
    pub char_offset_end: usize,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }
}
