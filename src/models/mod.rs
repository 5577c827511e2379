pub mod book;
pub mod chapter;
pub mod chunk;
pub mod entity;
pub mod mention;
pub mod regex_match;
pub mod registry;
pub mod relationship;
pub mod state_change;

pub use book::{Book, BookCreate, BookStatus};
pub use chapter::{Chapter, ChapterStatus, MentionSummary, Paragraph, ParagraphType};
pub use chunk::Chunk;
pub use entity::{Character, CharacterStatus, EntityKind, EntityRecord, Event, EventType, Significance};
pub use mention::{AlignmentStatus, Mention, MentionType};
pub use regex_match::{PatternLayer, RegexMatch, RegexTargetKind};
pub use registry::{EntityRegistry, RegistryEntry};
pub use relationship::{Relationship, RelationshipKind};
pub use state_change::{StateChange, StateChangeAction, StateChangeCategory};
