// Sections - Bars grouped into token streams, fingerprinted and deduplicated

pub mod section;
pub mod token;
pub mod tokenize;

// Re-export main types
pub use section::{section_fingerprint, Section, SectionMetadata};
pub use token::{tokenize_bars, Token, TokenKind, BAR_SLOT_OFFSET_SEC};
pub use tokenize::{deduplicate_sections, tokenize_sections, DedupOutcome, SectionConfig, SectionError};
