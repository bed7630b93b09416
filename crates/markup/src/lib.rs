//! Message markup for herald.
//!
//! Raw text with embedded `<sound>`, `<actionbar>`, `<bossbar>` and `<title>`
//! tags is tokenized into an immutable [`ParsedMessage`]. [`MarkupParser`]
//! adds a TTL cache in front of the tokenizer and runs misses off the
//! dispatch contexts.

mod cache;
mod error;
mod message;
mod parser;
mod pending;
pub mod segment;
mod sound;
mod tokenizer;

pub use cache::{DEFAULT_CACHE_TTL, ParseKey, TtlCache};
pub use error::MarkupError;
pub use message::{Composer, ParsedMessage};
pub use parser::{MarkupParser, ParserOptions};
pub use pending::{ParseCompleter, PendingParse};
pub use segment::{ActionBar, BarColor, BarStyle, BossBar, Overlay, OverlayKind, Segment, SoundCue, Ticks, TitleCard, TitleTimes};
pub use sound::SoundCatalog;
pub use tokenizer::{Grammar, MalformedReason, MalformedTag, Tokenized, tokenize};
