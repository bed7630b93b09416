//! Pure, synchronous markup tokenizer.
//!
//! Every grammar is matched independently against the raw text. Matches and
//! the literal runs between them are ordered by start offset, ties going to
//! the grammar declared first in [`Grammar`]. A tag whose arguments fail to
//! parse is consumed and reported in [`Tokenized::malformed`]; unrecognized
//! `<...>` tokens are left in the literal text.

mod grammar;

use std::ops::Range;

pub use grammar::{Grammar, MalformedReason};

use crate::message::ParsedMessage;
use crate::segment::Segment;
use crate::sound::SoundCatalog;

/// A tag that matched a grammar but produced no segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedTag {
	pub grammar: Grammar,
	/// Byte range of the tag in the raw text.
	pub span: Range<usize>,
	pub text: String,
	pub reason: MalformedReason,
}

/// Tokenizer output: the ordered segments plus every skipped tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tokenized {
	pub segments: Vec<Segment>,
	pub malformed: Vec<MalformedTag>,
}

impl Tokenized {
	pub fn into_message(self) -> ParsedMessage {
		ParsedMessage::new(self.segments)
	}
}

struct TagMatch {
	grammar: Grammar,
	span: Range<usize>,
	built: Result<Segment, MalformedReason>,
}

/// Splits `raw` into typed segments.
pub fn tokenize(raw: &str, catalog: &SoundCatalog) -> Tokenized {
	let mut matches = Vec::new();
	for grammar in Grammar::ALL {
		for caps in grammar.regex().captures_iter(raw) {
			let Some(whole) = caps.get(0) else { continue };
			matches.push(TagMatch {
				grammar,
				span: whole.range(),
				built: grammar.build(&caps, catalog),
			});
		}
	}
	matches.sort_by_key(|m| (m.span.start, m.grammar));

	let mut out = Tokenized::default();
	let mut cursor = 0;
	for tag in matches {
		if tag.span.start < cursor {
			continue;
		}
		push_literal(&raw[cursor..tag.span.start], &mut out.segments);
		match tag.built {
			Ok(segment) => out.segments.push(segment),
			Err(reason) => out.malformed.push(MalformedTag {
				grammar: tag.grammar,
				text: raw[tag.span.clone()].to_string(),
				span: tag.span.clone(),
				reason,
			}),
		}
		cursor = tag.span.end;
	}
	push_literal(&raw[cursor..], &mut out.segments);
	out
}

fn push_literal(run: &str, segments: &mut Vec<Segment>) {
	let run = run.trim();
	if !run.is_empty() {
		segments.push(Segment::Text(run.to_string()));
	}
}
