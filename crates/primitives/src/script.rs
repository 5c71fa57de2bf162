use std::iter::FusedIterator;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Errors produced when building a [`ScriptRange`] from raw code points.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptRangeError {
	#[error("U+{0:04X} is not a Unicode scalar value")]
	InvalidCodePoint(u32),
	#[error("script range is inverted: U+{first:04X} > U+{last:04X}")]
	Inverted { first: u32, last: u32 },
}

/// Inclusive code point range identifying the target writing system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawScriptRange", into = "RawScriptRange")]
pub struct ScriptRange {
	first: char,
	last: char,
}

#[derive(Serialize, Deserialize)]
struct RawScriptRange {
	first: u32,
	last: u32,
}

impl ScriptRange {
	/// CJK Unified Ideographs, which covers the characters of Simplified Chinese pages.
	pub const CJK_UNIFIED: Self = Self {
		first: '\u{4E00}',
		last: '\u{9FFF}',
	};

	pub fn new(first: char, last: char) -> Result<Self, ScriptRangeError> {
		if first > last {
			return Err(ScriptRangeError::Inverted {
				first: first as u32,
				last: last as u32,
			});
		}
		Ok(Self { first, last })
	}

	pub fn from_code_points(first: u32, last: u32) -> Result<Self, ScriptRangeError> {
		let first_char = char::from_u32(first).ok_or(ScriptRangeError::InvalidCodePoint(first))?;
		let last_char = char::from_u32(last).ok_or(ScriptRangeError::InvalidCodePoint(last))?;
		Self::new(first_char, last_char)
	}

	pub const fn first(&self) -> char {
		self.first
	}

	pub const fn last(&self) -> char {
		self.last
	}

	#[inline]
	pub const fn contains(&self, c: char) -> bool {
		self.first <= c && c <= self.last
	}

	/// Fast pre-check: true if any character of `text` lies in the range.
	pub fn any_in(&self, text: &str) -> bool {
		text.chars().any(|c| self.contains(c))
	}
}

impl Default for ScriptRange {
	fn default() -> Self {
		Self::CJK_UNIFIED
	}
}

impl TryFrom<RawScriptRange> for ScriptRange {
	type Error = ScriptRangeError;

	fn try_from(raw: RawScriptRange) -> Result<Self, Self::Error> {
		Self::from_code_points(raw.first, raw.last)
	}
}

impl From<ScriptRange> for RawScriptRange {
	fn from(range: ScriptRange) -> Self {
		Self {
			first: range.first as u32,
			last: range.last as u32,
		}
	}
}

/// Classification of a scanned segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
	/// Text outside the target script, left untouched.
	Plain,
	/// Maximal run of target-script characters.
	Run,
}

/// A contiguous slice of scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<'a> {
	pub kind: SegmentKind,
	pub text: &'a str,
	/// Byte range of `text` within the scanned input.
	pub span: Range<usize>,
}

impl Segment<'_> {
	pub fn is_run(&self) -> bool {
		self.kind == SegmentKind::Run
	}
}

/// Splits text into alternating plain spans and script runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scanner {
	range: ScriptRange,
}

impl Scanner {
	pub const fn new(range: ScriptRange) -> Self {
		Self { range }
	}

	/// The range this scanner matches.
	pub const fn range(&self) -> ScriptRange {
		self.range
	}

	/// Returns true if `text` contains at least one target-script character.
	pub fn has_runs(&self, text: &str) -> bool {
		self.range.any_in(text)
	}

	/// Segments `text` in order.
	///
	/// The segments tile the input exactly: concatenating their texts yields
	/// `text`, none is empty, and adjacent segments always differ in kind.
	/// Empty input yields no segments. Clone the iterator to rescan.
	pub fn segments<'a>(&self, text: &'a str) -> Segments<'a> {
		Segments {
			text,
			range: self.range,
			pos: 0,
		}
	}
}

/// Iterator over the [`Segment`]s of one text, produced by [`Scanner::segments`].
#[derive(Debug, Clone)]
pub struct Segments<'a> {
	text: &'a str,
	range: ScriptRange,
	pos: usize,
}

impl<'a> Iterator for Segments<'a> {
	type Item = Segment<'a>;

	fn next(&mut self) -> Option<Self::Item> {
		let rest = &self.text[self.pos..];
		let first = rest.chars().next()?;
		let in_run = self.range.contains(first);

		let len = rest
			.char_indices()
			.find(|&(_, c)| self.range.contains(c) != in_run)
			.map_or(rest.len(), |(idx, _)| idx);

		let start = self.pos;
		self.pos += len;

		Some(Segment {
			kind: if in_run { SegmentKind::Run } else { SegmentKind::Plain },
			text: &rest[..len],
			span: start..self.pos,
		})
	}
}

impl FusedIterator for Segments<'_> {}

#[cfg(test)]
mod tests;
