/// Leading/trailing characters stripped from a selection before lookup.
///
/// Covers ASCII punctuation and quotes plus their full-width CJK forms.
const STRIP_CHARS: &[char] = &[
	'.', ',', '!', '?', ';', ':', '"', '\'', '`', '(', ')', '[', ']', '{', '}', '<', '>', '-', '…', '。', '，', '、', '！', '？', '；',
	'：', '“', '”', '‘', '’', '（', '）', '《', '》', '〈', '〉', '「', '」', '『', '』', '【', '】', '～', '·',
];

/// Why a selection was not accepted for lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CleanError {
	#[error("selection is empty after cleaning")]
	Empty,
	#[error("selection has {len} characters (limit {max})")]
	TooLong { len: usize, max: usize },
}

/// Normalizes raw selected text into a lookup phrase.
///
/// Trims, collapses internal whitespace runs to a single space, and strips
/// punctuation and quotes from both ends. Rejects empty results and results
/// longer than `max_chars` characters.
pub fn clean_selection(raw: &str, max_chars: usize) -> Result<String, CleanError> {
	let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
	let cleaned = collapsed.trim_matches(|c: char| c.is_whitespace() || STRIP_CHARS.contains(&c));

	if cleaned.is_empty() {
		return Err(CleanError::Empty);
	}

	let len = cleaned.chars().count();
	if len > max_chars {
		return Err(CleanError::TooLong { len, max: max_chars });
	}

	Ok(cleaned.to_string())
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn test_strips_cjk_quotes_and_punctuation() {
		assert_eq!(clean_selection(" “你好？” ", 120), Ok("你好".to_string()));
	}

	#[test]
	fn test_collapses_internal_whitespace() {
		assert_eq!(clean_selection("  (good \n\t  morning!)  ", 120), Ok("good morning".to_string()));
	}

	#[test]
	fn test_keeps_inner_punctuation() {
		assert_eq!(clean_selection("\"don't stop\"", 120), Ok("don't stop".to_string()));
	}

	#[test]
	fn test_rejects_punctuation_only() {
		assert_eq!(clean_selection(" 。。！ ", 120), Err(CleanError::Empty));
		assert_eq!(clean_selection("", 120), Err(CleanError::Empty));
	}

	#[test]
	fn test_length_ceiling_counts_characters() {
		let at_limit = "茶".repeat(120);
		assert_eq!(clean_selection(&at_limit, 120), Ok(at_limit.clone()));

		let over = "茶".repeat(121);
		assert_eq!(clean_selection(&over, 120), Err(CleanError::TooLong { len: 121, max: 120 }));
	}
}
