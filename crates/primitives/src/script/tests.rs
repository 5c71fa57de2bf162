use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;

fn kinds_and_texts(text: &str) -> Vec<(SegmentKind, &str)> {
	Scanner::default().segments(text).map(|s| (s.kind, s.text)).collect()
}

#[test]
fn test_whole_run_is_single_segment() {
	assert_eq!(kinds_and_texts("我喜欢茶"), vec![(SegmentKind::Run, "我喜欢茶")]);
}

#[test]
fn test_mixed_text_splits_at_script_boundary() {
	let segments: Vec<_> = Scanner::default().segments("I like 茶").collect();

	assert_eq!(segments.len(), 2);
	assert_eq!(segments[0].kind, SegmentKind::Plain);
	assert_eq!(segments[0].text, "I like ");
	assert_eq!(segments[0].span, 0..7);
	assert_eq!(segments[1].kind, SegmentKind::Run);
	assert_eq!(segments[1].text, "茶");
	assert_eq!(segments[1].span, 7..10);
}

#[test]
fn test_cjk_punctuation_is_plain() {
	assert_eq!(
		kinds_and_texts("你好，世界。"),
		vec![
			(SegmentKind::Run, "你好"),
			(SegmentKind::Plain, "，"),
			(SegmentKind::Run, "世界"),
			(SegmentKind::Plain, "。"),
		]
	);
}

#[test]
fn test_text_without_runs_is_one_plain_segment() {
	assert_eq!(kinds_and_texts("plain text"), vec![(SegmentKind::Plain, "plain text")]);
	assert!(!Scanner::default().has_runs("plain text"));
}

#[test]
fn test_empty_input_yields_nothing() {
	assert_eq!(Scanner::default().segments("").count(), 0);
}

#[test]
fn test_segments_iterator_is_restartable() {
	let segments = Scanner::default().segments("a茶b");
	let first: Vec<_> = segments.clone().collect();
	let second: Vec<_> = segments.collect();
	assert_eq!(first, second);
}

#[test]
fn test_script_range_rejects_bad_code_points() {
	assert_eq!(
		ScriptRange::from_code_points(0xD800, 0xDFFF),
		Err(ScriptRangeError::InvalidCodePoint(0xD800))
	);
	assert_eq!(
		ScriptRange::from_code_points(0x9FFF, 0x4E00),
		Err(ScriptRangeError::Inverted { first: 0x9FFF, last: 0x4E00 })
	);
}

#[test]
fn test_custom_range_scans_other_scripts() {
	let hiragana = ScriptRange::from_code_points(0x3041, 0x3096).unwrap();
	let texts: Vec<_> = Scanner::new(hiragana).segments("xひらがなy").map(|s| s.text).collect();
	assert_eq!(texts, vec!["x", "ひらがな", "y"]);
}

fn check_tiling(text: &str) -> Result<(), TestCaseError> {
	let segments: Vec<_> = Scanner::default().segments(text).collect();

	let joined: String = segments.iter().map(|s| s.text).collect();
	prop_assert_eq!(&joined, text);

	let mut expected_start = 0;
	for segment in &segments {
		prop_assert!(!segment.text.is_empty());
		prop_assert_eq!(segment.span.start, expected_start);
		prop_assert_eq!(&text[segment.span.clone()], segment.text);
		expected_start = segment.span.end;
	}

	for pair in segments.windows(2) {
		prop_assert_ne!(pair[0].kind, pair[1].kind);
	}
	Ok(())
}

proptest! {
	#[test]
	fn prop_segments_tile_mixed_input(text in "[a-z 。，！\\x{4E00}-\\x{4E40}]{0,48}") {
		check_tiling(&text)?;
	}

	#[test]
	fn prop_segments_tile_arbitrary_input(text in any::<String>()) {
		check_tiling(&text)?;
	}
}
