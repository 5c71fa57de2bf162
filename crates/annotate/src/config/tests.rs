use std::io::Write;

use pretty_assertions::assert_eq;

use super::*;

#[test]
fn test_empty_document_is_all_defaults() {
	let config = ChimeraConfig::from_toml("").unwrap();

	assert_eq!(config, ChimeraConfig::default());
	assert_eq!(config.service.base_url, DEFAULT_BASE_URL);
	assert_eq!(config.scan.first, 0x4E00);
	assert_eq!(config.scan.last, 0x9FFF);
	assert_eq!(config.scheduler_config(), SchedulerConfig::default());
	assert_eq!(config.client_config().request_timeout, Duration::from_secs(10));
	assert_eq!(config.client_config().cache_capacity, 2000);
}

#[test]
fn test_sections_override_independently() {
	let config = ChimeraConfig::from_toml(
		r#"
[service]
base_url = "http://10.0.0.2:9000"

[scan]
first = 0x3040
last = 0x309F
debounce_ms = 100
initial_pass = false
skip_tags = ["aside"]

[lookup]
max_chars = 8
"#,
	)
	.unwrap();

	assert_eq!(config.service.base_url, "http://10.0.0.2:9000");
	assert_eq!(config.service.request_timeout_ms, 10_000);
	let scanner = config.scanner().unwrap();
	assert_eq!(scanner.range(), ScriptRange::new('\u{3040}', '\u{309F}').unwrap());
	assert!(scanner.has_runs("ひらがな"));
	assert!(!scanner.has_runs("漢字"));
	assert!(config.filter().skips("ASIDE"));
	assert!(!config.filter().skips("code"));
	assert_eq!(
		config.scheduler_config(),
		SchedulerConfig {
			debounce: Duration::from_millis(100),
			initial_pass: false,
		}
	);
	assert_eq!(config.lookup.max_chars, 8);
	assert_eq!(config.lookup.cache_capacity, DEFAULT_LOOKUP_CACHE_CAPACITY);
}

#[test]
fn test_unknown_keys_are_rejected() {
	let err = ChimeraConfig::from_toml("[scan]\ndebounce = 5\n").unwrap_err();
	assert!(matches!(err, ConfigError::Parse(_)), "{err:?}");
}

#[test]
fn test_inverted_range_is_rejected() {
	let err = ChimeraConfig::from_toml("[scan]\nfirst = 0x9FFF\nlast = 0x4E00\n").unwrap_err();
	assert!(matches!(err, ConfigError::Range(ScriptRangeError::Inverted { .. })), "{err:?}");
}

#[test]
fn test_load_reads_explicit_path() {
	let mut file = tempfile::NamedTempFile::new().unwrap();
	writeln!(file, "[lookup]\ncache_capacity = 3").unwrap();

	let config = ChimeraConfig::load(Some(file.path())).unwrap();

	assert_eq!(config.lookup.cache_capacity, 3);
}

#[test]
fn test_missing_explicit_path_is_an_error() {
	let dir = tempfile::tempdir().unwrap();
	let err = ChimeraConfig::load(Some(dir.path().join("absent.toml").as_path())).unwrap_err();
	assert!(matches!(err, ConfigError::Io { .. }), "{err:?}");
}
