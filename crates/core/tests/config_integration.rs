//! 설정 파싱 통합 테스트 — 전체 TOML 문서와 검증 흐름을 함께 검사합니다.

use chainwatch_core::config::ChainwatchConfig;
use chainwatch_core::{ChainwatchError, ConfigError, Severity};

#[test]
fn full_document_parses_and_validates() {
    let toml = r#"
[general]
log_level = "debug"
log_format = "pretty"

[manifest]
trusted_registries = ["registry.internal.example.com", "gcr.io"]
max_base_image_age_days = 60

[dependency]
toolchain_version = "1.80.0"

[network]
allowlist = ["10.0.0.0/8", "192.0.2.7:443"]
unauthorized_severity = "high"
rate_limit = 30
rate_window_secs = 60

[thresholds.medium]
min_count = 2

[run]
timeout_secs = 45
"#;

    let config = ChainwatchConfig::parse(toml).unwrap();
    config.validate().unwrap();

    assert_eq!(config.manifest.trusted_registries.len(), 2);
    assert_eq!(config.dependency.toolchain_version, "1.80.0");
    assert_eq!(config.thresholds.medium.min_count, 2);
    assert_eq!(
        Severity::from_str_loose(&config.network.unauthorized_severity),
        Some(Severity::High)
    );
}

#[test]
fn invalid_value_surfaces_field_name() {
    let toml = r#"
[network]
rate_limit = 0
"#;
    let config = ChainwatchConfig::parse(toml).unwrap();
    let err = config.validate().unwrap_err();
    match err {
        ChainwatchError::Config(ConfigError::InvalidValue { field, .. }) => {
            assert_eq!(field, "network.rate_limit");
        }
        other => panic!("expected InvalidValue, got: {other}"),
    }
}

#[test]
fn unknown_toml_keys_are_tolerated() {
    // 알 수 없는 키는 무시됩니다 (이전 버전 설정 파일 호환)
    let toml = r#"
[general]
log_level = "info"
future_option = true
"#;
    let config = ChainwatchConfig::parse(toml).unwrap();
    config.validate().unwrap();
}
