//! Model spec parsing and provider selection.

use textcal::config::ExtractionSettings;
use textcal::credentials::ApiKey;
use textcal::providers::router::{build_provider, parse_model_spec, RouterError};

fn settings(model: &str) -> ExtractionSettings {
    ExtractionSettings::new(ApiKey::new("test-key"), model, 3, 30).expect("valid settings")
}

#[test]
fn parse_model_spec_splits_provider_and_model() {
    let parsed = parse_model_spec("anthropic/claude-haiku-4-5").expect("valid spec");
    assert_eq!(parsed.provider, "anthropic");
    assert_eq!(parsed.model, "claude-haiku-4-5");
}

#[test]
fn bare_model_name_defaults_to_openai() {
    let parsed = parse_model_spec("gpt-4o-mini").expect("valid spec");
    assert_eq!(parsed.provider, "openai");
    assert_eq!(parsed.model, "gpt-4o-mini");
}

#[test]
fn provider_prefix_is_case_insensitive() {
    let parsed = parse_model_spec("OpenAI/gpt-4o").expect("valid spec");
    assert_eq!(parsed.provider, "openai");
}

#[test]
fn empty_halves_are_invalid() {
    assert!(matches!(
        parse_model_spec("openai/"),
        Err(RouterError::InvalidModelSpec { .. })
    ));
    assert!(matches!(
        parse_model_spec("/gpt-4o"),
        Err(RouterError::InvalidModelSpec { .. })
    ));
}

#[test]
fn build_provider_selects_backend_by_prefix() {
    let openai = build_provider(&settings("openai/gpt-4o-mini")).expect("openai builds");
    assert_eq!(openai.model_id(), "openai/gpt-4o-mini");
    assert!(openai.supports_json_mode());

    let anthropic = build_provider(&settings("anthropic/claude-haiku-4-5")).expect("anthropic builds");
    assert_eq!(anthropic.model_id(), "anthropic/claude-haiku-4-5");
    assert!(!anthropic.supports_json_mode());
}

#[test]
fn build_provider_rejects_unknown_prefix() {
    let err = build_provider(&settings("mystery/model-1")).err();
    assert_eq!(
        err,
        Some(RouterError::UnsupportedProvider {
            provider: "mystery".to_owned()
        })
    );
}
