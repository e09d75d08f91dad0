//! Coverage for credential loading and permission handling.

use std::fs;
use std::path::PathBuf;

use textcal::credentials::{api_key_var, load_credentials};

fn temp_env_path(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join(".env")
}

#[test]
fn loads_env_credentials() {
    let dir = tempfile::tempdir().expect("temp dir");
    let env_path = temp_env_path(&dir);
    fs::write(
        &env_path,
        "OPENAI_API_KEY=sk-test-openai\nANTHROPIC_API_KEY=abc123\n",
    )
    .expect("write env file");

    let credentials = match load_credentials(&env_path) {
        Ok(credentials) => credentials,
        Err(err) => panic!("credentials should load: {err}"),
    };

    assert_eq!(credentials.get("OPENAI_API_KEY"), Some("sk-test-openai"));
    assert_eq!(credentials.get("ANTHROPIC_API_KEY"), Some("abc123"));
    let key = credentials
        .api_key_with("anthropic", |_| None)
        .expect("anthropic key present");
    assert_eq!(key.expose(), "abc123");
}

#[test]
fn missing_file_yields_empty_credentials() {
    let dir = tempfile::tempdir().expect("temp dir");
    let credentials = load_credentials(&temp_env_path(&dir)).expect("missing file is fine");
    assert!(credentials.get("OPENAI_API_KEY").is_none());
    assert!(credentials.api_key_with("openai", |_| None).is_none());
}

#[cfg(unix)]
#[test]
fn loading_tightens_world_readable_file() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().expect("temp dir");
    let env_path = temp_env_path(&dir);
    fs::write(&env_path, "OPENAI_API_KEY=sk-test\n").expect("write env file");
    fs::set_permissions(&env_path, fs::Permissions::from_mode(0o644)).expect("chmod");

    load_credentials(&env_path).expect("credentials load");

    let mode = fs::metadata(&env_path).expect("metadata").permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn credentials_debug_hides_values() {
    let dir = tempfile::tempdir().expect("temp dir");
    let env_path = temp_env_path(&dir);
    fs::write(&env_path, "OPENAI_API_KEY=sk-very-secret\n").expect("write env file");
    let credentials = load_credentials(&env_path).expect("credentials load");

    let rendered = format!("{credentials:?}");
    assert!(!rendered.contains("sk-very-secret"));
}

#[test]
fn provider_key_variables() {
    assert_eq!(api_key_var("openai"), Some("OPENAI_API_KEY"));
    assert_eq!(api_key_var("anthropic"), Some("ANTHROPIC_API_KEY"));
    assert_eq!(api_key_var("ollama"), None);
}
