//! API-key loading from the process environment and a private `.env` file.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use tracing::debug;

/// An API key whose value never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a raw key.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw key, for placing in a request header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns true when the key is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ApiKey").field(&"[REDACTED]").finish()
    }
}

/// Credentials loaded from a `.env` file.
#[derive(Clone, Default)]
pub struct Credentials {
    vars: BTreeMap<String, String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("keys", &self.vars.keys().collect::<Vec<_>>())
            .field("values", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Build credentials from a key-value map.
    pub fn from_map(vars: BTreeMap<String, String>) -> Self {
        Self { vars }
    }

    /// Returns a credential value for a key, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Resolve the API key for a provider.
    ///
    /// The process environment wins over the file; blank values are ignored.
    pub fn api_key_for(&self, provider: &str) -> Option<ApiKey> {
        self.api_key_with(provider, |key| std::env::var(key).ok())
    }

    /// Resolve the API key using a custom env resolver (for testing).
    pub fn api_key_with(
        &self,
        provider: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> Option<ApiKey> {
        let var = api_key_var(provider)?;
        env(var)
            .or_else(|| self.get(var).map(str::to_owned))
            .map(ApiKey::new)
            .filter(|key| !key.is_blank())
    }
}

/// Environment variable holding the key for a provider.
pub fn api_key_var(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("OPENAI_API_KEY"),
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        _ => None,
    }
}

/// Load credentials from a specific `.env` path.
///
/// A missing file yields empty credentials. The file's permissions are
/// tightened to owner-only where supported.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_credentials(path: &Path) -> anyhow::Result<Credentials> {
    if !path.exists() {
        debug!(path = %path.display(), "no credentials file");
        return Ok(Credentials::default());
    }

    enforce_private_file_permissions(path)?;

    let mut vars = BTreeMap::new();
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("failed to read credentials at {}", path.display()))?;

    for item in iter {
        let (key, value) = item.with_context(|| {
            format!(
                "failed to parse key-value entry in credentials file {}",
                path.display()
            )
        })?;
        vars.insert(key, value);
    }

    debug!(path = %path.display(), keys = vars.len(), "loaded credentials file");
    Ok(Credentials { vars })
}

/// Restrict a file to owner read/write when supported.
///
/// # Errors
///
/// Returns an error if permissions cannot be updated.
pub fn enforce_private_file_permissions(path: &Path) -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}
