//! API token management
//!
//! Statistics API tokens are per seller account ("actor"). They are held in
//! `Zeroizing` buffers so they are wiped from memory when dropped, and are
//! never printed by `Debug`.
//!
//! # Sources, in order
//! - `WB_API_TOKEN_<ACTOR>` environment variable
//! - 1Password CLI, when an `op://` reference is configured
//! - `WB_API_TOKEN` environment variable
//! - `Token_wb` environment variable (name used by the older scripts' `.env`)

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

pub const DEFAULT_TOKEN_VAR: &str = "WB_API_TOKEN";
pub const LEGACY_TOKEN_VAR: &str = "Token_wb";

/// Error type for secret loading operations
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No API token configured for {0}")]
    NotFound(String),

    #[error("1Password CLI error: {0}")]
    OnePasswordError(String),

    #[error("Secret validation failed: {0}")]
    ValidationFailed(String),
}

/// Bearer token for the statistics API
#[derive(Clone)]
pub struct ApiToken(Zeroizing<String>);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Result<Self, SecretError> {
        let token = Zeroizing::new(token.into());
        validate_token(&token)?;
        Ok(Self(Zeroizing::new(token.trim().to_string())))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Value of the `Authorization` header
    pub fn bearer(&self) -> Zeroizing<String> {
        Zeroizing::new(format!("Bearer {}", self.expose()))
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(***)")
    }
}

/// Reject tokens that cannot possibly be valid
pub fn validate_token(token: &str) -> Result<(), SecretError> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return Err(SecretError::ValidationFailed("token is empty".to_string()));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(SecretError::ValidationFailed(
            "token contains whitespace".to_string(),
        ));
    }
    Ok(())
}

/// Resolves the API token of a seller account
pub trait TokenProvider: Send + Sync {
    fn token_for(&self, actor: &str) -> Result<ApiToken, SecretError>;
}

/// Configuration for secret loading
#[derive(Debug, Clone, Default)]
pub struct SecretConfig {
    /// 1Password reference tried when no per-actor variable is set, e.g. `op://Private/WB/token`
    pub op_reference: Option<String>,
}

/// Token provider backed by 1Password and environment variables.
///
/// A token is resolved once per actor and kept for the lifetime of the
/// provider, so `op read` runs at most once per actor. After the first
/// failure the 1Password CLI is not tried again.
#[derive(Debug, Default)]
pub struct EnvTokenProvider {
    config: SecretConfig,
    resolved: Mutex<HashMap<String, ApiToken>>,
    op_unavailable: AtomicBool,
}

impl EnvTokenProvider {
    pub fn new(config: SecretConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    fn resolve(&self, actor: &str) -> Result<ApiToken, SecretError> {
        let actor_var = actor_token_var(actor);
        if let Ok(secret) = load_from_env(&actor_var) {
            debug!(actor = %actor, source = %actor_var, "Loaded API token from environment");
            return ApiToken::new(secret.as_str());
        }

        if let Some(reference) = &self.config.op_reference {
            if !self.op_unavailable.load(Ordering::Relaxed) {
                match load_from_op_cli(reference) {
                    Ok(secret) => {
                        info!(actor = %actor, "Loaded API token from 1Password CLI");
                        return ApiToken::new(secret.as_str());
                    }
                    Err(e) => {
                        warn!("1Password CLI not available: {}", e);
                        self.op_unavailable.store(true, Ordering::Relaxed);
                    }
                }
            }
        }

        for var in [DEFAULT_TOKEN_VAR, LEGACY_TOKEN_VAR] {
            if let Ok(secret) = load_from_env(var) {
                debug!(actor = %actor, source = %var, "Loaded API token from environment");
                return ApiToken::new(secret.as_str());
            }
        }

        Err(SecretError::NotFound(actor.to_string()))
    }
}

/// Environment variable holding the token of one actor
pub fn actor_token_var(actor: &str) -> String {
    let suffix: String = actor
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}", DEFAULT_TOKEN_VAR, suffix)
}

impl TokenProvider for EnvTokenProvider {
    fn token_for(&self, actor: &str) -> Result<ApiToken, SecretError> {
        let cached = self
            .resolved
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(actor)
            .cloned();
        if let Some(token) = cached {
            return Ok(token);
        }

        let token = self.resolve(actor)?;
        self.resolved
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(actor.to_string(), token.clone());
        Ok(token)
    }
}

/// Fixed set of tokens, e.g. one passed on the command line
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    tokens: HashMap<String, ApiToken>,
}

impl StaticTokenProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, actor: impl Into<String>, token: ApiToken) -> Self {
        self.tokens.insert(actor.into(), token);
        self
    }
}

impl TokenProvider for StaticTokenProvider {
    fn token_for(&self, actor: &str) -> Result<ApiToken, SecretError> {
        self.tokens
            .get(actor)
            .cloned()
            .ok_or_else(|| SecretError::NotFound(actor.to_string()))
    }
}

/// Load a secret from 1Password CLI
fn load_from_op_cli(reference: &str) -> Result<Zeroizing<String>, SecretError> {
    use std::process::Command;

    let output = Command::new("op")
        .arg("read")
        .arg(reference)
        .output()
        .map_err(|e| {
            SecretError::OnePasswordError(format!("Failed to execute 'op' command: {}", e))
        })?;

    if !output.status.success() {
        let error_msg = String::from_utf8_lossy(&output.stderr);
        return Err(SecretError::OnePasswordError(format!(
            "1Password CLI failed: {}",
            error_msg
        )));
    }

    let secret = String::from_utf8(output.stdout)
        .map_err(|e| SecretError::OnePasswordError(format!("Invalid UTF-8 from 1Password: {}", e)))?
        .trim()
        .to_string();

    if secret.is_empty() {
        return Err(SecretError::OnePasswordError(
            "1Password returned empty secret".to_string(),
        ));
    }

    Ok(Zeroizing::new(secret))
}

fn load_from_env(env_var_name: &str) -> Result<Zeroizing<String>, SecretError> {
    env::var(env_var_name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(Zeroizing::new)
        .ok_or_else(|| SecretError::NotFound(env_var_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_token() {
        assert!(validate_token("").is_err());
        assert!(validate_token("   ").is_err());
        assert!(validate_token("abc def").is_err());
        assert!(validate_token("eyJhbGciOiJFUzI1NiJ9.payload.sig").is_ok());
    }

    #[test]
    fn test_token_is_trimmed_and_redacted() {
        let token = ApiToken::new("  secret-token\n").unwrap();
        assert_eq!(token.expose(), "secret-token");
        assert_eq!(token.bearer().as_str(), "Bearer secret-token");
        assert_eq!(format!("{:?}", token), "ApiToken(***)");
    }

    #[test]
    fn test_actor_token_var() {
        assert_eq!(actor_token_var("yalow-shop"), "WB_API_TOKEN_YALOW_SHOP");
        assert_eq!(actor_token_var("42"), "WB_API_TOKEN_42");
    }

    #[test]
    fn test_actor_specific_env_var() {
        env::set_var("WB_API_TOKEN_SECRETS_TEST_ACTOR", "actor-token");
        let provider = EnvTokenProvider::default();
        let token = provider.token_for("secrets-test-actor").unwrap();
        assert_eq!(token.expose(), "actor-token");
        env::remove_var("WB_API_TOKEN_SECRETS_TEST_ACTOR");
    }

    #[test]
    fn test_token_is_resolved_once_per_actor() {
        env::set_var("WB_API_TOKEN_SECRETS_MEMO_ACTOR", "first-token");
        let provider = EnvTokenProvider::default();
        assert_eq!(provider.token_for("secrets-memo-actor").unwrap().expose(), "first-token");

        env::remove_var("WB_API_TOKEN_SECRETS_MEMO_ACTOR");
        assert_eq!(provider.token_for("secrets-memo-actor").unwrap().expose(), "first-token");
    }

    #[test]
    fn test_actor_var_wins_over_op_reference() {
        env::set_var("WB_API_TOKEN_SECRETS_OP_ACTOR", "actor-token");
        let provider = EnvTokenProvider::new(SecretConfig {
            op_reference: Some("op://Vault/Item/field".to_string()),
        });
        let token = provider.token_for("secrets-op-actor").unwrap();
        assert_eq!(token.expose(), "actor-token");
        assert!(!provider.op_unavailable.load(Ordering::Relaxed));
        env::remove_var("WB_API_TOKEN_SECRETS_OP_ACTOR");
    }

    #[test]
    fn test_missing_token_is_not_remembered() {
        let provider = EnvTokenProvider::default();
        assert!(provider.token_for("secrets-late-actor").is_err());

        env::set_var("WB_API_TOKEN_SECRETS_LATE_ACTOR", "late-token");
        assert_eq!(provider.token_for("secrets-late-actor").unwrap().expose(), "late-token");
        env::remove_var("WB_API_TOKEN_SECRETS_LATE_ACTOR");
    }

    #[test]
    fn test_static_provider() {
        let provider = StaticTokenProvider::new().with_token("shop", ApiToken::new("t").unwrap());
        assert_eq!(provider.token_for("shop").unwrap().expose(), "t");
        assert!(matches!(
            provider.token_for("other"),
            Err(SecretError::NotFound(actor)) if actor == "other"
        ));
    }

    #[test]
    fn test_load_from_env_missing() {
        assert!(load_from_env("SELLER_PULSE_NONEXISTENT_VAR").is_err());
    }
}
