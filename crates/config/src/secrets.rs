// SMTP secret lookup
//
// The SMTP password is taken from:
// 1. Environment variable CARDOPS_SMTP_PASSWORD (CI/headless)
// 2. System keychain (with the `keychain` feature)
//
// It is NEVER stored in settings.toml

use std::env;

pub const SMTP_PASSWORD_ENV: &str = "CARDOPS_SMTP_PASSWORD";

/// Service name for keychain storage
#[cfg(feature = "keychain")]
const KEYCHAIN_SERVICE: &str = "cardops";

/// Source of a secret
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSource {
    Environment,
    Keychain,
    None,
}

impl SecretSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretSource::Environment => "environment",
            SecretSource::Keychain => "keychain",
            SecretSource::None => "none",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecretLookup {
    pub secret: Option<String>,
    pub source: SecretSource,
}

#[cfg(feature = "keychain")]
fn keychain_account(username: &str) -> String {
    format!("smtp/{}", username.to_lowercase())
}

/// SMTP password for `username`: environment first, then keychain.
pub fn smtp_password(username: &str) -> SecretLookup {
    if let Ok(password) = env::var(SMTP_PASSWORD_ENV) {
        if !password.is_empty() {
            return SecretLookup { secret: Some(password), source: SecretSource::Environment };
        }
    }

    #[cfg(feature = "keychain")]
    {
        if let Ok(entry) = keyring::Entry::new(KEYCHAIN_SERVICE, &keychain_account(username)) {
            if let Ok(password) = entry.get_password() {
                return SecretLookup { secret: Some(password), source: SecretSource::Keychain };
            }
        }
    }
    #[cfg(not(feature = "keychain"))]
    let _ = username;

    SecretLookup { secret: None, source: SecretSource::None }
}

/// Store the SMTP password in the system keychain
#[cfg(feature = "keychain")]
pub fn set_smtp_password(username: &str, password: &str) -> Result<(), String> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, &keychain_account(username))
        .map_err(|e| format!("Failed to create keychain entry: {}", e))?;

    entry
        .set_password(password)
        .map_err(|e| format!("Failed to store password in keychain: {}", e))
}

#[cfg(not(feature = "keychain"))]
pub fn set_smtp_password(_username: &str, _password: &str) -> Result<(), String> {
    Err(format!("Keychain support not enabled. Set {SMTP_PASSWORD_ENV} instead."))
}
