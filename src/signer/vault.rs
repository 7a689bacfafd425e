//! Key Vault URL construction.

use super::cloud::CloudEnvironment;
use super::error::SignerError;
use regex::Regex;
use std::sync::LazyLock;

static VAULT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-A-Za-z0-9]+$").expect("valid vault name pattern"));

/// `https://{name}.{dnsSuffix}/` for a valid vault name (3-24 chars of `[-A-Za-z0-9]`)
pub fn vault_url(env: &CloudEnvironment, vault_name: &str) -> Result<String, SignerError> {
    if !(3..=24).contains(&vault_name.len()) || !VAULT_NAME.is_match(vault_name) {
        return Err(SignerError::InvalidVaultName {
            name: vault_name.to_string(),
        });
    }

    Ok(format!(
        "https://{vault_name}.{}/",
        env.key_vault_dns_suffix
    ))
}
