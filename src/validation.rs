use crate::error::{Result, Error};

/// Redshift caps identifiers at 127 bytes.
pub const MAX_IDENTIFIER_LEN: usize = 127;

pub fn validate_api_key(api_key: &str) -> Result<()> {
    if api_key.is_empty() {
        return Err(Error::ConfigError("API key cannot be empty".to_string()));
    }
    if api_key.len() < 32 {
        return Err(Error::ConfigError("API key is too short".to_string()));
    }
    if api_key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::ConfigError("API key contains whitespace".to_string()));
    }
    Ok(())
}

pub fn validate_symbol(symbol: &str) -> Result<()> {
    if symbol.is_empty() {
        return Err(Error::ValidationError("Symbol cannot be empty".to_string()));
    }
    if !symbol.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
        return Err(Error::ValidationError("Symbol must contain only uppercase letters and digits".to_string()));
    }
    Ok(())
}

pub fn validate_currency(currency: &str) -> Result<()> {
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(Error::ValidationError(format!(
            "Currency must be a three-letter uppercase code, got '{}'",
            currency
        )));
    }
    Ok(())
}

/// Accepts plain SQL identifiers only, so they can be double-quoted verbatim.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::ValidationError("Identifier cannot be empty".to_string()));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(Error::ValidationError(format!(
            "Identifier '{}' is longer than {} bytes",
            name, MAX_IDENTIFIER_LEN
        )));
    }
    let mut chars = name.chars();
    let first_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if !first_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::ValidationError(format!(
            "Identifier '{}' must match [A-Za-z_][A-Za-z0-9_]*",
            name
        )));
    }
    Ok(())
}
