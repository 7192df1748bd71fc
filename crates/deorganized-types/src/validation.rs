use std::collections::BTreeMap;

use serde::Serialize;

/// Per-field validation messages, serialized as `{ "field": ["msg", ...] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok(())` when no field failed.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 150;
pub const PASSWORD_MIN: usize = 8;
pub const BIO_MAX: usize = 500;
pub const POST_MAX: usize = 2000;
pub const COMMENT_MAX: usize = 1000;

/// 3-150 characters of letters, digits, `_` or `-`.
pub fn check_username(username: &str) -> Result<(), String> {
    let len = username.chars().count();
    let charset_ok = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if len < USERNAME_MIN || len > USERNAME_MAX || !charset_ok {
        return Err(
            "Username must be 3-150 characters and contain only letters, numbers, underscores, and hyphens"
                .into(),
        );
    }
    Ok(())
}

/// Stacks addresses start with SP (mainnet) or ST (testnet).
pub fn check_wallet_prefix(address: &str) -> Result<(), String> {
    if address.is_empty() {
        return Err("Wallet address is required".into());
    }
    if !(address.starts_with("SP") || address.starts_with("ST")) {
        return Err("Invalid Stacks address format. Must start with SP or ST.".into());
    }
    Ok(())
}

/// Prefix check plus the 38-45 character length window.
pub fn check_wallet_address(address: &str) -> Result<(), String> {
    check_wallet_prefix(address)?;
    if !(38..=45).contains(&address.len()) {
        return Err("Invalid Stacks address length".into());
    }
    Ok(())
}

pub fn check_email(email: &str) -> Result<(), String> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') => Ok(()),
        _ => Err("Enter a valid email address.".into()),
    }
}

pub fn check_url(url: &str) -> Result<(), String> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err("Enter a valid URL.".into())
    }
}

/// Check `value` is no longer than `max` characters, recording into `errors`.
pub fn check_max_len(errors: &mut FieldErrors, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.add(field, format!("Ensure this field has no more than {max} characters."));
    }
}

/// Lowercase ASCII slug: alphanumerics kept, runs of anything else become one `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else if c == '_' || c == '-' || c.is_whitespace() {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_serialize_as_map_of_lists() {
        let mut errors = FieldErrors::single("username", "taken");
        errors.add("username", "too short");
        errors.add("email", "invalid");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["username"][1], "too short");
        assert_eq!(json["email"][0], "invalid");
    }

    #[test]
    fn username_rules() {
        assert!(check_username("alice_01").is_ok());
        assert!(check_username("al").is_err());
        assert!(check_username("bad name").is_err());
    }

    #[test]
    fn wallet_rules() {
        let addr = "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7";
        assert!(check_wallet_address(addr).is_ok());
        assert!(check_wallet_address("SP123").is_err());
        assert!(check_wallet_prefix("XX2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7").is_err());
        assert!(check_wallet_prefix("ST1").is_ok());
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("The  Morning Show!"), "the-morning-show");
        assert_eq!(slugify("--Crypto & DeFi--"), "crypto-defi");
        assert_eq!(slugify("!!!"), "");
    }
}
