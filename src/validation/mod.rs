use bigdecimal::BigDecimal;
use std::fmt;

pub const TX_HASH_LEN: usize = 64;
pub const STELLAR_ACCOUNT_LEN: usize = 56;
pub const CURRENCY_CODE_MAX_LEN: usize = 12;
pub const SOURCE_FIELD_MAX_LEN: usize = 255;
pub const DETAILS_MAX_LEN: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

/// Ledger transaction hashes are 64 hex characters.
pub fn validate_tx_hash(tx_hash: &str) -> ValidationResult {
    let tx_hash = sanitize_string(tx_hash);
    validate_required("tx_hash", &tx_hash)?;

    if tx_hash.len() != TX_HASH_LEN {
        return Err(ValidationError::new(
            "tx_hash",
            format!("must be exactly {} characters", TX_HASH_LEN),
        ));
    }

    if !tx_hash.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err(ValidationError::new(
            "tx_hash",
            "must contain only hex characters",
        ));
    }

    Ok(())
}

pub fn validate_wallet_address(address: &str) -> ValidationResult {
    let address = sanitize_string(address);
    validate_required("wallet_address", &address)?;

    if address.len() != STELLAR_ACCOUNT_LEN {
        return Err(ValidationError::new(
            "wallet_address",
            format!("must be exactly {} characters", STELLAR_ACCOUNT_LEN),
        ));
    }

    if !address.starts_with('G') {
        return Err(ValidationError::new("wallet_address", "must start with 'G'"));
    }

    if !address
        .chars()
        .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit())
    {
        return Err(ValidationError::new(
            "wallet_address",
            "must contain only uppercase letters and digits",
        ));
    }

    Ok(())
}

pub fn validate_currency_code(currency: &str) -> ValidationResult {
    let currency = sanitize_string(currency);
    validate_required("currency", &currency)?;
    validate_max_len("currency", &currency, CURRENCY_CODE_MAX_LEN)?;

    if !currency
        .chars()
        .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit())
    {
        return Err(ValidationError::new(
            "currency",
            "must contain only uppercase letters and digits",
        ));
    }

    Ok(())
}

pub fn validate_positive_amount(amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn valid_hash() -> String {
        "a1b2c3d4".repeat(8)
    }

    fn valid_account() -> String {
        "G".to_owned() + &"A".repeat(55)
    }

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  hello\tworld  "), "hello world");
        assert_eq!(sanitize_string("single"), "single");
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
    }

    #[test]
    fn validates_tx_hash() {
        assert!(validate_tx_hash(&valid_hash()).is_ok());
        assert!(validate_tx_hash(&format!(" {} ", valid_hash())).is_ok());
        assert!(validate_tx_hash("abc123").is_err());
        assert!(validate_tx_hash(&"g".repeat(64)).is_err());
        assert!(validate_tx_hash("").is_err());
    }

    #[test]
    fn validates_wallet_address() {
        assert!(validate_wallet_address(&valid_account()).is_ok());
        assert!(validate_wallet_address("GSHORT").is_err());
        assert!(validate_wallet_address(&("g".to_owned() + &"A".repeat(55))).is_err());
        assert!(validate_wallet_address(&("G".to_owned() + &"a".repeat(55))).is_err());
    }

    #[test]
    fn validates_currency_code() {
        assert!(validate_currency_code("XLM").is_ok());
        assert!(validate_currency_code("USDC").is_ok());
        assert!(validate_currency_code("xlm").is_err());
        assert!(validate_currency_code(&"A".repeat(13)).is_err());
        assert!(validate_currency_code("XL M").is_err());
        assert!(validate_currency_code("").is_err());
    }

    #[test]
    fn validates_positive_amount() {
        let positive = BigDecimal::from_str("1.23").expect("valid decimal");
        let zero = BigDecimal::from(0);
        let negative = BigDecimal::from(-1);

        assert!(validate_positive_amount(&positive).is_ok());
        assert!(validate_positive_amount(&zero).is_err());
        assert!(validate_positive_amount(&negative).is_err());
    }
}
