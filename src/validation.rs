//! Field validators for request payloads.
//!
//! Every validator takes a raw JSON value and returns `Some(normalized)` or
//! `None`. Invalid input never produces an error; callers decide which
//! status code a missing field maps to.

use serde_json::Value;

use crate::models::{HttpMethod, Protocol};

/// Phone numbers are exactly this many characters once trimmed.
pub const PHONE_LEN: usize = 10;

/// Inclusive bounds for `timeoutSeconds`.
pub const MIN_TIMEOUT_SECONDS: u8 = 1;
pub const MAX_TIMEOUT_SECONDS: u8 = 5;

/// Returns the trimmed phone number when it is exactly [`PHONE_LEN`] characters.
pub fn validate_phone(value: &Value) -> Option<String> {
    let trimmed = value.as_str()?.trim();
    (trimmed.chars().count() == PHONE_LEN).then(|| trimmed.to_string())
}

/// Accepts any string that is non-empty after trimming. The original string
/// is returned untouched so passwords keep their whitespace.
pub fn validate_string_field(value: &Value) -> Option<String> {
    let s = value.as_str()?;
    (!s.trim().is_empty()).then(|| s.to_string())
}

/// Strict boolean, no coercion from strings or numbers.
pub fn validate_tos(value: &Value) -> Option<bool> {
    value.as_bool()
}

pub fn validate_protocol(value: &Value) -> Option<Protocol> {
    value.as_str().and_then(Protocol::parse)
}

pub fn validate_method(value: &Value) -> Option<HttpMethod> {
    value.as_str().and_then(HttpMethod::parse)
}

/// Non-empty array of integer status codes.
pub fn validate_success_codes(value: &Value) -> Option<Vec<u16>> {
    let codes = value.as_array()?;
    if codes.is_empty() {
        return None;
    }
    codes
        .iter()
        .map(|code| code.as_u64().and_then(|c| u16::try_from(c).ok()))
        .collect()
}

/// Whole number of seconds in `1..=5`. `3.0` is accepted, `3.5` is not.
pub fn validate_timeout_seconds(value: &Value) -> Option<u8> {
    let n = value.as_f64()?;
    if n.fract() != 0.0 {
        return None;
    }
    if n < f64::from(MIN_TIMEOUT_SECONDS) || n > f64::from(MAX_TIMEOUT_SECONDS) {
        return None;
    }
    Some(n as u8)
}

/// Never fails: anything that is not a list becomes an empty list, and
/// non-string entries are dropped.
pub fn validate_user_checks(value: &Value) -> Vec<String> {
    match value.as_array() {
        Some(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        None => Vec::new(),
    }
}

fn field<'a>(payload: &'a Value, key: &str) -> &'a Value {
    payload.get(key).unwrap_or(&Value::Null)
}

// ── Aggregates ──────────────────────────────────────────────────────

/// Validated view of a user payload. Each field is `None` when its
/// validator rejected it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserData {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub tos_agreement: Option<bool>,
}

impl UserData {
    /// True only when every field validated to a non-sentinel value.
    ///
    /// `tosAgreement: false` is a well-formed boolean, but `false` is the
    /// rejection sentinel, so it makes the payload invalid.
    pub fn is_valid(&self) -> bool {
        self.first_name.is_some()
            && self.last_name.is_some()
            && self.phone.is_some()
            && self.password.is_some()
            && self.tos_agreement == Some(true)
    }

    /// True when at least one of the fields a user may change is present.
    pub fn has_updates(&self) -> bool {
        self.first_name.is_some() || self.last_name.is_some() || self.password.is_some()
    }
}

pub fn validate_user_data(payload: &Value) -> UserData {
    UserData {
        first_name: validate_string_field(field(payload, "firstName")),
        last_name: validate_string_field(field(payload, "lastName")),
        phone: validate_phone(field(payload, "phone")),
        password: validate_string_field(field(payload, "password")),
        tos_agreement: validate_tos(field(payload, "tosAgreement")),
    }
}

/// Validated view of a check payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksData {
    pub protocol: Option<Protocol>,
    pub url: Option<String>,
    pub method: Option<HttpMethod>,
    pub success_codes: Option<Vec<u16>>,
    pub timeout_seconds: Option<u8>,
}

impl ChecksData {
    pub fn are_valid_all_fields(&self) -> bool {
        self.protocol.is_some()
            && self.url.is_some()
            && self.method.is_some()
            && self.success_codes.is_some()
            && self.timeout_seconds.is_some()
    }

    pub fn has_updates(&self) -> bool {
        self.protocol.is_some()
            || self.url.is_some()
            || self.method.is_some()
            || self.success_codes.is_some()
            || self.timeout_seconds.is_some()
    }
}

pub fn validate_checks_data(payload: &Value) -> ChecksData {
    ChecksData {
        protocol: validate_protocol(field(payload, "protocol")),
        url: validate_string_field(field(payload, "url")),
        method: validate_method(field(payload, "method")),
        success_codes: validate_success_codes(field(payload, "successCodes")),
        timeout_seconds: validate_timeout_seconds(field(payload, "timeoutSeconds")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn phone_requires_ten_trimmed_chars() {
        assert_eq!(validate_phone(&json!("5551234567")).as_deref(), Some("5551234567"));
        assert_eq!(validate_phone(&json!(" 5551234567 ")).as_deref(), Some("5551234567"));
        assert!(validate_phone(&json!("555123456")).is_none());
        assert!(validate_phone(&json!("55512345678")).is_none());
        assert!(validate_phone(&json!(5551234567_u64)).is_none());
        assert!(validate_phone(&Value::Null).is_none());
    }

    #[test]
    fn string_field_rejects_blank() {
        assert_eq!(validate_string_field(&json!(" pw ")).as_deref(), Some(" pw "));
        assert!(validate_string_field(&json!("   ")).is_none());
        assert!(validate_string_field(&json!("")).is_none());
        assert!(validate_string_field(&json!(42)).is_none());
    }

    #[test]
    fn tos_is_strict_boolean() {
        assert_eq!(validate_tos(&json!(true)), Some(true));
        assert_eq!(validate_tos(&json!(false)), Some(false));
        assert!(validate_tos(&json!("true")).is_none());
        assert!(validate_tos(&json!(1)).is_none());
    }

    #[test]
    fn protocol_and_method_are_exact_members() {
        assert_eq!(validate_protocol(&json!("https")), Some(Protocol::Https));
        assert!(validate_protocol(&json!("HTTPS")).is_none());
        assert!(validate_protocol(&json!("ftp")).is_none());
        assert_eq!(validate_method(&json!("delete")), Some(HttpMethod::Delete));
        assert!(validate_method(&json!("patch")).is_none());
    }

    #[test]
    fn success_codes_must_be_non_empty_integers() {
        assert_eq!(validate_success_codes(&json!([200, 301])), Some(vec![200, 301]));
        assert!(validate_success_codes(&json!([])).is_none());
        assert!(validate_success_codes(&json!([200, "ok"])).is_none());
        assert!(validate_success_codes(&json!(200)).is_none());
    }

    #[test]
    fn timeout_seconds_bounds() {
        assert_eq!(validate_timeout_seconds(&json!(1)), Some(1));
        assert_eq!(validate_timeout_seconds(&json!(5)), Some(5));
        assert_eq!(validate_timeout_seconds(&json!(3.0)), Some(3));
        assert!(validate_timeout_seconds(&json!(0)).is_none());
        assert!(validate_timeout_seconds(&json!(6)).is_none());
        assert!(validate_timeout_seconds(&json!(2.5)).is_none());
        assert!(validate_timeout_seconds(&json!("3")).is_none());
    }

    #[test]
    fn user_checks_never_fail() {
        assert_eq!(validate_user_checks(&json!(["a", "b"])), vec!["a", "b"]);
        assert!(validate_user_checks(&json!({"a": 1})).is_empty());
        assert!(validate_user_checks(&Value::Null).is_empty());
        assert_eq!(validate_user_checks(&json!(["a", 3])), vec!["a"]);
    }

    #[test]
    fn user_data_requires_every_field() {
        let payload = json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "phone": "5551234567",
            "password": "secret1",
            "tosAgreement": true
        });
        assert!(validate_user_data(&payload).is_valid());

        let mut missing = payload.clone();
        missing.as_object_mut().unwrap().remove("lastName");
        assert!(!validate_user_data(&missing).is_valid());
    }

    #[test]
    fn tos_false_invalidates_user_data() {
        let payload = json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "phone": "5551234567",
            "password": "secret1",
            "tosAgreement": false
        });
        let data = validate_user_data(&payload);
        assert_eq!(data.tos_agreement, Some(false));
        assert!(!data.is_valid());
    }

    #[test]
    fn user_updates_ignore_phone_and_tos() {
        let data = validate_user_data(&json!({"phone": "5551234567", "tosAgreement": true}));
        assert!(!data.has_updates());
        let data = validate_user_data(&json!({"lastName": "Byron"}));
        assert!(data.has_updates());
    }

    #[test]
    fn checks_data_flags_any_invalid_field() {
        let payload = json!({
            "protocol": "http",
            "url": "example.com",
            "method": "get",
            "successCodes": [200],
            "timeoutSeconds": 3
        });
        assert!(validate_checks_data(&payload).are_valid_all_fields());

        let mut bad = payload.clone();
        bad["timeoutSeconds"] = json!(9);
        let data = validate_checks_data(&bad);
        assert!(!data.are_valid_all_fields());
        assert!(data.has_updates());
    }
}
