//! Field-level payload checks.
//!
//! Each check looks at one JSON value and returns `None` or a message. The
//! aggregate functions run every check and collect all violations, so a
//! caller can report every problem in one response.

use serde_json::Value;
use url::Url;

use crate::error::FieldError;

pub const REASON_MIN_CHARS: usize = 10;
pub const REASON_MAX_CHARS: usize = 1000;
pub const CHEAT_NAME_MAX_CHARS: usize = 200;
pub const PASSWORD_MIN_CHARS: usize = 6;

/// A required string field: `Err` carries the violation message.
fn required_str<'a>(value: Option<&'a Value>, label: &str) -> Result<&'a str, String> {
    match value {
        None | Some(Value::Null) => Err(format!("{} is required", label)),
        Some(Value::String(s)) if s.is_empty() => Err(format!("{} is required", label)),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(format!("{} must be a string", label)),
    }
}

/// `steam:` followed by one or more hex digits.
pub fn is_steam_id(s: &str) -> bool {
    match s.strip_prefix("steam:") {
        Some(hex) => !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// `local@domain.tld` with no whitespace and exactly one `@`.
pub fn is_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    // Needs a dot with at least one character on each side.
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

pub fn validate_steam_id(value: Option<&Value>) -> Option<String> {
    match required_str(value, "Steam ID") {
        Err(msg) => Some(msg),
        Ok(s) if !is_steam_id(s) => Some("Invalid Steam ID format (must be steam:hexadecimal)".to_string()),
        Ok(_) => None,
    }
}

pub fn validate_discord_id(value: Option<&Value>) -> Option<String> {
    required_str(value, "Discord ID").err()
}

pub fn validate_reason(value: Option<&Value>) -> Option<String> {
    let reason = match required_str(value, "Reason") {
        Ok(r) => r,
        Err(msg) => return Some(msg),
    };
    if reason.trim().chars().count() < REASON_MIN_CHARS {
        return Some(format!("Reason must be at least {} characters", REASON_MIN_CHARS));
    }
    if reason.chars().count() > REASON_MAX_CHARS {
        return Some(format!("Reason must not exceed {} characters", REASON_MAX_CHARS));
    }
    None
}

/// Optional; bounded length when present.
pub fn validate_cheat_name(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.chars().count() > CHEAT_NAME_MAX_CHARS => {
            Some(format!("Cheat name must not exceed {} characters", CHEAT_NAME_MAX_CHARS))
        }
        Some(Value::String(_)) => None,
        Some(_) => Some("Cheat name must be a string".to_string()),
    }
}

/// Optional; must parse as an absolute URL when present and non-empty.
pub fn validate_url(value: Option<&Value>, label: &str) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) if Url::parse(s).is_ok() => None,
        Some(_) => Some(format!("{} must be a valid URL", label)),
    }
}

pub fn validate_email(value: Option<&Value>) -> Option<String> {
    match required_str(value, "Email") {
        Err(msg) => Some(msg),
        Ok(s) if !is_email(s) => Some("Invalid email format".to_string()),
        Ok(_) => None,
    }
}

pub fn validate_password(value: Option<&Value>) -> Option<String> {
    match required_str(value, "Password") {
        Err(msg) => Some(msg),
        Ok(s) if s.chars().count() < PASSWORD_MIN_CHARS => {
            Some(format!("Password must be at least {} characters", PASSWORD_MIN_CHARS))
        }
        Ok(_) => None,
    }
}

type Check = fn(Option<&Value>) -> Option<String>;

fn proof_url(value: Option<&Value>) -> Option<String> {
    validate_url(value, "Proof URL")
}

fn steam_profile_url(value: Option<&Value>) -> Option<String> {
    validate_url(value, "Steam Profile URL")
}

/// Record profile, in reporting order.
const CLOWN_CHECKS: &[(&str, Check)] = &[
    ("steamId", validate_steam_id),
    ("discordId", validate_discord_id),
    ("reason", validate_reason),
    ("cheatName", validate_cheat_name),
    ("proofUrl", proof_url),
    ("steamProfileUrl", steam_profile_url),
];

const LOGIN_CHECKS: &[(&str, Check)] = &[("email", validate_email), ("password", validate_password)];

fn run_checks(data: &Value, checks: &[(&str, Check)]) -> Vec<FieldError> {
    checks
        .iter()
        .filter_map(|(field, check)| check(data.get(*field)).map(|msg| FieldError::new(*field, msg)))
        .collect()
}

/// Validates a full ban list entry.
pub fn validate_clown_data(data: &Value) -> Vec<FieldError> {
    run_checks(data, CLOWN_CHECKS)
}

/// Validates a partial update: only fields present in `data` are checked.
pub fn validate_clown_update(data: &Value) -> Vec<FieldError> {
    let present: Vec<(&str, Check)> = CLOWN_CHECKS
        .iter()
        .copied()
        .filter(|(field, _)| data.get(*field).is_some())
        .collect();
    run_checks(data, &present)
}

/// Validates login credentials.
pub fn validate_login_data(data: &Value) -> Vec<FieldError> {
    run_checks(data, LOGIN_CHECKS)
}

/// Sanitizes user input for logging purposes.
///
/// Removes control characters, limits the length and escapes quotes so that
/// header values cannot forge log lines.
pub fn sanitize_for_logging(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control())
        .take(200)
        .collect::<String>()
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(errors: &[FieldError]) -> Vec<&str> {
        errors.iter().map(|e| e.field.as_str()).collect()
    }

    fn valid_clown() -> Value {
        json!({
            "steamId": "steam:11000010a2b3c4d",
            "discordId": "1234567890",
            "reason": "Aimbot observed in three recorded matches",
            "cheatName": "FancyHax",
            "proofUrl": "https://youtube.com/watch?v=abc",
        })
    }

    #[test]
    fn test_steam_id_format() {
        assert!(is_steam_id("steam:deadBEEF01"));
        assert!(!is_steam_id("steam:"));
        assert!(!is_steam_id("steam:xyz"));
        assert!(!is_steam_id("STEAM:abc"));
        assert!(!is_steam_id("abc"));

        assert_eq!(validate_steam_id(None).as_deref(), Some("Steam ID is required"));
        assert_eq!(validate_steam_id(Some(&json!(42))).as_deref(), Some("Steam ID must be a string"));
        assert!(validate_steam_id(Some(&json!("steam:abc"))).is_none());
    }

    #[test]
    fn test_reason_bounds() {
        assert_eq!(validate_reason(Some(&json!(""))).as_deref(), Some("Reason is required"));
        assert_eq!(
            validate_reason(Some(&json!("   short    "))).as_deref(),
            Some("Reason must be at least 10 characters")
        );
        assert!(validate_reason(Some(&json!("exactly 10"))).is_none());
        assert!(validate_reason(Some(&json!("a".repeat(1000)))).is_none());
        assert_eq!(
            validate_reason(Some(&json!("a".repeat(1001)))).as_deref(),
            Some("Reason must not exceed 1000 characters")
        );
    }

    #[test]
    fn test_optional_fields() {
        assert!(validate_cheat_name(None).is_none());
        assert!(validate_cheat_name(Some(&json!("x".repeat(200)))).is_none());
        assert!(validate_cheat_name(Some(&json!("x".repeat(201)))).is_some());

        assert!(validate_url(None, "Proof URL").is_none());
        assert!(validate_url(Some(&json!("")), "Proof URL").is_none());
        assert!(validate_url(Some(&json!("https://imgur.com/a/xyz")), "Proof URL").is_none());
        assert_eq!(
            validate_url(Some(&json!("not a url")), "Proof URL").as_deref(),
            Some("Proof URL must be a valid URL")
        );
    }

    #[test]
    fn test_email_and_password() {
        assert!(is_email("admin@example.com"));
        assert!(!is_email("admin@example"));
        assert!(!is_email("admin@.com"));
        assert!(!is_email("admin@example."));
        assert!(!is_email("ad min@example.com"));
        assert!(!is_email("a@b@example.com"));
        assert!(!is_email("@example.com"));

        assert_eq!(validate_password(Some(&json!("12345"))).as_deref(), Some("Password must be at least 6 characters"));
        assert!(validate_password(Some(&json!("123456"))).is_none());
    }

    #[test]
    fn test_valid_clown_has_no_errors() {
        assert!(validate_clown_data(&valid_clown()).is_empty());
    }

    #[test]
    fn test_missing_reason_and_bad_steam_id_gives_exactly_two_errors() {
        let mut data = valid_clown();
        data["steamId"] = json!("76561198000000000");
        data.as_object_mut().unwrap().remove("reason");

        let errors = validate_clown_data(&data);
        assert_eq!(errors.len(), 2);
        let mut tagged = fields(&errors);
        tagged.sort();
        assert_eq!(tagged, vec!["reason", "steamId"]);
    }

    #[test]
    fn test_all_violations_reported_in_order() {
        let errors = validate_clown_data(&json!({
            "cheatName": "x".repeat(300),
            "proofUrl": "nope",
            "steamProfileUrl": "also nope",
        }));
        assert_eq!(
            fields(&errors),
            vec!["steamId", "discordId", "reason", "cheatName", "proofUrl", "steamProfileUrl"]
        );
    }

    #[test]
    fn test_non_object_body_reports_required_fields() {
        assert_eq!(fields(&validate_clown_data(&json!("oops"))), vec!["steamId", "discordId", "reason"]);
        assert_eq!(fields(&validate_login_data(&Value::Null)), vec!["email", "password"]);
    }

    #[test]
    fn test_update_checks_only_present_fields() {
        assert!(validate_clown_update(&json!({ "cheatName": "Wallhack" })).is_empty());
        let errors = validate_clown_update(&json!({ "reason": "short", "proofUrl": "bad" }));
        assert_eq!(fields(&errors), vec!["reason", "proofUrl"]);
        let errors = validate_clown_update(&json!({ "steamId": null }));
        assert_eq!(fields(&errors), vec!["steamId"]);
    }

    #[test]
    fn test_login_profile() {
        let errors = validate_login_data(&json!({ "email": "bad", "password": "123" }));
        assert_eq!(fields(&errors), vec!["email", "password"]);
        assert!(validate_login_data(&json!({ "email": "a@b.co", "password": "hunter22" })).is_empty());
    }

    #[test]
    fn test_sanitize_for_logging() {
        assert_eq!(sanitize_for_logging("normal text"), "normal text");
        assert_eq!(sanitize_for_logging("line\nbreak"), "linebreak");
        assert_eq!(sanitize_for_logging("say \"hi\""), "say \\\"hi\\\"");
        assert_eq!(sanitize_for_logging(&"a".repeat(300)).len(), 200);
    }
}
