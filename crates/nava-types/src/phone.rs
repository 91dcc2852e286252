//! Phone number handling. Users, web uploads and WhatsApp messages all spell
//! numbers differently ("9876543210", "+919876543210",
//! "whatsapp:+919876543210"); the last ten digits are the join key.

pub const PHONE_KEY_LEN: usize = 10;
const CODE_DIGITS: usize = 6;
const WHATSAPP_PREFIX: &str = "whatsapp:";

/// Last ten digits of `raw`, ignoring every non-digit character. Shorter
/// numbers are returned whole.
pub fn phone_key(raw: &str) -> String {
    let digits: Vec<char> = raw.chars().filter(char::is_ascii_digit).collect();
    let start = digits.len().saturating_sub(PHONE_KEY_LEN);
    digits[start..].iter().collect()
}

/// Display name used for content whose author never registered.
pub fn fallback_display_name(raw: &str) -> String {
    let key = phone_key(raw);
    let start = key.len().saturating_sub(4);
    format!("User {}", &key[start..])
}

/// Short user code: "nava" followed by the last six digits, zero padded.
pub fn short_code(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let start = digits.len().saturating_sub(CODE_DIGITS);
    format!("nava{:0>width$}", &digits[start..], width = CODE_DIGITS)
}

/// Address format used by the WhatsApp webhook. Bare ten-digit numbers are
/// assumed to be Indian mobiles.
pub fn whatsapp_address(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with(WHATSAPP_PREFIX) {
        return raw.to_string();
    }
    if raw.len() == PHONE_KEY_LEN && raw.chars().all(|c| c.is_ascii_digit()) {
        format!("{}+91{}", WHATSAPP_PREFIX, raw)
    } else {
        format!("{}{}", WHATSAPP_PREFIX, raw)
    }
}
