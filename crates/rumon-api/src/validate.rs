//! Field checks shared by the request `Validate` impls.

use chrono::NaiveTime;
use url::Url;

/// Collects failure messages; `finish` turns them into the `Validate` result.
#[derive(Debug, Default)]
pub struct Errors(Vec<String>);

impl Errors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, message: impl Into<String>) -> &mut Self {
        if !ok {
            self.0.push(message.into());
        }
        self
    }

    /// Like `check`, but only when the optional field was sent.
    pub fn check_opt<T>(
        &mut self,
        value: Option<T>,
        ok: impl FnOnce(T) -> bool,
        message: impl Into<String>,
    ) -> &mut Self {
        if let Some(v) = value {
            self.check(ok(v), message);
        }
        self
    }

    pub fn finish(&mut self) -> Result<(), Vec<String>> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(std::mem::take(&mut self.0))
        }
    }
}

/// At least `min` characters once surrounding whitespace is dropped.
pub fn min_len(value: &str, min: usize) -> bool {
    value.trim().chars().count() >= min
}

pub fn not_blank(value: &str) -> bool {
    !value.trim().is_empty()
}

pub fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

/// Brazilian number: optional +55, then area code and 8 or 9 digits.
/// Spaces, dashes and parentheses are ignored.
pub fn is_br_phone(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    let digits = compact.strip_prefix("+55").unwrap_or(&compact);
    digits.chars().all(|c| c.is_ascii_digit()) && (10..=11).contains(&digits.len())
}

/// Stored form of a phone: national digits only, country code dropped.
pub fn normalize_phone(value: &str) -> String {
    let value = value.trim();
    let value = value.strip_prefix("+55").unwrap_or(value);
    value.chars().filter(char::is_ascii_digit).collect()
}

pub fn is_http_url(value: &str) -> bool {
    Url::parse(value).is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
}

/// `#rgb` or `#rrggbb`.
pub fn is_hex_color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(hex) => (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// HH:MM or HH:MM:SS, 24-hour clock.
pub fn is_time(value: &str) -> bool {
    NaiveTime::parse_from_str(value, "%H:%M").is_ok()
        || NaiveTime::parse_from_str(value, "%H:%M:%S").is_ok()
}

/// Positive money amount with at most two decimal places.
pub fn is_money(value: f64) -> bool {
    value.is_finite() && value > 0.0 && ((value * 100.0).round() - value * 100.0).abs() < 1e-6
}

/// Two-letter state code (UF).
pub fn is_uf(value: &str) -> bool {
    value.len() == 2 && value.chars().all(|c| c.is_ascii_alphabetic())
}
