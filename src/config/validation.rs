//! Validation of configuration values.
use anyhow::{Context as _, Result, bail};
use serde_json::Value;

/// Minimum length for octal umask strings.
const OCTAL_MODE_MIN_LEN: usize = 1;

/// Maximum length for octal umask strings.
const OCTAL_MODE_MAX_LEN: usize = 4;

/// Return `true` if `s` matches `[A-Za-z_][A-Za-z0-9_]*`.
#[must_use]
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Check that every map key at every depth of `data` is an identifier, so
/// every value is reachable from a template.
///
/// # Errors
///
/// Returns an error naming the dotted path of the first offending key.
pub fn validate_data_keys(data: &Value) -> Result<()> {
    fn walk(value: &Value, prefix: &str) -> Result<()> {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    if !is_identifier(key) {
                        bail!("data.{path}: invalid identifier");
                    }
                    walk(child, &path)?;
                }
                Ok(())
            }
            Value::Array(items) => items
                .iter()
                .enumerate()
                .try_for_each(|(i, item)| walk(item, &format!("{prefix}[{i}]"))),
            _ => Ok(()),
        }
    }
    walk(data, "")
}

/// Parse an octal umask such as `022` or `0077`.
///
/// # Errors
///
/// Returns an error if the string is not 1 to 4 octal digits.
pub fn parse_umask(s: &str) -> Result<u32> {
    let s = s.trim();
    let digits = s.strip_prefix("0o").unwrap_or(s);
    if !(OCTAL_MODE_MIN_LEN..=OCTAL_MODE_MAX_LEN).contains(&digits.len()) {
        bail!("{s}: invalid umask");
    }
    let umask = u32::from_str_radix(digits, 8).with_context(|| format!("{s}: invalid umask"))?;
    if umask > 0o777 {
        bail!("{s}: invalid umask");
    }
    Ok(umask)
}
