use std::str::FromStr;

/// Parse a value from an optional string. `Ok(None)` means the value was absent; an `Err` carries the parse failure
/// message so that the caller can decide how loudly to complain before falling back to a default.
pub fn parse_optional<T>(value: Option<String>) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(None),
        Some(s) => s.trim().parse::<T>().map(Some).map_err(|e| format!("'{s}' is not valid. {e}")),
    }
}
