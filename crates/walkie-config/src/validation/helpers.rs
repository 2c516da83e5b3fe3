//! Checks shared by the section validators. Each pushes a message naming
//! the offending key instead of failing fast.

use std::fmt::Display;

pub(crate) fn check_range<T>(errors: &mut Vec<String>, key: &str, value: T, min: T, max: T)
where
    T: PartialOrd + Display,
{
    if value < min || value > max {
        errors.push(format!("{key} = {value} is out of range [{min}, {max}]"));
    }
}

/// The relay is only reachable over WebSocket.
pub(crate) fn check_ws_url(errors: &mut Vec<String>, key: &str, url: &str) {
    let rest = url
        .strip_prefix("wss://")
        .or_else(|| url.strip_prefix("ws://"));
    match rest {
        Some(host) if !host.is_empty() => {}
        _ => errors.push(format!("{key} = {url:?} must be a ws:// or wss:// URL")),
    }
}

/// `ceiling` bounds a value that grows from `floor`.
pub(crate) fn check_not_below(
    errors: &mut Vec<String>,
    (ceiling_key, ceiling): (&str, u64),
    (floor_key, floor): (&str, u64),
) {
    if ceiling < floor {
        errors.push(format!(
            "{ceiling_key} = {ceiling} is below {floor_key} = {floor}"
        ));
    }
}
