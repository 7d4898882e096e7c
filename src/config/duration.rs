use std::time::Duration;

/// Parses a duration literal such as `30s`, `1m30s`, `250ms` or `2h`.
///
/// A literal is one or more `<integer><unit>` groups. Bare integers and
/// unknown units are rejected so that `"30"` is never silently read as
/// seconds or milliseconds.
pub fn parse_duration(literal: &str) -> Result<Duration, String> {
    let input = literal.trim();
    if input.is_empty() {
        return Err("duration literal is empty".to_string());
    }

    let mut total = Duration::ZERO;
    let mut rest = input;

    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("duration '{input}' is missing a unit (ms, s, m, h)"))?;
        if digits_end == 0 {
            return Err(format!("duration '{input}' has a unit without a number"));
        }

        let value: u64 = rest[..digits_end]
            .parse()
            .map_err(|e| format!("invalid number in duration '{input}': {e}"))?;
        rest = &rest[digits_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = &rest[..unit_end];
        rest = &rest[unit_end..];

        let part = match unit {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.saturating_mul(60)),
            "h" => Duration::from_secs(value.saturating_mul(3600)),
            other => {
                return Err(format!(
                    "unknown unit '{other}' in duration '{input}' (expected ms, s, m or h)"
                ))
            }
        };
        total = total.saturating_add(part);
    }

    Ok(total)
}
