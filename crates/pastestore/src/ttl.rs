//! Time-to-live: duration parsing, the TTL catalog, and fallback resolution.
//!
//! Durations use the `48h` / `1h30m` / `1.5h` grammar existing deployments
//! submit from their TTL selectors and put in `DEFAULT_TTL`/`CLEANUP_INTERVAL`.

use std::time::Duration;
use thiserror::Error;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Used when both the requested and the configured TTL are unusable.
pub const FALLBACK_TTL: Duration = DAY;

/// A paste that "never" expires (100 years).
pub const FOREVER: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Longest duration accepted, in nanoseconds (about 292 years).
const MAX_NANOS: u128 = i64::MAX as u128;

/// Errors from [`parse_duration`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,

    #[error("invalid duration {0:?}")]
    Invalid(String),

    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),

    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },

    #[error("duration {0:?} is negative")]
    Negative(String),

    #[error("duration {0:?} overflows")]
    Overflow(String),
}

fn unit_nanos(unit: &str) -> Option<u128> {
    Some(match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        "h" => 60 * 60 * 1_000_000_000,
        _ => return None,
    })
}

/// Parse a duration like `48h`, `1h30m`, `1.5h`, `300ms` or `0`.
///
/// Negative inputs (`-1h`) are rejected with [`DurationError::Negative`] so
/// callers can treat them the same as any other non-positive TTL. Anything
/// past `i64::MAX` nanoseconds is [`DurationError::Overflow`], which keeps
/// every accepted TTL representable as an expiry timestamp.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let mut s = input.trim();
    if s.is_empty() {
        return Err(DurationError::Empty);
    }

    let mut negative = false;
    if let Some(rest) = s.strip_prefix('-') {
        negative = true;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }

    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err(DurationError::Invalid(input.to_string()));
    }

    let mut total: u128 = 0;
    while !s.is_empty() {
        let num_end = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(s.len());
        let (number, rest) = s.split_at(num_end);
        if number.is_empty() || number == "." {
            return Err(DurationError::Invalid(input.to_string()));
        }

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let (unit, rest) = rest.split_at(unit_end);
        if unit.is_empty() {
            return Err(DurationError::MissingUnit(input.to_string()));
        }
        let scale = unit_nanos(unit).ok_or_else(|| DurationError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;

        let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
        if frac.contains('.') {
            return Err(DurationError::Invalid(input.to_string()));
        }
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| DurationError::Overflow(input.to_string()))?
        };

        let mut nanos = whole
            .checked_mul(scale)
            .ok_or_else(|| DurationError::Overflow(input.to_string()))?;

        // Fractional part, truncated to nanosecond precision.
        let mut place = scale;
        for digit in frac.bytes() {
            place /= 10;
            if place == 0 {
                break;
            }
            nanos += u128::from(digit - b'0') * place;
        }

        total = total
            .checked_add(nanos)
            .ok_or_else(|| DurationError::Overflow(input.to_string()))?;
        s = rest;
    }

    if negative && total > 0 {
        return Err(DurationError::Negative(input.to_string()));
    }

    if total > MAX_NANOS {
        return Err(DurationError::Overflow(input.to_string()));
    }

    let secs = u64::try_from(total / 1_000_000_000)
        .map_err(|_| DurationError::Overflow(input.to_string()))?;
    Ok(Duration::new(secs, (total % 1_000_000_000) as u32))
}

/// Render a duration in the same grammar, e.g. `24h0m0s` or `1.5s`.
pub fn format_duration(d: Duration) -> String {
    if d.is_zero() {
        return "0s".to_string();
    }
    if d < Duration::from_secs(1) {
        let nanos = d.subsec_nanos();
        return if nanos % 1_000_000 == 0 {
            format!("{}ms", nanos / 1_000_000)
        } else if nanos % 1_000 == 0 {
            format!("{}µs", nanos / 1_000)
        } else {
            format!("{nanos}ns")
        };
    }

    let total = d.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    let frac = d.subsec_nanos();

    let secs = if frac == 0 {
        format!("{secs}s")
    } else {
        let digits = format!("{frac:09}");
        format!("{secs}.{}s", digits.trim_end_matches('0'))
    };

    if hours > 0 {
        format!("{hours}h{minutes}m{secs}")
    } else if minutes > 0 {
        format!("{minutes}m{secs}")
    } else {
        secs
    }
}

/// Pick the effective TTL for a new paste.
///
/// The requested value wins when it parses to a positive duration; otherwise the
/// configured default applies, and [`FALLBACK_TTL`] covers a non-positive default.
pub fn resolve_ttl(requested: Option<&str>, default_ttl: Duration) -> Duration {
    match requested.map(parse_duration) {
        Some(Ok(ttl)) if !ttl.is_zero() => ttl,
        _ => effective_default(default_ttl),
    }
}

/// The configured default, or [`FALLBACK_TTL`] when it is zero.
pub fn effective_default(default_ttl: Duration) -> Duration {
    if default_ttl.is_zero() {
        FALLBACK_TTL
    } else {
        default_ttl
    }
}

/// One entry of the TTL selector catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlOption {
    pub label: &'static str,
    pub duration: Duration,
    pub is_default: bool,
}

impl TtlOption {
    /// The form value to submit for this option.
    pub fn value(&self) -> String {
        format_duration(self.duration)
    }
}

/// The TTL catalog with the entry matching `default_ttl` flagged.
pub fn ttl_options(default_ttl: Duration) -> Vec<TtlOption> {
    [
        ("1 day", DAY),
        ("1 week", 7 * DAY),
        ("1 month", 30 * DAY),
        ("1 year", 365 * DAY),
        ("Forever", FOREVER),
    ]
    .into_iter()
    .map(|(label, duration)| TtlOption {
        label,
        duration,
        is_default: duration == default_ttl,
    })
    .collect()
}
