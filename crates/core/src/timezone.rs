// SPDX-License-Identifier: MIT

//! Default timezone configuration knob.
//!
//! Earlier revisions of this kind of system hardcode a single operator
//! timezone (e.g. `America/Vancouver`) as a constant. Here it's a
//! configuration value with a documented default, read once at daemon
//! startup and threaded through to call sites that need a timezone and
//! weren't given one explicitly (new `Source`/`Schedule` rows created
//! without `default_timezone`/`timezone` set).

/// Fallback IANA timezone name used when a caller doesn't supply one.
pub const DEFAULT_TIMEZONE: &str = "America/Vancouver";

/// Parse an IANA timezone name, falling back to [`DEFAULT_TIMEZONE`] on an
/// empty string. Returns an error for a non-empty but unrecognized name
/// rather than silently falling back, since that's much more likely to be a
/// typo than an intentional omission.
pub fn parse_or_default(name: &str) -> Result<chrono_tz::Tz, chrono_tz::ParseError> {
    if name.is_empty() {
        name_to_tz(DEFAULT_TIMEZONE)
    } else {
        name_to_tz(name)
    }
}

fn name_to_tz(name: &str) -> Result<chrono_tz::Tz, chrono_tz::ParseError> {
    name.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_name_falls_back_to_default() {
        let tz = parse_or_default("").expect("default timezone must parse");
        assert_eq!(tz, chrono_tz::America::Vancouver);
    }

    #[test]
    fn unrecognized_name_is_an_error() {
        assert!(parse_or_default("Not/ARealZone").is_err());
    }
}
