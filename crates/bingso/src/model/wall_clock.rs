//! Local wall-clock timestamps as entered on the room form.
//!
//! Schedule times are stored without a zone at minute precision, in the
//! `YYYY-MM-DDTHH:MM` shape of an HTML `datetime-local` input. Parsing also
//! accepts seconds, a space separator and RFC 3339 values.

use chrono::{DateTime, NaiveDateTime};

/// Canonical rendering format.
pub const FORMAT: &str = "%Y-%m-%dT%H:%M";

const ACCEPTED: &[&str] = &["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"];

/// Parse a wall-clock timestamp. Blank input yields `None`.
#[must_use]
pub fn parse(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    ACCEPTED
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

/// Render a wall-clock timestamp in the canonical format.
#[must_use]
pub fn render(value: &NaiveDateTime) -> String {
    value.format(FORMAT).to_string()
}

/// Serde adapter for `Option<NaiveDateTime>` fields.
pub mod option {
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    /// Serialize as the canonical string or `null`.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    #[allow(clippy::ref_option)]
    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&super::render(dt)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize from a string, `null`, or an empty string.
    ///
    /// # Errors
    ///
    /// Fails when a non-empty string is not a recognised timestamp.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => super::parse(&s)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 10, 4)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_datetime_local() {
        assert_eq!(parse("2025-10-04T10:19"), Some(at(10, 19)));
        assert_eq!(parse("2025-10-04 10:19"), Some(at(10, 19)));
        assert_eq!(parse("2025-10-04T10:19:00"), Some(at(10, 19)));
    }

    #[test]
    fn test_parse_rfc3339_keeps_local_clock() {
        assert_eq!(parse("2025-10-04T10:19:00+09:00"), Some(at(10, 19)));
    }

    #[test]
    fn test_parse_blank_and_garbage() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("   "), None);
        assert_eq!(parse("tomorrow"), None);
    }

    #[test]
    fn test_render() {
        assert_eq!(render(&at(7, 0)), "2025-10-04T07:00");
    }

    #[derive(serde::Serialize, serde::Deserialize)]
    struct Holder {
        #[serde(default, with = "option")]
        when: Option<NaiveDateTime>,
    }

    #[test]
    fn test_serde_option() {
        let h: Holder = serde_json::from_str(r#"{"when":"2025-10-04T10:19"}"#).unwrap();
        assert_eq!(h.when, Some(at(10, 19)));

        let h: Holder = serde_json::from_str(r#"{"when":""}"#).unwrap();
        assert_eq!(h.when, None);

        let h: Holder = serde_json::from_str("{}").unwrap();
        assert_eq!(h.when, None);

        assert!(serde_json::from_str::<Holder>(r#"{"when":"soon"}"#).is_err());

        let json = serde_json::to_string(&Holder { when: Some(at(7, 5)) }).unwrap();
        assert_eq!(json, r#"{"when":"2025-10-04T07:05"}"#);
    }
}
