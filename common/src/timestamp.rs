// Millisecond-precision RFC 3339 timestamps
// History files and entry ids use the `2024-03-31T23:59:00.000Z` form.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

/// Render with exactly three fractional digits and a `Z` suffix
pub fn format_millis(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Drop sub-millisecond precision so the stored form round-trips exactly
pub fn truncate_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(3)
}

/// Serde adapter: `#[serde(with = "common::timestamp::millis")]`
pub mod millis {
    use super::format_millis;
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_millis(ts))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(de::Error::custom)
    }
}
