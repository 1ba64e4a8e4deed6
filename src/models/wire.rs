//! Lenient decoders for backend payloads.
//!
//! The backend is not consistent about scalar encodings: ids arrive as numbers
//! or strings, read flags as booleans or 0/1, timestamps in several formats.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de;
use serde::{Deserialize, Deserializer};

/// Accept a non-negative integer or a stringified one.
pub fn string_or_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = u64;
        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("u64 or stringified u64")
        }
        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
            Ok(v)
        }
        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
            u64::try_from(v).map_err(E::custom)
        }
        fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
            v.trim().parse().map_err(E::custom)
        }
    }
    d.deserialize_any(Visitor)
}

/// Read flag: `true`/`false`, `1`/`0`, or null (unread).
pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
    }
    Ok(match Option::<Raw>::deserialize(d)? {
        Some(Raw::Bool(b)) => b,
        Some(Raw::Int(n)) => n != 0,
        None => false,
    })
}

/// Counter that may be missing or null.
pub fn count<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    Ok(Option::<u32>::deserialize(d)?.unwrap_or(0))
}

/// Optional timestamp; unparseable strings decode as `None` rather than
/// failing the whole payload.
pub fn timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw = Option::<String>::deserialize(d)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

/// Parse the timestamp formats the backend emits.
///
/// Naive date-times carry no offset and are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[derive(Deserialize)]
    struct Probe {
        #[serde(deserialize_with = "string_or_u64")]
        id: u64,
        #[serde(default, deserialize_with = "flag")]
        read: bool,
        #[serde(default, deserialize_with = "timestamp")]
        at: Option<DateTime<Utc>>,
    }

    #[test]
    fn test_id_number_or_string() {
        let a: Probe = serde_json::from_str(r#"{"id": 12}"#).unwrap();
        let b: Probe = serde_json::from_str(r#"{"id": "12"}"#).unwrap();
        assert_eq!(a.id, 12);
        assert_eq!(b.id, 12);
        assert!(serde_json::from_str::<Probe>(r#"{"id": -1}"#).is_err());
    }

    #[test]
    fn test_flag_variants() {
        let p: Probe = serde_json::from_str(r#"{"id":1,"read":1}"#).unwrap();
        assert!(p.read);
        let p: Probe = serde_json::from_str(r#"{"id":1,"read":0}"#).unwrap();
        assert!(!p.read);
        let p: Probe = serde_json::from_str(r#"{"id":1,"read":null}"#).unwrap();
        assert!(!p.read);
        let p: Probe = serde_json::from_str(r#"{"id":1}"#).unwrap();
        assert!(!p.read);
    }

    #[test]
    fn test_timestamp_formats() {
        let rfc3339 = parse_timestamp("2024-03-05T10:20:30Z").unwrap();
        let rfc2822 = parse_timestamp("Tue, 05 Mar 2024 10:20:30 GMT").unwrap();
        let naive = parse_timestamp("2024-03-05 10:20:30").unwrap();
        assert_eq!(rfc3339, rfc2822);
        assert_eq!(rfc3339, naive);
        assert_eq!(naive.day(), 5);
        assert_eq!(naive.hour(), 10);

        let offset = parse_timestamp("2024-03-05T12:20:30+02:00").unwrap();
        assert_eq!(offset, rfc3339);
    }

    #[test]
    fn test_bad_timestamp_is_none() {
        let p: Probe = serde_json::from_str(r#"{"id":1,"at":"yesterday-ish"}"#).unwrap();
        assert!(p.at.is_none());
        assert!(parse_timestamp("").is_none());
    }
}
