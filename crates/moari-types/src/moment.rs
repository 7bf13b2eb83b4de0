use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Naive layouts SQLite and hand-written rows use. Interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
];

/// A normalized instant in epoch milliseconds.
///
/// Stored timestamps can be missing or malformed. Those normalize to
/// `Unknown`, which orders before every known instant (so it sorts last in a
/// newest-first list) without being confused with the epoch itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Moment {
    #[default]
    Unknown,
    At(i64),
}

impl Moment {
    pub fn now() -> Self {
        Self::At(Utc::now().timestamp_millis())
    }

    /// Parse a textual timestamp: RFC 3339, the SQLite `datetime()` layout,
    /// or a bare integer of epoch milliseconds.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(Self::At(dt.timestamp_millis()));
        }

        for fmt in NAIVE_FORMATS {
            if let Ok(ndt) = NaiveDateTime::parse_from_str(raw, fmt) {
                return Some(Self::At(ndt.and_utc().timestamp_millis()));
            }
        }

        raw.parse::<i64>().ok().map(Self::At)
    }

    pub fn millis(&self) -> Option<i64> {
        match self {
            Self::At(ms) => Some(*ms),
            Self::Unknown => None,
        }
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        self.millis().and_then(DateTime::from_timestamp_millis)
    }

    /// Canonical storage form: RFC 3339 with millisecond precision.
    pub fn to_rfc3339(&self) -> Option<String> {
        self.to_datetime()
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

impl Serialize for Moment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.to_rfc3339() {
            Some(s) => serializer.serialize_str(&s),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Moment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(match raw {
            Some(serde_json::Value::Number(n)) => n.as_i64().map(Self::At).unwrap_or_default(),
            Some(serde_json::Value::String(s)) => Self::parse(&s).unwrap_or_default(),
            _ => Self::Unknown,
        })
    }
}

/// Serialize a `Moment` as epoch milliseconds (or `null`), for fields the
/// client compares numerically.
pub fn as_millis<S: Serializer>(moment: &Moment, serializer: S) -> Result<S::Ok, S::Error> {
    match moment.millis() {
        Some(ms) => serializer.serialize_i64(ms),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_layouts() {
        let expected = Moment::At(1_700_000_000_000);
        assert_eq!(Moment::parse("2023-11-14T22:13:20Z"), Some(expected));
        assert_eq!(Moment::parse("2023-11-14T22:13:20.000+00:00"), Some(expected));
        assert_eq!(Moment::parse("2023-11-14 22:13:20"), Some(expected));
        assert_eq!(Moment::parse("2023-11-14 22:13:20.000"), Some(expected));
        assert_eq!(Moment::parse("1700000000000"), Some(expected));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(Moment::parse(""), None);
        assert_eq!(Moment::parse("   "), None);
        assert_eq!(Moment::parse("yesterday"), None);
    }

    #[test]
    fn unknown_orders_before_any_instant() {
        assert!(Moment::Unknown < Moment::At(0));
        assert!(Moment::Unknown < Moment::At(-1));
        assert!(Moment::At(1) < Moment::At(2));
    }

    #[test]
    fn serializes_as_rfc3339_or_null() {
        let json = serde_json::to_value(Moment::At(1_700_000_000_123)).unwrap();
        assert_eq!(json, serde_json::json!("2023-11-14T22:13:20.123Z"));

        let json = serde_json::to_value(Moment::Unknown).unwrap();
        assert!(json.is_null());
    }

    #[test]
    fn deserializes_loosely() {
        let m: Moment = serde_json::from_str("1700000000000").unwrap();
        assert_eq!(m, Moment::At(1_700_000_000_000));
        let m: Moment = serde_json::from_str("\"not a date\"").unwrap();
        assert_eq!(m, Moment::Unknown);
        let m: Moment = serde_json::from_str("null").unwrap();
        assert_eq!(m, Moment::Unknown);
    }
}
