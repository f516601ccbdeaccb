//! JSON helpers shared by the actors' transforms.
//!
//! Backends disagree on number encoding: the price API sends native numbers,
//! some feeds send numeric strings (`"30000.5"`), and missing data shows up
//! as `null`. These helpers accept both encodings, treat `null` as absent and
//! never hand out a non-finite value, so a `"NaN"` string reads as missing
//! data rather than as a price.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// A finite number, native or string-encoded.
#[inline]
pub fn number(v: Option<&Value>) -> Option<f64> {
    let x = match v? {
        Value::String(s) => fast_float2::parse::<f64, _>(s.trim()).ok()?,
        other => other.as_f64()?,
    };
    x.is_finite().then_some(x)
}

/// A non-negative whole number. Integral floats (`1709251200.0`) count.
pub fn whole_number(v: Option<&Value>) -> Option<u64> {
    match v? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64().or_else(|| {
            let x = n.as_f64()?;
            (x >= 0.0 && x.fract() == 0.0 && x < u64::MAX as f64).then_some(x as u64)
        }),
        _ => None,
    }
}

/// Named field on a JSON object, see [`number`].
#[inline]
pub fn number_field(v: &Value, key: &str) -> Option<f64> {
    number(v.get(key))
}

/// Parse a named field as a finite, strictly positive `f64`.
#[inline]
pub fn positive_f64_field(v: &Value, key: &str) -> Option<f64> {
    number_field(v, key).filter(|x| *x > 0.0)
}

/// Named string field.
#[inline]
pub fn str_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key)?.as_str()
}

/// Millisecond epoch timestamp (string or number).
pub fn timestamp_ms(v: Option<&Value>) -> Option<DateTime<Utc>> {
    let ms = number(v)?;
    Utc.timestamp_millis_opt(ms as i64).single()
}

/// Second epoch timestamp (string or number).
pub fn timestamp_secs(v: Option<&Value>) -> Option<DateTime<Utc>> {
    let secs = whole_number(v)?;
    Utc.timestamp_opt(secs as i64, 0).single()
}

/// RFC 3339 timestamp string (`"2024-03-01T12:00:00.000Z"`).
pub fn timestamp_rfc3339(v: Option<&Value>) -> Option<DateTime<Utc>> {
    let s = v?.as_str()?;
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn numbers_and_strings() {
        let v = json!({"a": "30000.5", "b": 12.25, "c": null, "d": "x"});
        assert_eq!(number_field(&v, "a"), Some(30000.5));
        assert_eq!(number_field(&v, "b"), Some(12.25));
        assert_eq!(number_field(&v, "c"), None);
        assert_eq!(number_field(&v, "d"), None);
        assert_eq!(number_field(&v, "missing"), None);
    }

    #[test]
    fn non_finite_strings_are_missing() {
        assert_eq!(number(Some(&json!("NaN"))), None);
        assert_eq!(number(Some(&json!("inf"))), None);
        assert_eq!(number(Some(&json!(" 42.5 "))), Some(42.5));
    }

    #[test]
    fn whole_numbers() {
        assert_eq!(whole_number(Some(&json!(1709251200))), Some(1709251200));
        assert_eq!(whole_number(Some(&json!(1709251200.0))), Some(1709251200));
        assert_eq!(whole_number(Some(&json!("13000"))), Some(13000));
        assert_eq!(whole_number(Some(&json!(1.5))), None);
        assert_eq!(whole_number(Some(&json!(-3))), None);
    }

    #[test]
    fn positive_only() {
        let v = json!({"zero": 0, "neg": -1.0, "ok": "2"});
        assert_eq!(positive_f64_field(&v, "zero"), None);
        assert_eq!(positive_f64_field(&v, "neg"), None);
        assert_eq!(positive_f64_field(&v, "ok"), Some(2.0));
    }

    #[test]
    fn timestamps() {
        let ms = timestamp_ms(Some(&json!(1_700_000_000_000u64))).unwrap();
        let secs = timestamp_secs(Some(&json!("1700000000"))).unwrap();
        assert_eq!(ms, secs);
        let iso = timestamp_rfc3339(Some(&json!("2023-11-14T22:13:20.000Z"))).unwrap();
        assert_eq!(iso, secs);
        assert!(timestamp_rfc3339(Some(&json!("yesterday"))).is_none());
    }
}
