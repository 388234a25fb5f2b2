//! Lenient serde helpers for backend payloads.
//!
//! The tracking backend is not consistent about numeric fields: coordinates
//! and ids arrive either as JSON numbers or as numeric strings.

use serde::de::{self, Deserializer, Unexpected, Visitor};
use std::fmt;

struct F64Visitor;

impl<'de> Visitor<'de> for F64Visitor {
    type Value = f64;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number or a numeric string")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
        Ok(v as f64)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
        Ok(v as f64)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
        v.trim()
            .parse::<f64>()
            .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
    }
}

/// Deserializes an `f64` from a number or a numeric string.
pub fn f64_lenient<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(F64Visitor)
}

/// Like [`f64_lenient`] but maps `null`, a missing value and `""` to `None`.
pub fn f64_lenient_option<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OptVisitor;

    impl<'de> Visitor<'de> for OptVisitor {
        type Value = Option<f64>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an optional number or numeric string")
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            d.deserialize_any(self)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v as f64))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v as f64))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            if v.trim().is_empty() {
                return Ok(None);
            }
            F64Visitor.visit_str(v).map(Some)
        }
    }

    deserializer.deserialize_option(OptVisitor)
}

/// Deserializes an `i64` from a number or a numeric string.
pub fn i64_lenient<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    struct I64Visitor;

    impl<'de> Visitor<'de> for I64Visitor {
        type Value = i64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an integer or an integer string")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
            i64::try_from(v).map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
            v.trim()
                .parse::<i64>()
                .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
        }
    }

    deserializer.deserialize_any(I64Visitor)
}

/// Deserializes a boolean that may be encoded as `true`/`false`, `0`/`1`
/// or `"true"`/`"false"`. `null` reads as `false`.
pub fn bool_lenient<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    struct BoolVisitor;

    impl<'de> Visitor<'de> for BoolVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a boolean, 0/1 or a boolean string")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<bool, E> {
            Ok(v != 0)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<bool, E> {
            Ok(v != 0)
        }

        fn visit_unit<E: de::Error>(self) -> Result<bool, E> {
            Ok(false)
        }

        fn visit_none<E: de::Error>(self) -> Result<bool, E> {
            Ok(false)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<bool, E> {
            match v.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" | "" => Ok(false),
                _ => Err(E::invalid_value(Unexpected::Str(v), &self)),
            }
        }
    }

    deserializer.deserialize_any(BoolVisitor)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(deserialize_with = "super::f64_lenient")]
        lat: f64,
        #[serde(default, deserialize_with = "super::f64_lenient_option")]
        radius: Option<f64>,
        #[serde(deserialize_with = "super::i64_lenient")]
        id: i64,
        #[serde(default, deserialize_with = "super::bool_lenient")]
        flag: bool,
    }

    #[test]
    fn test_numbers_and_strings() {
        let a: Sample =
            serde_json::from_str(r#"{"lat": 24.5, "radius": 100, "id": 7, "flag": true}"#).unwrap();
        let b: Sample =
            serde_json::from_str(r#"{"lat": "24.5", "radius": "100", "id": "7", "flag": "true"}"#)
                .unwrap();
        assert_eq!(a.lat, b.lat);
        assert_eq!(a.radius, b.radius);
        assert_eq!(a.id, b.id);
        assert!(a.flag && b.flag);
    }

    #[test]
    fn test_optional_and_defaults() {
        let s: Sample = serde_json::from_str(r#"{"lat": 1, "radius": null, "id": 2}"#).unwrap();
        assert_eq!(s.radius, None);
        assert!(!s.flag);

        let s: Sample = serde_json::from_str(r#"{"lat": 1, "radius": "", "id": 2, "flag": 0}"#)
            .unwrap();
        assert_eq!(s.radius, None);
        assert!(!s.flag);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(serde_json::from_str::<Sample>(r#"{"lat": "north", "id": 1}"#).is_err());
        assert!(serde_json::from_str::<Sample>(r#"{"lat": 1, "id": "x"}"#).is_err());
        assert!(serde_json::from_str::<Sample>(r#"{"lat": 1, "id": 1, "flag": "maybe"}"#).is_err());
    }
}
