// src/codec.rs - JSON in, JSON out

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{CacheError, CacheResult};

pub fn encode<T: Serialize + ?Sized>(payload: &T) -> CacheResult<String> {
    Ok(serde_json::to_string(payload)?)
}

/// Decodes a stored value. Any failure is reported as corruption of `key`.
pub fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> CacheResult<T> {
    serde_json::from_str(raw).map_err(|e| CacheError::corruption(key, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Sample {
        user_id: String,
        credits: i64,
    }

    #[test]
    fn test_encode_uses_camel_case() {
        let raw = encode(&Sample { user_id: "u1".into(), credits: 5 }).unwrap();
        assert_eq!(raw, r#"{"userId":"u1","credits":5}"#);
    }

    #[test]
    fn test_decode_truncated_value_is_corruption() {
        let err = decode::<Sample>("user:session:u1", r#"{"userId":"u1","cre"#).unwrap_err();
        match err {
            CacheError::Corruption { key, .. } => assert_eq!(key, "user:session:u1"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_wrong_shape_is_corruption() {
        let err = decode::<Sample>("k", r#"["not","an","object"]"#).unwrap_err();
        assert!(matches!(err, CacheError::Corruption { .. }));
    }
}
