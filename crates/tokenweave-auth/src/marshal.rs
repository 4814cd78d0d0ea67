//! Principal marshaling strategies
//!
//! A principal travels inside a token as a single claim value. How it becomes that
//! value is independent of how the token is signed:
//!
//! | Strategy | Claim shape | Principal |
//! |----------|-------------|-----------|
//! | [`IdentityMarshaller`] | string | already a `String` |
//! | [`MapMarshaller`] | JSON object | any serde type that maps to an object |
//! | [`PackedMarshaller`] | base64 string | any serde type, packed by a [`Codec`] |
//!
//! Packed bytes are base64-armored because claim values must be text-safe.

use std::marker::PhantomData;
use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::MarshalError;
use crate::wire::{Codec, MsgPackCodec};

/// Converts a principal to and from its claim value
pub trait PrincipalMarshaller<P>: Send + Sync {
    /// Principal to claim value
    ///
    /// # Errors
    ///
    /// Returns a [`MarshalError`] if the principal cannot be represented.
    fn marshal(&self, principal: &P) -> Result<Value, MarshalError>;

    /// Claim value to principal
    ///
    /// # Errors
    ///
    /// Returns a [`MarshalError`] if the claim has the wrong shape or content.
    fn unmarshal(&self, claim: Value) -> Result<P, MarshalError>;

    /// Strategy name for logging
    fn name(&self) -> &'static str;
}

/// Principal is already the wire string
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMarshaller;

impl PrincipalMarshaller<String> for IdentityMarshaller {
    fn marshal(&self, principal: &String) -> Result<Value, MarshalError> {
        Ok(Value::String(principal.clone()))
    }

    fn unmarshal(&self, claim: Value) -> Result<String, MarshalError> {
        match claim {
            Value::String(s) => Ok(s),
            other => Err(unexpected("string", &other)),
        }
    }

    fn name(&self) -> &'static str {
        "identity"
    }
}

/// Principal is mapped to a string-keyed object
pub struct MapMarshaller<P> {
    _principal: PhantomData<fn() -> P>,
}

impl<P> MapMarshaller<P> {
    /// Create a map marshaller
    pub fn new() -> Self {
        Self {
            _principal: PhantomData,
        }
    }
}

impl<P> Default for MapMarshaller<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> std::fmt::Debug for MapMarshaller<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MapMarshaller")
    }
}

impl<P> PrincipalMarshaller<P> for MapMarshaller<P>
where
    P: Serialize + DeserializeOwned,
{
    fn marshal(&self, principal: &P) -> Result<Value, MarshalError> {
        match serde_json::to_value(principal)? {
            map @ Value::Object(_) => Ok(map),
            other => Err(unexpected("object", &other)),
        }
    }

    fn unmarshal(&self, claim: Value) -> Result<P, MarshalError> {
        match claim {
            map @ Value::Object(_) => Ok(serde_json::from_value(map)?),
            other => Err(unexpected("object", &other)),
        }
    }

    fn name(&self) -> &'static str {
        "map"
    }
}

/// Principal is packed to bytes, then base64-armored
pub struct PackedMarshaller<P, C = MsgPackCodec> {
    codec: C,
    _principal: PhantomData<fn() -> P>,
}

impl<P> PackedMarshaller<P, MsgPackCodec> {
    /// Create a packed marshaller using MessagePack
    pub fn new() -> Self {
        Self::with_codec(MsgPackCodec::new())
    }
}

impl<P> Default for PackedMarshaller<P, MsgPackCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, C> PackedMarshaller<P, C> {
    /// Create a packed marshaller using a custom codec
    pub fn with_codec(codec: C) -> Self {
        Self {
            codec,
            _principal: PhantomData,
        }
    }
}

impl<P, C: std::fmt::Debug> std::fmt::Debug for PackedMarshaller<P, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackedMarshaller")
            .field("codec", &self.codec)
            .finish()
    }
}

impl<P, C> PrincipalMarshaller<P> for PackedMarshaller<P, C>
where
    P: Serialize + DeserializeOwned,
    C: Codec,
{
    fn marshal(&self, principal: &P) -> Result<Value, MarshalError> {
        let bytes = self.codec.encode(principal)?;
        Ok(Value::String(STANDARD.encode(bytes)))
    }

    fn unmarshal(&self, claim: Value) -> Result<P, MarshalError> {
        let armored = match claim {
            Value::String(s) => s,
            other => return Err(unexpected("string", &other)),
        };
        let bytes = STANDARD.decode(armored)?;
        Ok(self.codec.decode(&bytes)?)
    }

    fn name(&self) -> &'static str {
        "packed"
    }
}

/// Marshaling strategy selectable from settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalEncoding {
    /// [`MapMarshaller`]
    #[default]
    Map,
    /// [`PackedMarshaller`] over MessagePack
    Packed,
}

impl PrincipalEncoding {
    /// Build the marshaller for a structured principal type
    pub fn marshaller<P>(self) -> Arc<dyn PrincipalMarshaller<P>>
    where
        P: Serialize + DeserializeOwned + 'static,
    {
        match self {
            Self::Map => Arc::new(MapMarshaller::<P>::new()),
            Self::Packed => Arc::new(PackedMarshaller::<P>::new()),
        }
    }
}

fn unexpected(expected: &'static str, found: &Value) -> MarshalError {
    let found = match found {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    MarshalError::UnexpectedShape { expected, found }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::UserPrincipal;
    use crate::wire::JsonCodec;
    use serde_json::json;

    #[test]
    fn test_identity_round_trip() {
        let m = IdentityMarshaller;
        let claim = m.marshal(&"alice".to_string()).unwrap();
        assert_eq!(claim, json!("alice"));
        assert_eq!(m.unmarshal(claim).unwrap(), "alice");
    }

    #[test]
    fn test_identity_rejects_objects() {
        let err = IdentityMarshaller.unmarshal(json!({"a": 1})).unwrap_err();
        assert!(matches!(
            err,
            MarshalError::UnexpectedShape {
                expected: "string",
                found: "object"
            }
        ));
    }

    #[test]
    fn test_map_produces_object_claim() {
        let m = MapMarshaller::<UserPrincipal>::new();
        let alice = UserPrincipal::new("alice", ["ADMIN"]);
        let claim = m.marshal(&alice).unwrap();
        assert_eq!(claim, json!({"username": "alice", "roles": ["ADMIN"]}));
        assert_eq!(m.unmarshal(claim).unwrap(), alice);
    }

    #[test]
    fn test_map_rejects_non_object_principal() {
        let m = MapMarshaller::<u64>::new();
        assert!(m.marshal(&42).is_err());
    }

    #[test]
    fn test_packed_claim_is_text_safe() {
        let m = PackedMarshaller::<UserPrincipal>::new();
        let alice = UserPrincipal::new("alice", ["ADMIN", "USER"]);
        let claim = m.marshal(&alice).unwrap();
        let text = claim.as_str().unwrap();
        assert!(text.chars().all(|c| c.is_ascii_alphanumeric() || "+/=".contains(c)));
        assert_eq!(m.unmarshal(claim).unwrap(), alice);
    }

    #[test]
    fn test_packed_with_json_codec() {
        let m = PackedMarshaller::<UserPrincipal, _>::with_codec(JsonCodec::new());
        let bob = UserPrincipal::new("bob", Vec::<String>::new());
        let claim = m.marshal(&bob).unwrap();
        let raw = STANDARD.decode(claim.as_str().unwrap()).unwrap();
        assert_eq!(raw, br#"{"username":"bob","roles":[]}"#);
        assert_eq!(m.unmarshal(claim).unwrap(), bob);
    }

    #[test]
    fn test_packed_rejects_bad_armor() {
        let m = PackedMarshaller::<UserPrincipal>::new();
        assert!(matches!(
            m.unmarshal(json!("not base64!")),
            Err(MarshalError::Armor(_))
        ));
    }

    #[test]
    fn test_encoding_selects_strategy() {
        assert_eq!(
            PrincipalEncoding::Map.marshaller::<UserPrincipal>().name(),
            "map"
        );
        assert_eq!(
            PrincipalEncoding::Packed.marshaller::<UserPrincipal>().name(),
            "packed"
        );
    }
}
