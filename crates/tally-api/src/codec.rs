//! Codec trait and implementations for persisted records.
//!
//! The session store persists one credential record between runs. It
//! doesn't care HOW that record becomes bytes, it just needs something
//! that implements [`Codec`]. Swapping the format later means writing a
//! new codec, not touching the store.

use serde::{Serialize, de::DeserializeOwned};

use crate::CodecError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because the codec lives inside the session
/// store, which is shared across tasks for the whole application run.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `CodecError::Encode` if the value can't be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `CodecError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, CodecError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Human-readable, so a stored credential file can be inspected by hand
/// while debugging. Behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use tally_api::{Codec, JsonCodec, PrincipalId};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&PrincipalId(7)).unwrap();
/// let decoded: PrincipalId = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, PrincipalId(7));
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(CodecError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(data).map_err(CodecError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Principal, PrincipalId};

    #[test]
    fn test_decode_garbage_returns_decode_error() {
        let result: Result<Principal, _> = JsonCodec.decode(b"{not json");
        assert!(matches!(result, Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_decode_missing_field_returns_decode_error() {
        // `id` is required on a principal.
        let result: Result<Principal, _> =
            JsonCodec.decode(br#"{"email":"a@b.c"}"#);
        assert!(matches!(result, Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_encode_principal_id_is_bare_number() {
        let bytes = JsonCodec.encode(&PrincipalId(42)).unwrap();
        assert_eq!(bytes, b"42");
    }
}
