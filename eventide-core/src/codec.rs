//! Pluggable encoding strategies.
//!
//! The core never inspects encoded bytes. Stores and the snapshot handler
//! hand values to a [`Codec`] and keep whatever bytes it returns.

use serde::{Serialize, de::DeserializeOwned};

/// Encode and decode serde values to bytes.
pub trait Codec: Clone + Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Encode a value.
    ///
    /// # Errors
    ///
    /// Returns the codec's error if the value cannot be represented.
    fn serialize<T>(&self, value: &T) -> Result<Vec<u8>, Self::Error>
    where
        T: Serialize + ?Sized;

    /// Decode a value previously produced by [`Codec::serialize`].
    ///
    /// # Errors
    ///
    /// Returns the codec's error if the bytes do not describe a `T`.
    fn deserialize<T>(&self, data: &[u8]) -> Result<T, Self::Error>
    where
        T: DeserializeOwned;
}

/// JSON codec backed by `serde_json`.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    type Error = serde_json::Error;

    fn serialize<T>(&self, value: &T) -> Result<Vec<u8>, Self::Error>
    where
        T: Serialize + ?Sized,
    {
        serde_json::to_vec(value)
    }

    fn deserialize<T>(&self, data: &[u8]) -> Result<T, Self::Error>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(data)
    }
}

#[cfg(feature = "msgpack")]
pub use self::msgpack::{MessagePackCodec, MessagePackError};

#[cfg(feature = "msgpack")]
mod msgpack {
    use serde::{Serialize, de::DeserializeOwned};

    use super::Codec;

    /// Compact binary codec backed by `rmp-serde`.
    ///
    /// Structs are written as maps so payloads stay readable by code that
    /// adds or reorders fields.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct MessagePackCodec;

    #[derive(Debug, thiserror::Error)]
    pub enum MessagePackError {
        #[error("messagepack encode error: {0}")]
        Encode(#[from] rmp_serde::encode::Error),
        #[error("messagepack decode error: {0}")]
        Decode(#[from] rmp_serde::decode::Error),
    }

    impl Codec for MessagePackCodec {
        type Error = MessagePackError;

        fn serialize<T>(&self, value: &T) -> Result<Vec<u8>, Self::Error>
        where
            T: Serialize + ?Sized,
        {
            Ok(rmp_serde::to_vec_named(value)?)
        }

        fn deserialize<T>(&self, data: &[u8]) -> Result<T, Self::Error>
        where
            T: DeserializeOwned,
        {
            Ok(rmp_serde::from_slice(data)?)
        }
    }
}
