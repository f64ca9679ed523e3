// Copyright (c) 2018 Jason White
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

use std::fmt;

use generic_array::{typenum, GenericArray};
use hex::{FromHex, FromHexError};
use serde::{
    de::{self, Deserializer, Visitor},
    Deserialize, Serialize, Serializer,
};
use sha2::{self, Digest};

/// Wrapper around a SHA256 value. Used as the content fingerprint of source
/// files and to derive stable cache file names.
///
/// This can be serialized and deserialized as hex.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct Sha256 {
    inner: GenericArray<u8, typenum::U32>,
}

impl Sha256 {
    pub fn from_bytes(bytes: &[u8]) -> Sha256 {
        Sha256 {
            inner: sha2::Sha256::digest(bytes),
        }
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.inner.as_slice())
    }
}

impl fmt::Display for Sha256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Sha256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Sha256 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            // Serialize as a byte array with known length.
            serializer.serialize_bytes(self.inner.as_ref())
        }
    }
}

impl<'de> Deserialize<'de> for Sha256 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct HexVisitor;

        impl<'de> Visitor<'de> for HexVisitor {
            type Value = Sha256;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "hex string or bytes")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                let v = <[u8; 32]>::from_hex(v).map_err(|e| match e {
                    FromHexError::InvalidHexCharacter { c, .. } => {
                        E::invalid_value(
                            de::Unexpected::Char(c),
                            &"string with only hexadecimal characters",
                        )
                    }
                    FromHexError::InvalidStringLength => E::invalid_length(
                        v.len(),
                        &"hex string with a valid length",
                    ),
                    FromHexError::OddLength => E::invalid_length(
                        v.len(),
                        &"hex string with an even length",
                    ),
                })?;

                Ok(Sha256 {
                    inner: GenericArray::from(v),
                })
            }

            fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                if v.len() != 32 {
                    return Err(E::invalid_length(v.len(), &"32 bytes"));
                }

                Ok(Sha256 {
                    inner: GenericArray::clone_from_slice(v),
                })
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_str(HexVisitor)
        } else {
            deserializer.deserialize_bytes(HexVisitor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_only_for_equal_bytes() {
        let data = b"CREATE PROCEDURE dbo.Foo AS SELECT 1";
        assert_eq!(Sha256::from_bytes(data), Sha256::from_bytes(data));
        assert_ne!(Sha256::from_bytes(b"a"), Sha256::from_bytes(b"b"));
    }

    #[test]
    fn binary_serialization() -> Result<(), bincode::Error> {
        let sha = Sha256::from_bytes(b"abc");
        let bytes = bincode::serialize(&sha)?;
        assert_eq!(bincode::deserialize::<Sha256>(&bytes)?, sha);
        Ok(())
    }

    #[test]
    fn hex_serialization() -> Result<(), serde_json::Error> {
        let sha = Sha256::from_bytes(b"");
        let json = serde_json::to_string(&sha)?;
        assert_eq!(
            json,
            "\"e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855\""
        );
        assert_eq!(serde_json::from_str::<Sha256>(&json)?, sha);
        assert!(serde_json::from_str::<Sha256>("\"abc\"").is_err());
        Ok(())
    }
}
