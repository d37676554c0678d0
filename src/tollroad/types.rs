//! Identity, commitment and amount types shared by the toll road ledger
//!
//! Addresses and hashes render as `0x`-prefixed lowercase hex and serialize
//! as strings, so snapshots and stored events stay readable JSON.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Amount in the smallest settlement unit
pub type Amount = u64;

/// Vehicle classification code assigned by the regulator
pub type VehicleType = u32;

fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn decode_hex<const N: usize>(s: &str) -> Result<[u8; N], String> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    let mut out = [0u8; N];
    hex::decode_to_slice(digits, &mut out)
        .map_err(|e| format!("invalid {}-byte hex value {}: {}", N, s, e))?;
    Ok(out)
}

macro_rules! hex_newtype {
    ($name:ident, $len:expr) => {
        impl $name {
            pub const ZERO: Self = Self([0u8; $len]);

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }

            /// Value with every byte set to `byte`, handy for fixtures
            pub fn repeat_byte(byte: u8) -> Self {
                Self([byte; $len])
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&encode_hex(&self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_hex::<$len>(s).map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(D::Error::custom)
            }
        }
    };
}

/// Authenticated identity of a caller: regulator, operator owner, booth or vehicle
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

hex_newtype!(Address, 20);

/// Secret chosen by a vehicle at entry and revealed by the exit booth
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Secret(pub [u8; 32]);

hex_newtype!(Secret, 32);

/// One-time commitment to a [`Secret`], the key of a trip
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SecretHash(pub [u8; 32]);

hex_newtype!(SecretHash, 32);

impl Secret {
    /// Commitment a vehicle presents at entry for this secret
    pub fn hash(&self) -> SecretHash {
        hash_secret(self)
    }
}

/// SHA-256 over the raw secret bytes
pub fn hash_secret(secret: &Secret) -> SecretHash {
    let digest = Sha256::digest(secret.0);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    SecretHash(out)
}

/// Directed pair of booths a route price and a pending queue are keyed by
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey {
    pub entry: Address,
    pub exit: Address,
}

impl RouteKey {
    pub fn new(entry: Address, exit: Address) -> Self {
        Self { entry, exit }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.entry, self.exit)
    }
}

impl fmt::Debug for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RouteKey({})", self)
    }
}

impl FromStr for RouteKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (entry, exit) = s
            .split_once("->")
            .ok_or_else(|| format!("route key {} is missing '->'", s))?;
        Ok(Self {
            entry: entry.parse()?,
            exit: exit.parse()?,
        })
    }
}

// JSON object keys must be strings, so a route serializes as "entry->exit".
impl Serialize for RouteKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RouteKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_display_and_parse() {
        let address = Address::repeat_byte(0xab);
        let rendered = address.to_string();
        assert_eq!(rendered.len(), 42);
        assert!(rendered.starts_with("0xabab"));
        assert_eq!(rendered.parse::<Address>().unwrap(), address);
    }

    #[test]
    fn test_address_rejects_wrong_length() {
        assert!("0x1234".parse::<Address>().is_err());
        assert!("zz".repeat(20).parse::<Address>().is_err());
    }

    #[test]
    fn test_address_rejects_non_ascii_digits() {
        let input = format!("0xa{}{}", "é", "0".repeat(37));
        assert_eq!(input.len(), 42);
        assert!(input.parse::<Address>().is_err());

        let json = serde_json::to_string(&input).unwrap();
        assert!(serde_json::from_str::<Address>(&json).is_err());
    }

    #[test]
    fn test_zero_address() {
        assert!(Address::ZERO.is_zero());
        assert!(!Address::repeat_byte(1).is_zero());
    }

    #[test]
    fn test_hash_secret_is_deterministic_and_distinct() {
        let a = Secret::repeat_byte(1);
        let b = Secret::repeat_byte(2);
        assert_eq!(hash_secret(&a), a.hash());
        assert_ne!(a.hash(), b.hash());
        assert_ne!(a.hash().0, a.0);
    }

    #[test]
    fn test_hash_secret_known_vector() {
        // sha256 of 32 zero bytes
        let hash = hash_secret(&Secret::ZERO);
        assert_eq!(
            hash.to_string(),
            "0x66687aadf862bd776c8fc18b8e9f8e20089714856ee233b3902a591d0d5f2925"
        );
    }

    #[test]
    fn test_route_key_serializes_as_map_key() {
        let key = RouteKey::new(Address::repeat_byte(1), Address::repeat_byte(2));
        let mut map = std::collections::HashMap::new();
        map.insert(key, 7u64);

        let json = serde_json::to_string(&map).unwrap();
        let back: std::collections::HashMap<RouteKey, u64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get(&key), Some(&7));
    }
}
