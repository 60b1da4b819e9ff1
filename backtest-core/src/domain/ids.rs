//! Deterministic ID types using BLAKE3, plus a monotonic group-id counter.
//!
//! - `ConfigHash`: stable digest over the run configuration (entry expr,
//!   exit zones, symbol, resolution, date range) used to detect
//!   run-configuration changes between callers.
//! - `RunId`: unique identifier for a single backtest run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 32-byte BLAKE3 hash wrapper with hex `Display` and serde-as-hex-string.
macro_rules! hash_id {
    ($name:ident) => {
        #[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(into = "String", try_from = "String")]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub fn from_bytes(data: &[u8]) -> Self {
                Self(*blake3::hash(data).as_bytes())
            }

            pub fn as_hex(&self) -> String {
                self.0.iter().map(|b| format!("{b:02x}")).collect()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), &self.as_hex()[..16])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.as_hex())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.as_hex()
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(hex: String) -> Result<Self, Self::Error> {
                let bytes: Vec<u8> = (0..hex.len())
                    .step_by(2)
                    .map(|i| {
                        u8::from_str_radix(hex.get(i..i + 2).ok_or("odd-length hex")?, 16)
                            .map_err(|e| e.to_string())
                    })
                    .collect::<Result<_, _>>()?;
                let arr: [u8; 32] = bytes.try_into().map_err(|_| "expected 32 bytes")?;
                Ok(Self(arr))
            }
        }
    };
}

hash_id!(ConfigHash);
hash_id!(RunId);

/// Monotonically increasing position/DCA group-id counter.
///
/// Groups are named `"pos-{n}"` for a fresh (non-DCA) position and
/// `"dca-{n}"` for a DCA position, per spec §3's group-id assignment rule.
#[derive(Debug, Default)]
pub struct GroupIdGen {
    next: u64,
}

impl GroupIdGen {
    pub fn next_group_id(&mut self, dca: bool) -> String {
        let n = self.next;
        self.next += 1;
        if dca {
            format!("dca-{n}")
        } else {
            format!("pos-{n}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blake3_hash_is_deterministic() {
        let h1 = ConfigHash::from_bytes(b"close>100+zone");
        let h2 = ConfigHash::from_bytes(b"close>100+zone");
        assert_eq!(h1, h2);
    }

    #[test]
    fn different_input_different_hash() {
        let h1 = ConfigHash::from_bytes(b"a");
        let h2 = ConfigHash::from_bytes(b"b");
        assert_ne!(h1, h2);
    }

    #[test]
    fn hash_serialization_roundtrip() {
        let h = RunId::from_bytes(b"run-1");
        let json = serde_json::to_string(&h).unwrap();
        let deser: RunId = serde_json::from_str(&json).unwrap();
        assert_eq!(h, deser);
    }

    #[test]
    fn group_id_gen_assigns_prefix_and_increments() {
        let mut gen = GroupIdGen::default();
        assert_eq!(gen.next_group_id(false), "pos-0");
        assert_eq!(gen.next_group_id(true), "dca-1");
        assert_eq!(gen.next_group_id(false), "pos-2");
    }
}
