use crate::error::TypesError;
use std::fmt;

/// Ed25519 signature (64 bytes) — used for transaction signing.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ed25519Signature([u8; 64]);

impl Ed25519Signature {
    pub const LEN: usize = 64;

    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self, TypesError> {
        if slice.len() != 64 {
            return Err(TypesError::InvalidSignatureLength {
                expected: 64,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl Default for Ed25519Signature {
    fn default() -> Self {
        Self([0u8; 64])
    }
}

impl fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Signature(0x{}...)", &hex::encode(&self.0[..8]))
    }
}

/// Ed25519 public key (32 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ed25519PublicKey([u8; 32]);

impl Ed25519PublicKey {
    pub const LEN: usize = 32;

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self, TypesError> {
        if slice.len() != 32 {
            return Err(TypesError::InvalidPublicKeyLength {
                expected: 32,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Derive address from this public key
    pub fn to_address(&self) -> crate::address::Address {
        crate::address::Address::from_public_key(&self.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

impl fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519PublicKey(0x{}...)", &hex::encode(&self.0[..8]))
    }
}

/// BLS12-381 signature (96 bytes) — used for RANDAO reveals.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct BlsSignature(Vec<u8>); // 96 bytes

impl BlsSignature {
    pub const LEN: usize = 96;

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        if bytes.len() != 96 {
            return Err(TypesError::InvalidSignatureLength {
                expected: 96,
                actual: bytes.len(),
            });
        }
        Ok(Self(bytes.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty() || self.0.iter().all(|&b| b == 0)
    }

    /// 32-byte digest of the reveal, the value folded into the RANDAO mix.
    pub fn to_mix_contribution(&self) -> crate::hash::Hash {
        crate::hash::Hash::compute(&self.0)
    }
}

impl fmt::Debug for BlsSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.len() < 8 {
            return write!(f, "BlsSignature(empty)");
        }
        write!(f, "BlsSignature(0x{}...)", &hex::encode(&self.0[..8]))
    }
}

/// BLS12-381 public key (48 bytes).
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct BlsPublicKey(Vec<u8>); // 48 bytes

impl BlsPublicKey {
    pub const LEN: usize = 48;

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        if bytes.len() != 48 {
            return Err(TypesError::InvalidPublicKeyLength {
                expected: 48,
                actual: bytes.len(),
            });
        }
        Ok(Self(bytes.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty() || self.0.iter().all(|&b| b == 0)
    }
}

impl fmt::Debug for BlsPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.len() < 8 {
            return write!(f, "BlsPublicKey(empty)");
        }
        write!(f, "BlsPublicKey(0x{}...)", &hex::encode(&self.0[..8]))
    }
}
