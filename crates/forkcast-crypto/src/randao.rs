//! BLS keys for the RANDAO randomness beacon.
//!
//! A proposer's reveal is its BLS signature over the epoch number; the
//! 32-byte digest of the reveal is XOR-folded into the next epoch's mix.

use crate::error::CryptoError;
use blst::min_pk::{PublicKey, SecretKey, Signature};
use forkcast_types::{BlsPublicKey, BlsSignature};
use rand::RngCore;

const DST: &[u8] = b"BLS_SIG_BLS12381G1_XMD:SHA-256_SSWU_RO_NUL_";

/// BLS12-381 keypair for RANDAO reveals.
pub struct RandaoKeypair {
    secret_key: SecretKey,
}

impl RandaoKeypair {
    /// Generate a new random keypair using cryptographically secure randomness
    pub fn generate() -> Result<Self, CryptoError> {
        let mut rng = rand::thread_rng();
        let mut ikm = [0u8; 32];
        rng.fill_bytes(&mut ikm);
        let secret_key = SecretKey::key_gen(&ikm, &[])
            .map_err(|e| CryptoError::KeyDerivationFailed(format!("{:?}", e)))?;
        Ok(Self { secret_key })
    }

    /// Create from 32-byte input keying material (deterministic).
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, CryptoError> {
        let secret_key =
            SecretKey::key_gen(seed, &[]).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { secret_key })
    }

    /// Get the public key
    pub fn public_key(&self) -> BlsPublicKey {
        let pk = self.secret_key.sk_to_pk();
        BlsPublicKey::from_bytes(&pk.to_bytes()).expect("blst public key is 48 bytes")
    }

    /// Produce the RANDAO reveal for an epoch: a signature over the
    /// big-endian epoch number.
    pub fn reveal(&self, epoch: u64) -> BlsSignature {
        let signature = self.secret_key.sign(&epoch.to_be_bytes(), DST, &[]);
        BlsSignature::from_bytes(&signature.to_bytes()).expect("blst signature is 96 bytes")
    }
}

impl std::fmt::Debug for RandaoKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RandaoKeypair({:?})", self.public_key())
    }
}

/// Verify a RANDAO reveal against the proposer's public key and the epoch.
pub fn verify_reveal(
    public_key: &BlsPublicKey,
    epoch: u64,
    reveal: &BlsSignature,
) -> Result<(), CryptoError> {
    let pk = PublicKey::from_bytes(public_key.as_bytes())
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    let sig = Signature::from_bytes(reveal.as_bytes())
        .map_err(|_| CryptoError::InvalidSignature)?;

    let result = sig.verify(true, &epoch.to_be_bytes(), DST, &[], &pk, true);

    if result == blst::BLST_ERROR::BLST_SUCCESS {
        Ok(())
    } else {
        Err(CryptoError::VerificationFailed)
    }
}
