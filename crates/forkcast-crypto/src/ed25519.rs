use crate::error::CryptoError;
use ed25519_dalek::{Signer, Verifier};
use forkcast_types::{Address, Ed25519PublicKey, Ed25519Signature, SignedTransaction, Transaction};
use rand::rngs::OsRng;
use std::fmt;
use zeroize::Zeroize;

/// Ed25519 keypair for transaction signing.
/// Private key is zeroized on drop.
pub struct Keypair {
    signing_key: ed25519_dalek::SigningKey,
}

impl Keypair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        let signing_key = ed25519_dalek::SigningKey::generate(&mut csprng);
        Self { signing_key }
    }

    /// Create from a 32-byte seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = ed25519_dalek::SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// Get the public key
    pub fn public_key(&self) -> Ed25519PublicKey {
        let bytes = self.signing_key.verifying_key().to_bytes();
        Ed25519PublicKey::from_bytes(bytes)
    }

    /// Get the address derived from this keypair
    pub fn address(&self) -> Address {
        self.public_key().to_address()
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        let signature = self.signing_key.sign(message);
        Ed25519Signature::from_bytes(signature.to_bytes())
    }

    /// Sign a transaction, producing the wrapped form carried in blocks.
    pub fn sign_transaction(&self, tx: Transaction) -> SignedTransaction {
        let signature = self.sign(tx.signing_hash().as_bytes());
        SignedTransaction::new(tx, signature, self.public_key())
    }

    /// Export private key bytes (CAUTION: sensitive)
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({})", self.address())
    }
}

impl Clone for Keypair {
    fn clone(&self) -> Self {
        Self::from_seed(&self.to_bytes())
    }
}

impl Drop for Keypair {
    fn drop(&mut self) {
        let mut bytes = self.signing_key.to_bytes();
        bytes.zeroize();
    }
}

/// Verify an ed25519 signature.
pub fn verify(
    public_key: &Ed25519PublicKey,
    message: &[u8],
    signature: &Ed25519Signature,
) -> Result<(), CryptoError> {
    let vk = ed25519_dalek::VerifyingKey::from_bytes(public_key.as_bytes())
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());

    vk.verify(message, &sig)
        .map_err(|_| CryptoError::VerificationFailed)
}

/// Verify a signed transaction: the signature must check out under the
/// attached public key, and the key must derive the claimed sender address.
pub fn verify_transaction(signed: &SignedTransaction) -> Result<(), CryptoError> {
    verify(
        &signed.public_key,
        signed.tx.signing_hash().as_bytes(),
        &signed.signature,
    )?;

    if signed.sender() != signed.tx.from {
        return Err(CryptoError::SenderMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let keypair = Keypair::generate();
        let message = b"slot tick";

        let signature = keypair.sign(message);
        assert!(verify(&keypair.public_key(), message, &signature).is_ok());
        assert!(verify(&keypair.public_key(), b"other", &signature).is_err());
    }

    #[test]
    fn test_from_seed_deterministic() {
        let a = Keypair::from_seed(&[7u8; 32]);
        let b = Keypair::from_seed(&[7u8; 32]);
        assert_eq!(a.address(), b.address());
        assert_eq!(a.sign(b"x"), b.sign(b"x"));
    }

    #[test]
    fn test_verify_transaction() {
        let keypair = Keypair::from_seed(&[1u8; 32]);
        let tx = Transaction::new(keypair.address(), Address::ZERO, 5, 0, 1000);
        let signed = keypair.sign_transaction(tx);

        assert!(verify_transaction(&signed).is_ok());
    }

    #[test]
    fn test_verify_transaction_rejects_spoofed_sender() {
        let keypair = Keypair::from_seed(&[1u8; 32]);
        let other = Keypair::from_seed(&[2u8; 32]);

        // Claims to be `other` but signed by `keypair`.
        let tx = Transaction::new(other.address(), Address::ZERO, 5, 0, 1000);
        let signed = keypair.sign_transaction(tx);

        assert_eq!(
            verify_transaction(&signed),
            Err(CryptoError::SenderMismatch)
        );
    }

    #[test]
    fn test_verify_transaction_rejects_tampering() {
        let keypair = Keypair::from_seed(&[1u8; 32]);
        let tx = Transaction::new(keypair.address(), Address::ZERO, 5, 0, 1000);
        let mut signed = keypair.sign_transaction(tx);
        signed.tx.value = 500;

        assert!(verify_transaction(&signed).is_err());
    }
}
