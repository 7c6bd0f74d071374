//! Ed25519 webhook signature verification.
//!
//! The provider signs the raw request body and sends the signature hex-coded
//! in `X-Provider-Signature`. We store only the provider's public key.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};

/// Verify a provider webhook signature over the raw body bytes.
///
/// `signature_hex` is the hex-coded 64-byte Ed25519 signature. Returns
/// `false` on any malformed input; never panics.
pub fn verify_webhook_signature(public_key: &[u8], body: &[u8], signature_hex: &str) -> bool {
    let signature_bytes = match hex::decode(signature_hex) {
        Ok(b) => b,
        Err(_) => return false,
    };
    verify_ed25519(public_key, body, &signature_bytes)
}

/// Verify an Ed25519 signature.
///
/// `public_key` must be 32 bytes and `signature` 64 bytes; anything else is
/// an invalid signature, not an error.
pub fn verify_ed25519(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let pk_bytes: [u8; 32] = match public_key.try_into() {
        Ok(b) => b,
        Err(_) => return false,
    };
    let sig_bytes: [u8; 64] = match signature.try_into() {
        Ok(b) => b,
        Err(_) => return false,
    };

    let verifying_key = match VerifyingKey::from_bytes(&pk_bytes) {
        Ok(k) => k,
        Err(_) => return false,
    };
    let sig = Signature::from_bytes(&sig_bytes);

    verifying_key.verify(message, &sig).is_ok()
}

/// Generate a new Ed25519 keypair for testing.
///
/// Returns (private_key_bytes, public_key_bytes).
#[cfg(test)]
pub fn generate_keypair() -> ([u8; 32], [u8; 32]) {
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    let signing_key = SigningKey::generate(&mut OsRng);
    let verifying_key = signing_key.verifying_key();

    let mut private_key = [0u8; 32];
    private_key.copy_from_slice(signing_key.as_bytes());

    let mut public_key = [0u8; 32];
    public_key.copy_from_slice(verifying_key.as_bytes());

    (private_key, public_key)
}

/// Sign a message with a private key (for testing).
#[cfg(test)]
pub fn sign_message(private_key: &[u8; 32], message: &[u8]) -> [u8; 64] {
    use ed25519_dalek::{Signer, SigningKey};

    let signing_key = SigningKey::from_bytes(private_key);
    signing_key.sign(message).to_bytes()
}
