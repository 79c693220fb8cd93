// Copyright (c) 2026 PeerLinks
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Cryptographic primitives: Ed25519 signatures, X25519 sealed boxes,
//! XSalsa20-Poly1305 secretboxes, keyed BLAKE2b and a CSPRNG.
//!
//! Everything here is a thin wrapper; the interesting key/hash derivations
//! (channel id, symmetric key, invite request id) live with their owners and
//! only the domain-separation keys are fixed in this module's callers.

use blake2::digest::consts::U32;
use blake2::digest::{KeyInit as Blake2KeyInit, Mac};
use blake2::{Blake2b, Blake2bMac, Digest};
use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::{Nonce, XSalsa20Poly1305};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::core::constants::{HASH_SIZE, NONCE_SIZE, SIGNATURE_SIZE};

type Blake2b256 = Blake2b<U32>;
type Blake2bMac256 = Blake2bMac<U32>;

/// Crypto errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key material")]
    Key,
    #[error("seal")]
    Seal,
    #[error("open")]
    Open,
}

/// Symmetric channel encryption key (32 bytes), wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; 32]);

impl SymmetricKey {
    /// Construct from raw bytes.
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for SymmetricKey {}

/// Generate a fresh Ed25519 signing key.
pub fn generate_signing_key() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

/// Sign a message, returning the 64-byte signature.
pub fn sign(key: &SigningKey, message: &[u8]) -> [u8; SIGNATURE_SIZE] {
    key.sign(message).to_bytes()
}

/// Verify an Ed25519 signature under raw public key bytes.
pub fn verify(public_key: &[u8; 32], message: &[u8], signature: &[u8]) -> bool {
    if signature.len() != SIGNATURE_SIZE {
        return false;
    }
    let Ok(pk) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let Ok(sig) = Signature::from_slice(signature) else {
        return false;
    };
    pk.verify_strict(message, &sig).is_ok()
}

/// Unkeyed BLAKE2b-256 content hash.
pub fn hash32(data: &[u8]) -> [u8; HASH_SIZE] {
    Blake2b256::digest(data).into()
}

/// Keyed BLAKE2b-256 used for domain-separated derivations.
pub fn keyed_hash32(key: &[u8], data: &[u8]) -> Result<[u8; HASH_SIZE], CryptoError> {
    let mut mac = <Blake2bMac256 as Blake2KeyInit>::new_from_slice(key).map_err(|_| CryptoError::Key)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

/// XSalsa20-Poly1305 secretbox seal.
pub fn secretbox_seal(
    key: &SymmetricKey,
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = XSalsa20Poly1305::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::Key)?;
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| CryptoError::Seal)
}

/// XSalsa20-Poly1305 secretbox open. `Open` on MAC failure.
pub fn secretbox_open(
    key: &SymmetricKey,
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = XSalsa20Poly1305::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::Key)?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Open)
}

/// Generate an X25519 box keypair for invite transport.
pub fn generate_box_keypair() -> (crypto_box::SecretKey, [u8; 32]) {
    let secret = crypto_box::SecretKey::generate(&mut OsRng);
    let public = secret.public_key().to_bytes();
    (secret, public)
}

/// Anonymous sealed box to a recipient public key (`crypto_box_seal`).
pub fn seal_box(recipient_public: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let pk = crypto_box::PublicKey::from(*recipient_public);
    pk.seal(&mut OsRng, plaintext).map_err(|_| CryptoError::Seal)
}

/// Open an anonymous sealed box with the matching secret key.
pub fn open_box(secret: &crypto_box::SecretKey, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    secret.unseal(ciphertext).map_err(|_| CryptoError::Open)
}

/// Fill an array with CSPRNG bytes.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut out = [0u8; N];
    OsRng.fill_bytes(&mut out);
    out
}
