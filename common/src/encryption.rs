//! `aes128gcm` message encryption for Web Push (RFC 8291 over RFC 8188).
//!
//! Every message gets a fresh server key pair and salt, and fits in a single
//! record.

use crate::subscriptions::SubscriptionKeys;
use crate::vapid::decode_base64url;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes128Gcm, Nonce,
};
use anyhow::{anyhow, ensure, Context, Result};
use hkdf::Hkdf;
use p256::elliptic_curve::rand_core::{OsRng, RngCore};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{ecdh, PublicKey, SecretKey};
use sha2::Sha256;

pub const CONTENT_ENCODING: &str = "aes128gcm";

const RECORD_SIZE: u32 = 4096;
const SALT_LEN: usize = 16;
const AUTH_LEN: usize = 16;
const TAG_LEN: usize = 16;
const PUBLIC_KEY_LEN: usize = 65;
const HEADER_LEN: usize = SALT_LEN + 4 + 1 + PUBLIC_KEY_LEN;
const LAST_RECORD: u8 = 0x02;

/// Largest payload whose encrypted message still fits in 4096 bytes.
pub const MAX_PAYLOAD_LEN: usize = RECORD_SIZE as usize - HEADER_LEN - TAG_LEN - 1;

/// Encrypts `plaintext` for the browser holding `keys`.
pub fn encrypt(keys: &SubscriptionKeys, plaintext: &[u8]) -> Result<Vec<u8>> {
    let ua_public = decode_base64url(&keys.p256dh).context("Invalid base64url for p256dh")?;
    let auth = decode_base64url(&keys.auth).context("Invalid base64url for auth")?;

    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    encrypt_with(&SecretKey::random(&mut OsRng), &salt, &ua_public, &auth, plaintext)
}

fn encrypt_with(
    server_key: &SecretKey,
    salt: &[u8; SALT_LEN],
    ua_public: &[u8],
    auth: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    ensure!(
        plaintext.len() <= MAX_PAYLOAD_LEN,
        "Payload is {} bytes, at most {MAX_PAYLOAD_LEN} fit in a push message",
        plaintext.len()
    );
    ensure!(
        auth.len() == AUTH_LEN,
        "Auth secret must be {AUTH_LEN} bytes, got {}",
        auth.len()
    );

    let ua_key = PublicKey::from_sec1_bytes(ua_public)
        .map_err(|_| anyhow!("p256dh is not a P-256 public key"))?;
    let ua_public = ua_key.to_encoded_point(false);
    let server_public = server_key.public_key().to_encoded_point(false);

    let shared = ecdh::diffie_hellman(server_key.to_nonzero_scalar(), ua_key.as_affine());

    let (cek, nonce) = derive_content_keys(
        shared.raw_secret_bytes(),
        auth,
        ua_public.as_bytes(),
        server_public.as_bytes(),
        salt,
    )?;

    let mut record = Vec::with_capacity(plaintext.len() + 1);
    record.extend_from_slice(plaintext);
    record.push(LAST_RECORD);

    let cipher =
        Aes128Gcm::new_from_slice(&cek).map_err(|_| anyhow!("Invalid content encryption key"))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), record.as_slice())
        .map_err(|_| anyhow!("Failed to encrypt push message"))?;

    let mut message = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    message.extend_from_slice(salt);
    message.extend_from_slice(&RECORD_SIZE.to_be_bytes());
    message.push(PUBLIC_KEY_LEN as u8);
    message.extend_from_slice(server_public.as_bytes());
    message.extend_from_slice(&ciphertext);

    Ok(message)
}

// Content encryption key and nonce, keyed on both public keys and the auth secret
fn derive_content_keys(
    ecdh_secret: &[u8],
    auth: &[u8],
    ua_public: &[u8],
    server_public: &[u8],
    salt: &[u8],
) -> Result<([u8; 16], [u8; 12])> {
    let mut key_info = Vec::with_capacity(14 + 2 * PUBLIC_KEY_LEN);
    key_info.extend_from_slice(b"WebPush: info\0");
    key_info.extend_from_slice(ua_public);
    key_info.extend_from_slice(server_public);

    let mut ikm = [0u8; 32];
    Hkdf::<Sha256>::new(Some(auth), ecdh_secret)
        .expand(&key_info, &mut ikm)
        .map_err(|e| anyhow!("HKDF failed for input key: {e}"))?;

    let prk = Hkdf::<Sha256>::new(Some(salt), &ikm);
    let mut cek = [0u8; 16];
    prk.expand(b"Content-Encoding: aes128gcm\0", &mut cek)
        .map_err(|e| anyhow!("HKDF failed for content key: {e}"))?;
    let mut nonce = [0u8; 12];
    prk.expand(b"Content-Encoding: nonce\0", &mut nonce)
        .map_err(|e| anyhow!("HKDF failed for nonce: {e}"))?;

    Ok((cek, nonce))
}
