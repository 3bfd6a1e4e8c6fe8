//! Pre-login credential transform
//!
//! The login command carries the password as an SJCL envelope: AES-128-CCM
//! under a PBKDF2-HMAC-SHA256 key derived from the pre-shared key.

use aes::Aes128;
use base64::{engine::general_purpose::STANDARD, Engine};
use ccm::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    consts::{U13, U8},
    Ccm,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{ClientError, Result};

/// 64-bit tag, 13-byte nonce (15 - L with L = 2)
type SjclCcm = Ccm<Aes128, U8, U13>;

const ITERATIONS: u32 = 10_000;
const KEY_BITS: u32 = 128;
const TAG_BITS: u32 = 64;
const SALT_LEN: usize = 8;
const IV_LEN: usize = 16;
const NONCE_LEN: usize = 13;

/// Turns the raw secret into the opaque blob sent as the login password
pub trait CredentialEncryptor: Send + Sync {
    fn encrypt(&self, secret: &str, key: &str) -> Result<String>;
}

/// SJCL JSON envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SjclEnvelope {
    pub ct: String,
    pub iv: String,
    pub salt: String,
    pub iter: u32,
    pub ks: u32,
    pub ts: u32,
    pub mode: String,
    pub adata: String,
    pub cipher: String,
    pub v: u32,
}

/// Default encryptor, compatible with the vendor's SJCL decoder
#[derive(Debug, Clone, Copy, Default)]
pub struct SjclEncryptor;

impl SjclEncryptor {
    fn derive_key(passphrase: &str, salt: &[u8]) -> [u8; 16] {
        let mut key = [0u8; 16];
        pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, ITERATIONS, &mut key);
        key
    }

    pub fn seal(&self, plaintext: &[u8], passphrase: &str) -> Result<SjclEnvelope> {
        let mut rng = rand::thread_rng();
        let mut salt = [0u8; SALT_LEN];
        let mut iv = [0u8; IV_LEN];
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut iv);

        let key = Self::derive_key(passphrase, &salt);
        let cipher = SjclCcm::new_from_slice(&key)
            .map_err(|e| ClientError::Encryption(e.to_string()))?;
        let ct = cipher
            .encrypt(GenericArray::from_slice(&iv[..NONCE_LEN]), plaintext)
            .map_err(|e| ClientError::Encryption(e.to_string()))?;

        Ok(SjclEnvelope {
            ct: STANDARD.encode(ct),
            iv: STANDARD.encode(iv),
            salt: STANDARD.encode(salt),
            iter: ITERATIONS,
            ks: KEY_BITS,
            ts: TAG_BITS,
            mode: "ccm".to_string(),
            adata: String::new(),
            cipher: "aes".to_string(),
            v: 1,
        })
    }

    pub fn open(&self, envelope: &SjclEnvelope, passphrase: &str) -> Result<Vec<u8>> {
        let decode = |field: &str| {
            STANDARD
                .decode(field)
                .map_err(|e| ClientError::Encryption(e.to_string()))
        };
        let salt = decode(&envelope.salt)?;
        let iv = decode(&envelope.iv)?;
        let ct = decode(&envelope.ct)?;
        if iv.len() < NONCE_LEN {
            return Err(ClientError::Encryption("IV too short".to_string()));
        }

        let key = Self::derive_key(passphrase, &salt);
        let cipher = SjclCcm::new_from_slice(&key)
            .map_err(|e| ClientError::Encryption(e.to_string()))?;
        cipher
            .decrypt(GenericArray::from_slice(&iv[..NONCE_LEN]), ct.as_slice())
            .map_err(|e| ClientError::Encryption(e.to_string()))
    }
}

impl CredentialEncryptor for SjclEncryptor {
    fn encrypt(&self, secret: &str, key: &str) -> Result<String> {
        let envelope = self.seal(secret.as_bytes(), key)?;
        Ok(serde_json::to_string(&envelope)?)
    }
}
