//! Pure cryptographic primitives used by venue [`Signer`](crate::protocol::http::Signer)
//! implementations.
//!
//! Every function here is a pure transform over its inputs (nonces/timestamps are supplied by
//! the caller, never read from a clock internally) so that signer determinism (spec §8) holds:
//! identical `(payload, secret)` always produces identical output.

use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// `HMAC-SHA256(payload, secret)` as lowercase hex.
pub fn hmac_sha256_hex(payload: &str, secret: &str) -> String {
    hex::encode(hmac_sha256_bytes(payload, secret))
}

/// `HMAC-SHA256(payload, secret)` as standard base64.
pub fn hmac_sha256_base64(payload: &str, secret: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(hmac_sha256_bytes(payload, secret))
}

/// `HMAC-SHA512(payload, secret)` as lowercase hex.
pub fn hmac_sha512_hex(payload: &str, secret: &str) -> String {
    hex::encode(hmac_sha512_bytes(payload, secret))
}

/// `SHA-256(payload)` as lowercase hex.
pub fn sha256_hex(payload: &str) -> String {
    hex::encode(Sha256::digest(payload.as_bytes()))
}

/// `SHA-512(payload)` as lowercase hex.
pub fn sha512_hex(payload: &str) -> String {
    hex::encode(Sha512::digest(payload.as_bytes()))
}

/// `MD5(payload)` as uppercase hex. Used only by venues (LBank) that require it; MD5 is not
/// used for anything security sensitive here, purely as a venue wire-format checksum step.
pub fn md5_upper_hex(payload: &str) -> String {
    hex::encode_upper(md5::Md5::digest(payload.as_bytes()))
}

fn hmac_sha256_bytes(payload: &str, secret: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

fn hmac_sha512_bytes(payload: &str, secret: &str) -> Vec<u8> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Kraken's two-step REST signature (spec §4.2):
/// `base64(HMAC-SHA512(base64_decode(secret), path_bytes ‖ SHA256(nonce ‖ body)_bytes))`.
pub fn kraken_sign(path: &str, nonce: &str, body: &str, secret_b64: &str) -> Result<String, String> {
    let secret = base64::engine::general_purpose::STANDARD
        .decode(secret_b64)
        .map_err(|e| format!("invalid base64 Kraken secret: {e}"))?;

    let mut hasher = Sha256::new();
    hasher.update(nonce.as_bytes());
    hasher.update(body.as_bytes());
    let nonce_body_hash = hasher.finalize();

    let mut mac = HmacSha512::new_from_slice(&secret).map_err(|e| e.to_string())?;
    mac.update(path.as_bytes());
    mac.update(&nonce_body_hash);

    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// Generates a random lowercase hex string of `len` characters, used for JWT `nonce` claims and
/// UUID-style signer nonces where a full UUID isn't required.
pub fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len.div_ceil(2)];
    rand::rng().fill_bytes(&mut bytes);
    let mut s = hex::encode(bytes);
    s.truncate(len);
    s
}

/// ES256 JSON Web Token signer (spec §4.2), used by Coinbase Advanced Trade.
///
/// Produces `b64url(header).b64url(payload).b64url(signature)` where `signature` is the raw
/// IEEE P1363 (`r ‖ s`) ECDSA P-256 signature over SHA-256 of the signing input, not a DER
/// encoding.
pub struct Es256Jwt;

impl Es256Jwt {
    /// `pem_private_key` is a PEM-encoded EC P-256 private key (SEC1 or PKCS8).
    pub fn sign(
        api_key: &str,
        pem_private_key: &str,
        iss: &str,
        uri: Option<&str>,
        now_unix_secs: i64,
    ) -> Result<String, String> {
        use p256::ecdsa::{signature::Signer, Signature, SigningKey};
        use p256::pkcs8::DecodePrivateKey;
        use sec1::DecodeEcPrivateKey;

        let signing_key = SigningKey::from_pkcs8_pem(pem_private_key)
            .or_else(|_| SigningKey::from_sec1_pem(pem_private_key))
            .map_err(|e| format!("invalid EC P-256 private key: {e}"))?;

        let header = serde_json::json!({
            "alg": "ES256",
            "typ": "JWT",
            "kid": api_key,
            "nonce": random_hex(16),
        });

        let mut payload = serde_json::json!({
            "iss": iss,
            "sub": api_key,
            "nbf": now_unix_secs,
            "exp": now_unix_secs + 120,
        });
        if let Some(uri) = uri {
            payload["uri"] = serde_json::Value::String(uri.to_string());
        }

        let header_b64 = b64url_json(&header)?;
        let payload_b64 = b64url_json(&payload)?;
        let signing_input = format!("{header_b64}.{payload_b64}");

        let signature: Signature = signing_key.sign(signing_input.as_bytes());
        let sig_b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(signature.to_bytes());

        Ok(format!("{signing_input}.{sig_b64}"))
    }
}

fn b64url_json(value: &serde_json::Value) -> Result<String, String> {
    let bytes = serde_json::to_vec(value).map_err(|e| e.to_string())?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_sha256_hex_is_deterministic() {
        let a = hmac_sha256_hex("payload", "secret");
        let b = hmac_sha256_hex("payload", "secret");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn sha256_hex_matches_known_vector() {
        // echo -n "" | sha256sum
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn md5_upper_hex_is_uppercase() {
        let digest = md5_upper_hex("hello");
        assert_eq!(digest, digest.to_uppercase());
        assert_eq!(digest.len(), 32);
    }

    #[test]
    fn kraken_sign_rejects_invalid_base64_secret() {
        assert!(kraken_sign("/0/private/Balance", "123", "nonce=123", "not-base64!!").is_err());
    }

    #[test]
    fn kraken_sign_is_deterministic_for_fixed_inputs() {
        let secret = base64::engine::general_purpose::STANDARD.encode(b"super-secret-key-bytes");
        let a = kraken_sign("/0/private/Balance", "1700000000000000", "nonce=1700000000000000", &secret).unwrap();
        let b = kraken_sign("/0/private/Balance", "1700000000000000", "nonce=1700000000000000", &secret).unwrap();
        assert_eq!(a, b);
    }
}
