use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum InvalidKeyError {
    #[error("key is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("key is empty")]
    Empty,
}

/// Sign `message` with HMAC-SHA256 using a base64 encoded key and return
/// the base64 encoded digest.
pub fn hmac_sha256_base64<M: AsRef<[u8]>>(
    key: &str,
    message: M,
) -> Result<String, InvalidKeyError> {
    let key = STANDARD.decode(key)?;
    if key.is_empty() {
        return Err(InvalidKeyError::Empty);
    }

    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(&key).map_err(|_| InvalidKeyError::Empty)?;
    mac.update(message.as_ref());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Percent-encode every byte outside the unreserved URI set.
pub fn uri_encode(src: &str) -> String {
    urlencoding::encode(src).into_owned()
}

/// Inverse of [uri_encode]. Returns `None` if the decoded bytes are not UTF-8.
pub fn uri_decode(src: &str) -> Option<String> {
    urlencoding::decode(src).ok().map(|s| s.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    // base64 of "group-primary-key-for-tests-0123456789abcd"
    const KEY: &str = "Z3JvdXAtcHJpbWFyeS1rZXktZm9yLXRlc3RzLTAxMjM0NTY3ODlhYmNk";

    #[test]
    fn test_hmac_matches_known_digest() {
        let digest = hmac_sha256_base64(KEY, "sensor-01").unwrap();
        assert_eq!(digest, "ClVO9JyY/jIHKk8/mLV6A50U+KqholOyDRsEGfz7pbI=");
    }

    #[test]
    fn test_hmac_rejects_bad_keys() {
        assert!(matches!(
            hmac_sha256_base64("not base64!", "x"),
            Err(InvalidKeyError::Encoding(_))
        ));
        assert!(matches!(
            hmac_sha256_base64("", "x"),
            Err(InvalidKeyError::Empty)
        ));
    }

    #[test]
    fn test_uri_encode_reserved_chars() {
        assert_eq!(uri_encode("a/b+c="), "a%2Fb%2Bc%3D");
        assert_eq!(uri_decode("a%2Fb%2Bc%3D").as_deref(), Some("a/b+c="));
    }
}
