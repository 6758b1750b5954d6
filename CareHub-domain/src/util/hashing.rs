use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of the input
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash stored for an OTP; the phone number salts the code so equal codes
/// sent to different numbers never share a hash.
pub fn hash_otp(phone: &str, code: &str) -> String {
    sha256_hex(&format!("{}:{}", phone, code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_otp_hash_is_salted_by_phone() {
        let a = hash_otp("13800138000", "123456");
        let b = hash_otp("13900139000", "123456");
        assert_ne!(a, b);
        assert_eq!(a, hash_otp("13800138000", "123456"));
        assert_eq!(a.len(), 64);
    }
}
