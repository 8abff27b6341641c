use ring::signature::{UnparsedPublicKey, RSA_PKCS1_1024_8192_SHA256_FOR_LEGACY_USE_ONLY};

/// Bytes Game Center signs: player id, bundle id, big-endian timestamp, salt.
pub fn signed_payload(player_id: &str, bundle_id: &str, timestamp_ms: u64, salt: &[u8]) -> Vec<u8> {
    let mut payload =
        Vec::with_capacity(player_id.len() + bundle_id.len() + 8 + salt.len());
    payload.extend_from_slice(player_id.as_bytes());
    payload.extend_from_slice(bundle_id.as_bytes());
    payload.extend_from_slice(&timestamp_ms.to_be_bytes());
    payload.extend_from_slice(salt);
    payload
}

/// Checks an RSASSA-PKCS1-v1_5 / SHA-256 signature over the signed payload.
///
/// `rsa_public_key` is the PKCS#1 `RSAPublicKey` DER from the certificate SPKI.
pub fn verify_identity_signature(
    player_id: &str,
    bundle_id: &str,
    timestamp_ms: u64,
    salt: &[u8],
    signature: &[u8],
    rsa_public_key: &[u8],
) -> bool {
    let payload = signed_payload(player_id, bundle_id, timestamp_ms, salt);
    // 128-byte signatures are accepted upstream, so 1024-bit moduli must verify here.
    let key = UnparsedPublicKey::new(&RSA_PKCS1_1024_8192_SHA256_FOR_LEGACY_USE_ONLY, rsa_public_key);
    key.verify(&payload, signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ring::rand::SystemRandom;
    use ring::signature::{KeyPair, RsaKeyPair, RSA_PKCS1_SHA256, RSA_PSS_SHA256};

    const LEAF_PKCS8: &[u8] = include_bytes!("../../tests/fixtures/leaf.pk8");

    fn key_pair() -> RsaKeyPair {
        RsaKeyPair::from_pkcs8(LEAF_PKCS8).unwrap()
    }

    fn sign(kp: &RsaKeyPair, msg: &[u8]) -> Vec<u8> {
        let mut sig = vec![0u8; kp.public().modulus_len()];
        kp.sign(&RSA_PKCS1_SHA256, &SystemRandom::new(), msg, &mut sig)
            .unwrap();
        sig
    }

    #[test]
    fn payload_layout_is_concatenation() {
        let payload = signed_payload("T:abc123", "com.example.app", 1_700_000_000_000, &[1, 2]);
        let mut expected = b"T:abc123com.example.app".to_vec();
        expected.extend_from_slice(&[0x00, 0x00, 0x01, 0x8B, 0xCF, 0xE5, 0x68, 0x00]);
        expected.extend_from_slice(&[1, 2]);
        assert_eq!(payload, expected);
    }

    #[test]
    fn verifies_pkcs1_signature_and_rejects_tampering() {
        let kp = key_pair();
        let public = kp.public_key().as_ref().to_vec();
        let sig = sign(&kp, &signed_payload("T:abc123", "com.example.app", 42, &[1, 2]));

        assert!(verify_identity_signature("T:abc123", "com.example.app", 42, &[1, 2], &sig, &public));
        assert!(!verify_identity_signature("T:abc124", "com.example.app", 42, &[1, 2], &sig, &public));
        assert!(!verify_identity_signature("T:abc123", "com.example.apq", 42, &[1, 2], &sig, &public));
        assert!(!verify_identity_signature("T:abc123", "com.example.app", 43, &[1, 2], &sig, &public));
        assert!(!verify_identity_signature("T:abc123", "com.example.app", 42, &[1, 3], &sig, &public));

        let mut flipped = sig.clone();
        flipped[10] ^= 0x01;
        assert!(!verify_identity_signature("T:abc123", "com.example.app", 42, &[1, 2], &flipped, &public));
    }

    #[test]
    fn pss_signatures_are_not_accepted() {
        let kp = key_pair();
        let public = kp.public_key().as_ref().to_vec();
        let msg = signed_payload("G:1", "com.example.app", 7, &[]);
        let mut sig = vec![0u8; kp.public().modulus_len()];
        kp.sign(&RSA_PSS_SHA256, &SystemRandom::new(), &msg, &mut sig)
            .unwrap();
        assert!(!verify_identity_signature("G:1", "com.example.app", 7, &[], &sig, &public));
    }

    #[test]
    fn garbage_key_returns_false() {
        assert!(!verify_identity_signature("G:1", "b", 0, &[], &[0; 256], b"not a key"));
    }
}
