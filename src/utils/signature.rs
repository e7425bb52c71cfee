use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256 over a certificate's identity fields. Timestamps are
/// deliberately excluded: they round-trip through TIMESTAMPTZ with less
/// precision than chrono carries, which would break byte-exact recomputation.
pub fn sign_certificate(
    secret: &str,
    certificate_id: Uuid,
    course_id: Uuid,
    user_id: Uuid,
    verification_code: &str,
) -> String {
    let payload = format!(
        "{}|{}|{}|{}",
        certificate_id, course_id, user_id, verification_code
    );
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

pub fn verify_signature(
    secret: &str,
    certificate_id: Uuid,
    course_id: Uuid,
    user_id: Uuid,
    verification_code: &str,
    stored_signature: &str,
) -> bool {
    let expected = sign_certificate(secret, certificate_id, course_id, user_id, verification_code);
    ConstantTimeEq::ct_eq(expected.as_bytes(), stored_signature.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_verifies() {
        let id = Uuid::new_v4();
        let course = Uuid::new_v4();
        let user = Uuid::new_v4();
        let sig = sign_certificate("secret", id, course, user, "AAAA-BBBB");
        assert!(verify_signature("secret", id, course, user, "AAAA-BBBB", &sig));
    }

    #[test]
    fn tampered_fields_fail() {
        let id = Uuid::new_v4();
        let course = Uuid::new_v4();
        let user = Uuid::new_v4();
        let sig = sign_certificate("secret", id, course, user, "AAAA-BBBB");
        assert!(!verify_signature("secret", id, course, user, "AAAA-CCCC", &sig));
        assert!(!verify_signature(
            "secret",
            id,
            course,
            Uuid::new_v4(),
            "AAAA-BBBB",
            &sig
        ));
        assert!(!verify_signature("other", id, course, user, "AAAA-BBBB", &sig));
    }
}
