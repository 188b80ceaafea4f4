use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

/// Hex SHA-512 over the concatenation of `parts`.
///
/// Payment gateways sign notifications this way, e.g.
/// `SHA512(order_id + status_code + gross_amount + server_key)`.
pub fn sha512_hex(parts: &[&str]) -> String {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Constant-time comparison of two hex digests (case-insensitive).
pub fn digests_match(expected: &str, received: &str) -> bool {
    let expected = expected.to_ascii_lowercase();
    let received = received.trim().to_ascii_lowercase();

    if expected.len() != received.len() {
        return false;
    }

    expected.as_bytes().ct_eq(received.as_bytes()).into()
}
