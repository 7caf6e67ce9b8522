//! Random crumb generation.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;

/// Generate a cryptographically random token of `size` characters drawn
/// from the URL-safe base64 alphabet. The default size of 43 yields just
/// over 256 bits of entropy.
pub fn random_token(size: usize) -> String {
    // Each base64 character carries 6 bits; round the byte count up so the
    // encoded string is at least `size` characters before truncation.
    let byte_len = (size * 6).div_ceil(8);
    let mut bytes = vec![0u8; byte_len];
    rand::thread_rng().fill_bytes(&mut bytes);

    let mut encoded = URL_SAFE_NO_PAD.encode(&bytes);
    encoded.truncate(size);
    encoded
}
