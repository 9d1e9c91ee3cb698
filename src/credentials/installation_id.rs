use std::sync::LazyLock;

use base64::{engine::general_purpose::URL_SAFE, Engine};
use rand::RngCore;
use regex::Regex;
use tracing::warn;

const ID_BYTES: usize = 17;
const ID_LEN: usize = 22;

static INSTALLATION_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[cdef][\w-]{21}$").unwrap());

/// Installation identifiers start with c, d, e or f followed by 21 URL-safe base64 chars.
pub fn is_valid_installation_id(candidate: &str) -> bool {
    INSTALLATION_ID.is_match(candidate)
}

/// Draws a fresh installation identifier, `None` when the draw fails the grammar.
pub fn generate_installation_id() -> Option<String> {
    let mut bytes = [0u8; ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    installation_id_from_bytes(bytes)
}

/// Forces the top nibble of the first byte to 0b0111 so the first
/// base64 character lands in `c..=f`, then keeps 22 characters.
pub fn installation_id_from_bytes(mut bytes: [u8; ID_BYTES]) -> Option<String> {
    bytes[0] = 0b0111_0000 + (bytes[0] % 0b0001_0000);

    let encoded = URL_SAFE.encode(bytes);
    let candidate: String = encoded.chars().take(ID_LEN).collect();

    if is_valid_installation_id(&candidate) {
        Some(candidate)
    } else {
        warn!("generated installation id failed validation, sending none");
        None
    }
}
