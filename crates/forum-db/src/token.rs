use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

/// Bytes of entropy in session and OAuth state tokens.
const TOKEN_BYTES: usize = 32;

/// Unguessable URL-safe token (256 bits from the thread-local CSPRNG).
pub fn generate() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
