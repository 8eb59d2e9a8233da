//! Erzeugung von Token-Werten
//!
//! Token-Werte sind 32 Zufallsbytes aus dem CSPRNG, URL-sicher Base64-kodiert
//! ohne Padding. Eindeutigkeit garantiert erst die Datenbank beim Einfuegen.

use base64::Engine as _;
use rand::RngCore;

/// Anzahl Zufallsbytes pro Token (256 Bit)
pub const TOKEN_BYTES: usize = 32;

/// Generiert einen neuen, nicht erratbaren Token-Wert
pub fn token_generieren() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
