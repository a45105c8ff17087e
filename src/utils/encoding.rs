use encoding_rs::WINDOWS_1252;
use std::borrow::Cow;

/// Decodes CVM files, which are published as Windows-1252 (a Latin-1 superset).
/// A UTF-8 BOM switches the decoder to UTF-8.
pub fn decode_cvm_text(bytes: &[u8]) -> Cow<'_, str> {
    let (text, encoding, had_errors) = WINDOWS_1252.decode(bytes);
    if had_errors {
        tracing::warn!("Replaced malformed {} sequences while decoding", encoding.name());
    }
    text
}
