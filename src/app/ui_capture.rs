use base64::engine::general_purpose::STANDARD;
use base64::Engine;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

pub fn ensure_png(bytes: &[u8]) -> Result<(), String> {
    if bytes.len() < PNG_SIGNATURE.len() {
        return Err("Screenshot data is empty".to_string());
    }
    if !bytes.starts_with(PNG_SIGNATURE) {
        return Err("Screenshot data is not a PNG".to_string());
    }
    Ok(())
}

pub fn png_bytes_to_data_url(bytes: &[u8]) -> Result<String, String> {
    ensure_png(bytes)?;
    let encoded = STANDARD.encode(bytes);
    Ok(format!("data:image/png;base64,{encoded}"))
}
