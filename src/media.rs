use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// Decode a `data:image/<ext>;base64,<payload>` URI into raw bytes and the
/// image extension.
pub fn decode_data_uri(uri: &str) -> Result<(Vec<u8>, String), String> {
    let rest = uri
        .strip_prefix("data:image/")
        .ok_or_else(|| "Image must be a data:image/...;base64 URI".to_string())?;
    let (ext, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| "Image must be base64-encoded".to_string())?;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("Unsupported image type".to_string());
    }
    let bytes = BASE64
        .decode(payload)
        .map_err(|_| "Invalid base64 image payload".to_string())?;
    if bytes.is_empty() {
        return Err("Image payload is empty".to_string());
    }
    Ok((bytes, ext.to_string()))
}

/// Write decoded image bytes under `<media_dir>/recipes/` and return the
/// path clients fetch it from.
pub fn store_image(media_dir: &Path, bytes: &[u8], ext: &str) -> Result<String> {
    let dir = media_dir.join("recipes");
    fs::create_dir_all(&dir).context("Failed to create media directory")?;
    let filename = format!("{}.{}", Uuid::new_v4(), ext);
    fs::write(dir.join(&filename), bytes).context("Failed to write image file")?;
    Ok(format!("/media/recipes/{filename}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_png_data_uri() {
        let (bytes, ext) = decode_data_uri("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(ext, "png");
    }

    #[test]
    fn rejects_non_image_uri() {
        assert!(decode_data_uri("data:text/plain;base64,aGk=").is_err());
        assert!(decode_data_uri("hello").is_err());
    }

    #[test]
    fn rejects_bad_base64() {
        assert!(decode_data_uri("data:image/png;base64,???").is_err());
    }

    #[test]
    fn stores_file_under_recipes_dir() {
        let dir = std::env::temp_dir().join(format!("foodgram-media-{}", Uuid::new_v4()));
        let path = store_image(&dir, b"hello", "png").unwrap();
        assert!(path.starts_with("/media/recipes/"));
        let on_disk = dir.join("recipes").join(path.rsplit('/').next().unwrap());
        assert_eq!(fs::read(on_disk).unwrap(), b"hello");
        fs::remove_dir_all(dir).unwrap();
    }
}
