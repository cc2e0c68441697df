use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::{
    constants::{IMAGE_EXTENSIONS, RECIPE_IMAGE_DIR},
    database::error::TypeError,
    error::{Error, HtmlError},
};

#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    pub extension: String,
    pub bytes: Vec<u8>,
}

/// `true` for values shaped like `data:image/...;base64,...`.
pub fn is_data_url(value: &str) -> bool {
    value.trim_start().starts_with("data:")
}

/// Decodes a `data:image/<ext>;base64,<payload>` URL.
pub fn decode_image(value: &str) -> Result<ImagePayload, TypeError> {
    let rest = value
        .trim()
        .strip_prefix("data:image/")
        .ok_or_else(|| TypeError::new("Image must be a base64 data URL"))?;
    let (format, data) = rest
        .split_once(";base64,")
        .ok_or_else(|| TypeError::new("Image must be base64 encoded"))?;

    let extension = format.to_ascii_lowercase();
    if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(TypeError::new("Unsupported image format"));
    }

    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|_| TypeError::new("Image is not valid base64"))?;
    if bytes.is_empty() {
        return Err(TypeError::new("Image is empty"));
    }

    Ok(ImagePayload { extension, bytes })
}

/// Writes the image under `media_root` and returns its path relative to it.
pub async fn save_image(media_root: &Path, image: ImagePayload) -> Result<String, Error> {
    let relative = format!(
        "{RECIPE_IMAGE_DIR}/{}.{}",
        uuid::Uuid::new_v4(),
        image.extension
    );
    let target = media_root.join(&relative);

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            log::error!("> Failed to create {}: {e}", parent.display());
            HtmlError::InternalServerError.default()
        })?;
    }

    tokio::fs::write(&target, image.bytes).await.map_err(|e| {
        log::error!("> Failed to write {}: {e}", target.display());
        HtmlError::InternalServerError.default()
    })?;

    log::trace!("> Stored image {}", relative);
    Ok(relative)
}

/// Best effort; a missing file is only logged.
pub async fn remove_image(media_root: &Path, relative: &str) {
    if relative.is_empty() || relative.contains("..") {
        return;
    }

    if let Err(e) = tokio::fs::remove_file(media_root.join(relative)).await {
        log::warn!("> Failed to remove image {}: {e}", relative);
    }
}

pub fn image_url(media_url: &str, relative: &str) -> String {
    format!("{media_url}{relative}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_data_urls() {
        let image = decode_image("data:image/PNG;base64,aGVsbG8=").unwrap();

        assert_eq!(image.extension, "png");
        assert_eq!(image.bytes, b"hello");
    }

    #[test]
    fn rejects_other_payloads() {
        assert!(decode_image("http://example.com/a.png").is_err());
        assert!(decode_image("data:image/png,aGVsbG8=").is_err());
        assert!(decode_image("data:image/svg+xml;base64,aGVsbG8=").is_err());
        assert!(decode_image("data:image/png;base64,***").is_err());
        assert!(decode_image("data:image/png;base64,").is_err());
    }

    #[test]
    fn data_url_detection() {
        assert!(is_data_url("data:image/png;base64,aGVsbG8="));
        assert!(!is_data_url("/media/recipes/images/a.png"));
    }

    #[test]
    fn urls() {
        assert_eq!(
            image_url("/media/", "recipes/images/a.png"),
            "/media/recipes/images/a.png"
        );
    }

    #[tokio::test]
    async fn saves_and_removes() {
        let root = std::env::temp_dir().join(format!("foodgram-media-{}", uuid::Uuid::new_v4()));
        let image = decode_image("data:image/jpg;base64,aGVsbG8=").unwrap();

        let relative = save_image(&root, image).await.unwrap();
        assert!(relative.starts_with("recipes/images/"));
        assert!(relative.ends_with(".jpg"));
        assert_eq!(tokio::fs::read(root.join(&relative)).await.unwrap(), b"hello");

        remove_image(&root, &relative).await;
        assert!(!root.join(&relative).exists());

        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
