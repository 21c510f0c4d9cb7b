use std::future::Future;
use std::path::Path;

use data_encoding::BASE64;

use crate::errors::RequestError;

const RECIPE_IMAGE_DIR: &str = "recipes/images";
const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

#[derive(Debug, PartialEq, Eq)]
pub struct DecodedImage {
    pub extension: String,
    pub bytes: Vec<u8>,
}

/// Parses `data:image/<ext>;base64,<payload>`.
pub fn decode_data_url(data: &str) -> Result<DecodedImage, RequestError> {
    let invalid = || RequestError::validation("Image must be a base64 encoded data:image URL");

    let rest = data.strip_prefix("data:image/").ok_or_else(invalid)?;
    let (format, payload) = rest.split_once(";base64,").ok_or_else(invalid)?;
    let extension = format.to_ascii_lowercase();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(RequestError::validation(format!(
            "Unsupported image format: {}",
            format
        )));
    }

    let bytes = BASE64.decode(payload.trim().as_bytes()).map_err(|_| invalid())?;
    if bytes.is_empty() {
        return Err(invalid());
    }
    Ok(DecodedImage { extension, bytes })
}

/// Writes the image under `media_root` and returns its path relative to it.
pub async fn save_recipe_image(
    media_root: &Path,
    image: DecodedImage,
) -> Result<String, RequestError> {
    let relative = format!(
        "{}/{}.{}",
        RECIPE_IMAGE_DIR,
        uuid::Uuid::new_v4(),
        image.extension
    );
    let directory = media_root.join(RECIPE_IMAGE_DIR);
    tokio::fs::create_dir_all(&directory).await.map_err(|e| {
        tracing::error!("Could not create media directory {:?}: {}", directory, e);
        RequestError::ServerError
    })?;
    let path = media_root.join(&relative);
    tokio::fs::write(&path, image.bytes).await.map_err(|e| {
        tracing::error!("Could not write image {:?}: {}", path, e);
        RequestError::ServerError
    })?;
    tracing::debug!("Saved recipe image {}", relative);
    Ok(relative)
}

/// Saves `image`, passes its stored path to `write`, and removes the file
/// again when `write` fails so no unreferenced image is left behind.
pub async fn with_saved_image<T, F, Fut>(
    media_root: &Path,
    image: DecodedImage,
    write: F,
) -> Result<T, RequestError>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<T, RequestError>>,
{
    let relative = save_recipe_image(media_root, image).await?;
    let result = write(relative.clone()).await;
    if result.is_err() {
        remove_media_file(media_root, &relative).await;
    }
    result
}

/// Deletes a stored media file. A file that is already gone is not an error.
pub async fn remove_media_file(media_root: &Path, relative: &str) {
    let path = media_root.join(relative);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => tracing::debug!("Removed media file {}", relative),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Could not remove media file {:?}: {}", path, e),
    }
}

pub fn image_url(media_url: &str, relative: &str) -> String {
    format!("{}{}", media_url, relative)
}
