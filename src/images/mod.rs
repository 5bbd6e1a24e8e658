//! Image acquisition domain: public API.
//!
//! Turns files and clipboard contents into normalized `ImageAttachment`s.
//! The lifecycle only talks to the `ImageSource` trait, so tests can swap in
//! a canned source and hosts without a clipboard still work.

mod normalize;

pub use normalize::{
    from_encoded_bytes, from_rgba, load_from_file, MAX_DIMENSION, MAX_FILE_SIZE,
    SUPPORTED_EXTENSIONS,
};

use crate::error::FeedbackError;
use crate::feedback::session::ImageAttachment;
use std::path::{Path, PathBuf};

/// Result of loading a batch of user-chosen files.
#[derive(Debug, Default)]
pub struct ImageSelection {
    pub images: Vec<ImageAttachment>,
    /// File name plus reason for every file that could not be loaded.
    pub failed: Vec<String>,
}

/// Where attachments come from. Called only on the interaction thread.
pub trait ImageSource: Send + 'static {
    fn select_images(&mut self, paths: &[PathBuf]) -> ImageSelection;

    /// `Ok(None)` when the clipboard holds no image.
    fn paste_from_clipboard(&mut self) -> Result<Option<ImageAttachment>, FeedbackError>;
}

/// Local files plus the system clipboard (via arboard).
#[derive(Debug, Default)]
pub struct DesktopImages;

impl DesktopImages {
    pub fn new() -> Self {
        Self
    }
}

impl ImageSource for DesktopImages {
    fn select_images(&mut self, paths: &[PathBuf]) -> ImageSelection {
        let mut selection = ImageSelection::default();
        for path in paths {
            match load_from_file(path) {
                Ok(image) => selection.images.push(image),
                Err(e) => {
                    log::warn!("[IMAGE] Failed to load {}: {}", path.display(), e);
                    selection.failed.push(format!("{}: {}", display_name(path), e));
                }
            }
        }
        log::info!(
            "[IMAGE] Loaded {} of {} selected files",
            selection.images.len(),
            paths.len()
        );
        selection
    }

    fn paste_from_clipboard(&mut self) -> Result<Option<ImageAttachment>, FeedbackError> {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| FeedbackError::InvalidAttachment(format!("clipboard unavailable: {}", e)))?;

        let data = match clipboard.get_image() {
            Ok(data) => data,
            Err(arboard::Error::ContentNotAvailable) => {
                log::info!("[IMAGE] Clipboard holds no image");
                return Ok(None);
            }
            Err(e) => {
                return Err(FeedbackError::InvalidAttachment(format!(
                    "clipboard read failed: {}",
                    e
                )))
            }
        };

        let width = u32::try_from(data.width)
            .map_err(|_| FeedbackError::InvalidAttachment("clipboard image too wide".to_string()))?;
        let height = u32::try_from(data.height)
            .map_err(|_| FeedbackError::InvalidAttachment("clipboard image too tall".to_string()))?;

        let image = from_rgba(width, height, data.bytes.into_owned(), "clipboard")?;
        log::info!(
            "[IMAGE] Pasted {}x{} image from clipboard ({} bytes)",
            width,
            height,
            image.payload().len()
        );
        Ok(Some(image))
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
