//! Feedback session data model.
//!
//! `FeedbackSession` is the mutable accumulator owned by the interaction
//! thread. It never crosses threads: at a terminal action it is snapshotted
//! into an immutable `Submission` inside an `Outcome`.

use crate::error::FeedbackError;

/// An image the user attached. Payload is canonical PNG once normalized
/// (see `crate::images`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    payload: Vec<u8>,
    source_label: String,
    width: u32,
    height: u32,
}

impl ImageAttachment {
    /// Wrap already-normalized bytes. Dimensions are informational.
    pub fn new(payload: Vec<u8>, source_label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            payload,
            source_label: source_label.into(),
            width,
            height,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn source_label(&self) -> &str {
        &self.source_label
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Immutable copy of a session, handed across the thread boundary.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Submission {
    pub text: Option<String>,
    pub images: Vec<Vec<u8>>,
    pub image_sources: Vec<String>,
    pub image_count: usize,
}

/// Terminal result of one collection cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Submitted(Submission),
    Cancelled { reason: String },
    TimedOut,
}

impl Outcome {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Submitted(_) => "submitted",
            Outcome::Cancelled { .. } => "cancelled",
            Outcome::TimedOut => "timed_out",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeedbackSession {
    text: Option<String>,
    images: Vec<ImageAttachment>,
    has_text: bool,
    has_images: bool,
}

impl FeedbackSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store trimmed text. Blank input is ignored, not an error.
    pub fn add_text(&mut self, text: &str) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            self.text = Some(trimmed.to_string());
        }
        self.recompute();
    }

    /// Append an attachment. Empty payloads are rejected.
    pub fn add_image(&mut self, attachment: ImageAttachment) -> Result<(), FeedbackError> {
        if attachment.payload.is_empty() {
            return Err(FeedbackError::InvalidAttachment(format!(
                "empty image data from {}",
                attachment.source_label
            )));
        }
        self.images.push(attachment);
        self.recompute();
        Ok(())
    }

    /// Remove by index; out of range is a silent no-op.
    pub fn remove_image(&mut self, index: usize) {
        if index < self.images.len() {
            self.images.remove(index);
        }
        self.recompute();
    }

    pub fn clear_images(&mut self) {
        self.images.clear();
        self.recompute();
    }

    fn recompute(&mut self) {
        self.has_text = self.text.as_deref().is_some_and(|t| !t.is_empty());
        self.has_images = !self.images.is_empty();
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn images(&self) -> &[ImageAttachment] {
        &self.images
    }

    pub fn has_text(&self) -> bool {
        self.has_text
    }

    pub fn has_images(&self) -> bool {
        self.has_images
    }

    pub fn is_valid(&self) -> bool {
        self.has_text || self.has_images
    }

    pub fn is_empty(&self) -> bool {
        !self.is_valid()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn image_sources(&self) -> Vec<String> {
        self.images.iter().map(|i| i.source_label.clone()).collect()
    }

    /// One-line description for logs and the surface status line.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(text) = self.text.as_deref().filter(|_| self.has_text) {
            let preview: String = text.chars().take(50).collect();
            if text.chars().count() > 50 {
                parts.push(format!("text: {}...", preview));
            } else {
                parts.push(format!("text: {}", preview));
            }
        }
        if self.has_images {
            parts.push(format!("images: {}", self.images.len()));
        }
        if parts.is_empty() {
            return "no feedback".to_string();
        }
        parts.join(" | ")
    }

    /// Copy the session into the value that crosses the thread boundary.
    pub fn snapshot(&self) -> Submission {
        Submission {
            text: self.text.clone().filter(|_| self.has_text),
            images: self
                .images
                .iter()
                .filter(|i| !i.payload.is_empty())
                .map(|i| i.payload.clone())
                .collect(),
            image_sources: self.image_sources(),
            image_count: self.images.len(),
        }
    }

    /// Bypasses the empty-payload check so validator tests can build
    /// sessions `add_image` would refuse.
    #[cfg(test)]
    pub(crate) fn push_unchecked(&mut self, attachment: ImageAttachment) {
        self.images.push(attachment);
        self.recompute();
    }
}
