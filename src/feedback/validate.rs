//! Submission rules for a feedback session.
//!
//! Checks run in a fixed order and the first failure wins, so the surface
//! always shows the most fundamental problem first.

use crate::feedback::session::FeedbackSession;

/// Longest accepted text, in characters.
pub const MAX_TEXT_CHARS: usize = 10_000;

/// Most images accepted in one submission.
pub const MAX_IMAGES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    NoFeedback,
    TextTooLong { len: usize },
    TooManyImages { count: usize },
    /// Zero-based index of the first attachment with an empty payload.
    InvalidImageAt(usize),
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::NoFeedback => write!(f, "Please enter text feedback or add images"),
            Violation::TextTooLong { len } => write!(
                f,
                "Text feedback is too long ({} characters), keep it within {}",
                len, MAX_TEXT_CHARS
            ),
            Violation::TooManyImages { count } => write!(
                f,
                "Too many images ({}), at most {} are supported",
                count, MAX_IMAGES
            ),
            Violation::InvalidImageAt(index) => {
                write!(f, "Image #{} has no data", index + 1)
            }
        }
    }
}

/// Check a session against the submission rules.
pub fn validate(session: &FeedbackSession) -> Result<(), Violation> {
    if !session.has_text() && !session.has_images() {
        return Err(Violation::NoFeedback);
    }

    if session.has_text() {
        let len = session.text().map(|t| t.chars().count()).unwrap_or(0);
        if len > MAX_TEXT_CHARS {
            return Err(Violation::TextTooLong { len });
        }
    }

    let count = session.image_count();
    if count > MAX_IMAGES {
        return Err(Violation::TooManyImages { count });
    }

    if let Some(index) = session.images().iter().position(|i| i.payload().is_empty()) {
        return Err(Violation::InvalidImageAt(index));
    }

    Ok(())
}
