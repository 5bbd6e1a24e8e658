//! `collect_feedback` boundary.
//!
//! Owns the coordinator and the lifecycle for the whole process and runs one
//! reset → show → acquire cycle per call. Outcomes that are not submissions
//! become `FeedbackError`s here, each with its own message.

use crate::config::{timeout_from_secs, Settings};
use crate::error::FeedbackError;
use crate::feedback::coordinator::CollectionCoordinator;
use crate::feedback::lifecycle::SessionLifecycle;
use crate::feedback::session::Outcome;
use crate::images::ImageSource;
use crate::surface::InteractionSurface;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const PNG_MIME: &str = "image/png";

/// One part of a successful tool response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackItem {
    Text(String),
    Image { data: Vec<u8>, mime_type: &'static str },
}

pub struct FeedbackService {
    settings: Settings,
    coordinator: Arc<CollectionCoordinator>,
    lifecycle: SessionLifecycle,
    in_flight: AtomicBool,
}

/// Clears the single-flight flag when a call ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl FeedbackService {
    pub fn new(
        settings: Settings,
        surface: Box<dyn InteractionSurface>,
        images: Box<dyn ImageSource>,
    ) -> Self {
        let coordinator = Arc::new(CollectionCoordinator::new());
        let lifecycle = SessionLifecycle::new(surface, images, Arc::clone(&coordinator));
        Self {
            settings,
            coordinator,
            lifecycle,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn lifecycle(&self) -> &SessionLifecycle {
        &self.lifecycle
    }

    /// Run one collection cycle, blocking the calling thread.
    ///
    /// `timeout_secs <= 0` waits indefinitely.
    pub fn collect_feedback(&self, timeout_secs: i64) -> Result<Vec<FeedbackItem>, FeedbackError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            log::warn!("[FEEDBACK] Rejecting concurrent collect_feedback call");
            return Err(FeedbackError::Busy);
        }
        let _guard = InFlight(&self.in_flight);

        log::info!(
            "[FEEDBACK] Starting feedback collection, timeout: {}s",
            timeout_secs
        );

        self.lifecycle.create()?;

        let timeout = timeout_from_secs(timeout_secs);
        let cycle = self.coordinator.reset();
        self.lifecycle.show(cycle, timeout)?;
        let outcome = self.coordinator.acquire(timeout);

        let items = into_items(outcome, timeout_secs)?;
        log::info!("[FEEDBACK] Returning {} feedback items", items.len());
        Ok(items)
    }

    /// Release the interaction surface. Safe to call more than once.
    pub fn shutdown(&self) {
        self.lifecycle.shutdown();
    }
}

fn into_items(outcome: Outcome, timeout_secs: i64) -> Result<Vec<FeedbackItem>, FeedbackError> {
    match outcome {
        Outcome::Submitted(submission) => {
            let mut items = Vec::with_capacity(submission.images.len() + 1);
            if let Some(text) = submission.text {
                items.push(FeedbackItem::Text(format!("User text feedback: {}", text)));
            }
            for data in submission.images {
                items.push(FeedbackItem::Image {
                    data,
                    mime_type: PNG_MIME,
                });
            }
            Ok(items)
        }
        Outcome::Cancelled { reason } => {
            log::info!("[FEEDBACK] Feedback cancelled: {}", reason);
            Err(FeedbackError::UserCancelled(reason))
        }
        Outcome::TimedOut => {
            log::info!("[FEEDBACK] Feedback timed out after {}s", timeout_secs);
            Err(FeedbackError::Timeout(timeout_secs.max(0) as u64))
        }
    }
}
