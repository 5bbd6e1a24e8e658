//! Interaction surface: the thing the user actually types into.
//!
//! The lifecycle drives a surface through this trait from its interaction
//! thread; the surface reports user input back as `UserAction`s through an
//! `ActionSender`, which enqueues them on the same thread's task queue.
//! Surfaces never touch the `FeedbackSession` directly.
//!
//! Implementations:
//!   - terminal.rs: plain-text surface on the controlling TTY

pub mod terminal;

pub use terminal::TerminalSurface;

use crate::error::FeedbackError;
use crate::feedback::lifecycle::Task;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

/// Input produced by the user while a session is visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    /// Replace the feedback text (blank input is ignored).
    SetText(String),
    /// Load the chosen files as attachments.
    SelectImages(Vec<PathBuf>),
    PasteImage,
    RemoveImage(usize),
    ClearImages,
    Submit,
    /// Explicit cancel or window close.
    Cancel,
    /// Answer to the pending `Confirmation`.
    Confirm(bool),
}

/// Yes/no questions the lifecycle asks before destructive actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// Cancel with text or images entered.
    DiscardSession,
    ClearImages,
}

/// Read-only view of the session for rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionView {
    pub text: Option<String>,
    pub image_sources: Vec<String>,
    pub timeout: Option<Duration>,
    pub summary: String,
}

/// Message shown to the user without ending the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Submit refused or attachment rejected; the session stays open.
    Rejected(FeedbackError),
    Warning(String),
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::Rejected(e) => write!(f, "{}", e),
            Notice::Warning(msg) => write!(f, "{}", msg),
        }
    }
}

/// Handle a surface uses to report user input.
#[derive(Debug, Clone)]
pub struct ActionSender {
    tasks: mpsc::Sender<Task>,
}

impl ActionSender {
    pub(crate) fn new(tasks: mpsc::Sender<Task>) -> Self {
        Self { tasks }
    }

    /// Queue an action. Returns `false` once the lifecycle is gone.
    pub fn send(&self, action: UserAction) -> bool {
        self.tasks.send(Task::Action(action)).is_ok()
    }
}

/// A reusable, lazily created interaction surface.
///
/// Every method runs on the interaction thread. `open` is called exactly
/// once per lifecycle and `close` at most once.
pub trait InteractionSurface: Send + 'static {
    /// Allocate the surface without showing it.
    fn open(&mut self, actions: ActionSender) -> Result<(), FeedbackError>;

    /// Show a fresh, empty session.
    fn present(&mut self, view: &SessionView) -> Result<(), FeedbackError>;

    /// Redraw after a non-terminal mutation.
    fn refresh(&mut self, view: &SessionView);

    fn hide(&mut self);

    fn notify(&mut self, notice: &Notice);

    /// Ask a yes/no question. The answer must come back as
    /// `UserAction::Confirm`.
    fn request_confirmation(&mut self, question: Confirmation);

    fn close(&mut self);
}
