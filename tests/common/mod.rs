//! Scripted collaborators shared by the integration tests.

#![allow(dead_code)]

use feedback_collector_lib::error::FeedbackError;
use feedback_collector_lib::feedback::ImageAttachment;
use feedback_collector_lib::images::{ImageSelection, ImageSource};
use feedback_collector_lib::surface::{
    ActionSender, Confirmation, InteractionSurface, Notice, SessionView, UserAction,
};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What the scripted surface saw.
#[derive(Clone, Default)]
pub struct Script {
    /// One entry per `present`; each is replayed as the user's input.
    pub cycles: Arc<Mutex<VecDeque<Vec<UserAction>>>>,
    pub notices: Arc<Mutex<Vec<Notice>>>,
    pub opens: Arc<AtomicUsize>,
    pub presents: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
}

impl Script {
    pub fn push(&self, actions: Vec<UserAction>) {
        self.cycles.lock().unwrap().push_back(actions);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn presents(&self) -> usize {
        self.presents.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Surface that replays one scripted cycle per `present` and answers yes
/// to every confirmation.
pub struct ScriptedSurface {
    script: Script,
    actions: Option<ActionSender>,
    fail_open: bool,
}

impl ScriptedSurface {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            actions: None,
            fail_open: false,
        }
    }

    pub fn unavailable(script: Script) -> Self {
        Self {
            script,
            actions: None,
            fail_open: true,
        }
    }

    fn send(&self, action: UserAction) {
        if let Some(actions) = &self.actions {
            actions.send(action);
        }
    }
}

impl InteractionSurface for ScriptedSurface {
    fn open(&mut self, actions: ActionSender) -> Result<(), FeedbackError> {
        self.script.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(FeedbackError::EnvironmentUnavailable(
                "no terminal".to_string(),
            ));
        }
        self.actions = Some(actions);
        Ok(())
    }

    fn present(&mut self, _view: &SessionView) -> Result<(), FeedbackError> {
        self.script.presents.fetch_add(1, Ordering::SeqCst);
        let next = self.script.cycles.lock().unwrap().pop_front();
        for action in next.unwrap_or_default() {
            self.send(action);
        }
        Ok(())
    }

    fn refresh(&mut self, _view: &SessionView) {}

    fn hide(&mut self) {}

    fn notify(&mut self, notice: &Notice) {
        self.script.notices.lock().unwrap().push(notice.clone());
    }

    fn request_confirmation(&mut self, _question: Confirmation) {
        self.send(UserAction::Confirm(true));
    }

    fn close(&mut self) {
        self.script.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Every selected path becomes a tiny attachment labelled with the path.
pub struct CannedImages;

impl ImageSource for CannedImages {
    fn select_images(&mut self, paths: &[PathBuf]) -> ImageSelection {
        ImageSelection {
            images: paths
                .iter()
                .map(|p| ImageAttachment::new(p.display().to_string().into_bytes(), p.display().to_string(), 1, 1))
                .collect(),
            failed: Vec::new(),
        }
    }

    fn paste_from_clipboard(&mut self) -> Result<Option<ImageAttachment>, FeedbackError> {
        Ok(Some(ImageAttachment::new(
            b"clip".to_vec(),
            "clipboard",
            1,
            1,
        )))
    }
}
