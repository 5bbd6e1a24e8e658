//! Session lifecycle: owns the interaction thread and the surface on it.
//!
//! States: `Uninitialized → Hidden ⇄ Visible → Destroyed`.
//!
//! Callers never touch the surface or the session. Every request (show,
//! force-cancel, destroy), every user action and every timer expiry is a
//! `Task` on one queue drained by the interaction thread, so the session has
//! exactly one owner. Terminal actions (submit, confirmed cancel, timer) hide
//! the surface and publish one `Outcome` to the coordinator, tagged with the
//! cycle that was shown.

use crate::error::FeedbackError;
use crate::feedback::coordinator::{CollectionCoordinator, CycleId};
use crate::feedback::session::{FeedbackSession, Outcome};
use crate::feedback::validate::validate;
use crate::images::ImageSource;
use crate::surface::{
    ActionSender, Confirmation, InteractionSurface, Notice, SessionView, UserAction,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

const CANCEL_REASON: &str = "Operation cancelled";
const SHUTDOWN_REASON: &str = "Server shutting down";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Hidden,
    Visible,
    Destroyed,
}

/// Work item for the interaction thread.
#[derive(Debug)]
pub(crate) enum Task {
    Show {
        cycle: CycleId,
        timeout: Option<Duration>,
        reply: mpsc::Sender<Result<(), FeedbackError>>,
    },
    Action(UserAction),
    TimerFired {
        cycle: CycleId,
    },
    ForceCancel {
        reason: String,
        reply: mpsc::Sender<()>,
    },
    Destroy {
        reply: mpsc::Sender<Result<(), FeedbackError>>,
    },
}

/// Collaborators waiting for `create()`.
struct Parts {
    surface: Box<dyn InteractionSurface>,
    images: Box<dyn ImageSource>,
}

pub struct SessionLifecycle {
    coordinator: Arc<CollectionCoordinator>,
    state: Arc<Mutex<LifecycleState>>,
    parts: Mutex<Option<Parts>>,
    /// Cached `create()` failure; environment errors are not retried.
    open_error: Mutex<Option<FeedbackError>>,
    tasks: Mutex<Option<mpsc::Sender<Task>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    opens: Arc<AtomicUsize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl SessionLifecycle {
    pub fn new(
        surface: Box<dyn InteractionSurface>,
        images: Box<dyn ImageSource>,
        coordinator: Arc<CollectionCoordinator>,
    ) -> Self {
        Self {
            coordinator,
            state: Arc::new(Mutex::new(LifecycleState::Uninitialized)),
            parts: Mutex::new(Some(Parts { surface, images })),
            open_error: Mutex::new(None),
            tasks: Mutex::new(None),
            worker: Mutex::new(None),
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *lock(&self.state)
    }

    /// How many times the surface has been opened. Stays at 1 for the whole
    /// life of a created lifecycle.
    pub fn surface_opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Start the interaction thread and open the surface (hidden).
    ///
    /// No-op once created. A failed open is remembered and returned again
    /// on every later call.
    pub fn create(&self) -> Result<(), FeedbackError> {
        match self.state() {
            LifecycleState::Uninitialized => {}
            LifecycleState::Destroyed => {
                return Err(FeedbackError::InvalidTransition(
                    "lifecycle already destroyed".to_string(),
                ))
            }
            LifecycleState::Hidden | LifecycleState::Visible => return Ok(()),
        }
        if let Some(err) = lock(&self.open_error).clone() {
            return Err(err);
        }
        let Some(parts) = lock(&self.parts).take() else {
            return Err(FeedbackError::InvalidTransition(
                "create already in progress".to_string(),
            ));
        };

        let (tx, rx) = mpsc::channel::<Task>();
        let (open_tx, open_rx) = mpsc::channel::<Result<(), FeedbackError>>();
        let mut worker = InteractionWorker {
            surface: parts.surface,
            images: parts.images,
            coordinator: Arc::clone(&self.coordinator),
            state: Arc::clone(&self.state),
            tasks: tx.clone(),
            session: FeedbackSession::new(),
            visible_cycle: None,
            timeout: None,
            timer: None,
            pending_confirmation: None,
        };
        let opens = Arc::clone(&self.opens);

        let handle = std::thread::Builder::new()
            .name("feedback-interaction".to_string())
            .spawn(move || {
                let actions = ActionSender::new(worker.tasks.clone());
                match worker.surface.open(actions) {
                    Ok(()) => {
                        opens.fetch_add(1, Ordering::SeqCst);
                        let _ = open_tx.send(Ok(()));
                    }
                    Err(e) => {
                        let _ = open_tx.send(Err(e));
                        return;
                    }
                }
                worker.run(rx);
            })
            .map_err(|e| FeedbackError::internal("spawn interaction thread", e))?;

        let opened = open_rx
            .recv()
            .unwrap_or_else(|e| Err(FeedbackError::internal("interaction thread", e)));

        match opened {
            Ok(()) => {
                *lock(&self.tasks) = Some(tx);
                *lock(&self.worker) = Some(handle);
                *lock(&self.state) = LifecycleState::Hidden;
                log::info!("[LIFECYCLE] Interaction surface created");
                Ok(())
            }
            Err(e) => {
                let _ = handle.join();
                let err = match e {
                    FeedbackError::EnvironmentUnavailable(_) => e,
                    other => FeedbackError::EnvironmentUnavailable(other.to_string()),
                };
                log::error!("[LIFECYCLE] Failed to create interaction surface: {}", err);
                *lock(&self.open_error) = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Present a fresh session for `cycle`, arming a timer when `timeout`
    /// is set. Returns once the surface is visible.
    pub fn show(&self, cycle: CycleId, timeout: Option<Duration>) -> Result<(), FeedbackError> {
        match self.state() {
            LifecycleState::Hidden | LifecycleState::Visible => {}
            other => {
                return Err(FeedbackError::InvalidTransition(format!(
                    "cannot show from {:?}",
                    other
                )))
            }
        }
        let (reply, replies) = mpsc::channel();
        self.send(Task::Show {
            cycle,
            timeout,
            reply,
        })?;
        replies
            .recv()
            .map_err(|e| FeedbackError::internal("interaction thread", e))?
    }

    /// Cancel a visible session without asking the user.
    pub fn force_cancel(&self, reason: &str) -> Result<(), FeedbackError> {
        if self.state() != LifecycleState::Visible {
            return Ok(());
        }
        let (reply, replies) = mpsc::channel();
        self.send(Task::ForceCancel {
            reason: reason.to_string(),
            reply,
        })?;
        replies
            .recv()
            .map_err(|e| FeedbackError::internal("interaction thread", e))
    }

    /// Release the surface and stop the interaction thread. Idempotent.
    ///
    /// Fails while a session is visible; cancel it first.
    pub fn destroy(&self) -> Result<(), FeedbackError> {
        match self.state() {
            LifecycleState::Destroyed => return Ok(()),
            LifecycleState::Visible => {
                return Err(FeedbackError::InvalidTransition(
                    "cannot destroy a visible session, cancel it first".to_string(),
                ))
            }
            LifecycleState::Uninitialized => {
                lock(&self.parts).take();
                *lock(&self.state) = LifecycleState::Destroyed;
                return Ok(());
            }
            LifecycleState::Hidden => {}
        }

        let (reply, replies) = mpsc::channel();
        let sent = self.send(Task::Destroy { reply });
        let result = match sent {
            Ok(()) => replies
                .recv()
                .unwrap_or_else(|e| Err(FeedbackError::internal("interaction thread", e))),
            Err(e) => Err(e),
        };

        match result {
            Err(FeedbackError::InvalidTransition(msg)) => Err(FeedbackError::InvalidTransition(msg)),
            other => {
                if let Err(e) = other {
                    log::warn!("[LIFECYCLE] Interaction thread already gone: {}", e);
                }
                lock(&self.tasks).take();
                if let Some(handle) = lock(&self.worker).take() {
                    if handle.join().is_err() {
                        log::warn!("[LIFECYCLE] Interaction thread panicked");
                    }
                }
                *lock(&self.state) = LifecycleState::Destroyed;
                log::info!("[LIFECYCLE] Interaction surface destroyed");
                Ok(())
            }
        }
    }

    /// Cleanup hook for process exit: cancel anything visible, then destroy.
    pub fn shutdown(&self) {
        if let Err(e) = self.force_cancel(SHUTDOWN_REASON) {
            log::warn!("[LIFECYCLE] Force cancel during shutdown failed: {}", e);
        }
        if let Err(e) = self.destroy() {
            log::warn!("[LIFECYCLE] Destroy during shutdown failed: {}", e);
        }
    }

    fn send(&self, task: Task) -> Result<(), FeedbackError> {
        let tasks = lock(&self.tasks);
        let tx = tasks.as_ref().ok_or_else(|| {
            FeedbackError::InvalidTransition("interaction thread not running".to_string())
        })?;
        tx.send(task)
            .map_err(|e| FeedbackError::internal("interaction thread", e))
    }
}

impl Drop for SessionLifecycle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// One-shot timer thread; fires `TimerFired` unless cancelled first.
struct Timer {
    cancel: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl Timer {
    fn arm(tasks: mpsc::Sender<Task>, cycle: CycleId, timeout: Duration) -> Option<Self> {
        let (cancel, cancelled) = mpsc::channel::<()>();
        let spawned = std::thread::Builder::new()
            .name("feedback-timer".to_string())
            .spawn(move || {
                if let Err(RecvTimeoutError::Timeout) = cancelled.recv_timeout(timeout) {
                    let _ = tasks.send(Task::TimerFired { cycle });
                }
            });
        match spawned {
            Ok(handle) => Some(Self { cancel, handle }),
            Err(e) => {
                log::error!("[LIFECYCLE] Failed to arm timer for cycle {}: {}", cycle, e);
                None
            }
        }
    }

    /// Stop the timer and wait for its thread, so no expiry can be queued
    /// after this returns.
    fn cancel(self) {
        let _ = self.cancel.send(());
        let _ = self.handle.join();
    }
}

/// State owned by the interaction thread.
struct InteractionWorker {
    surface: Box<dyn InteractionSurface>,
    images: Box<dyn ImageSource>,
    coordinator: Arc<CollectionCoordinator>,
    state: Arc<Mutex<LifecycleState>>,
    tasks: mpsc::Sender<Task>,
    session: FeedbackSession,
    visible_cycle: Option<CycleId>,
    timeout: Option<Duration>,
    timer: Option<Timer>,
    pending_confirmation: Option<Confirmation>,
}

impl InteractionWorker {
    fn run(&mut self, rx: mpsc::Receiver<Task>) {
        while let Ok(task) = rx.recv() {
            match task {
                Task::Show {
                    cycle,
                    timeout,
                    reply,
                } => {
                    let _ = reply.send(self.show(cycle, timeout));
                }
                Task::Action(action) => self.handle_action(action),
                Task::TimerFired { cycle } => self.on_timer(cycle),
                Task::ForceCancel { reason, reply } => {
                    self.finish(Outcome::Cancelled { reason });
                    let _ = reply.send(());
                }
                Task::Destroy { reply } => {
                    if self.visible_cycle.is_some() {
                        let _ = reply.send(Err(FeedbackError::InvalidTransition(
                            "cannot destroy a visible session, cancel it first".to_string(),
                        )));
                        continue;
                    }
                    self.cancel_timer();
                    self.surface.close();
                    let _ = reply.send(Ok(()));
                    break;
                }
            }
        }
        log::debug!("[LIFECYCLE] Interaction thread exiting");
    }

    fn set_state(&self, state: LifecycleState) {
        *lock(&self.state) = state;
    }

    fn view(&self) -> SessionView {
        SessionView {
            text: self.session.text().map(str::to_string),
            image_sources: self.session.image_sources(),
            timeout: self.timeout,
            summary: self.session.summary(),
        }
    }

    fn show(&mut self, cycle: CycleId, timeout: Option<Duration>) -> Result<(), FeedbackError> {
        if let Some(old) = self.visible_cycle.take() {
            log::warn!(
                "[LIFECYCLE] Cycle {} abandoned by its caller, reusing surface for cycle {}",
                old,
                cycle
            );
            self.cancel_timer();
        }

        self.session = FeedbackSession::new();
        self.pending_confirmation = None;
        self.timeout = timeout;

        if let Err(e) = self.surface.present(&self.view()) {
            log::error!("[LIFECYCLE] Failed to present surface: {}", e);
            self.surface.hide();
            self.set_state(LifecycleState::Hidden);
            return Err(e);
        }

        self.visible_cycle = Some(cycle);
        self.set_state(LifecycleState::Visible);
        if let Some(timeout) = timeout {
            self.timer = Timer::arm(self.tasks.clone(), cycle, timeout);
        }
        log::info!(
            "[LIFECYCLE] Cycle {} visible (timeout: {})",
            cycle,
            timeout
                .map(|t| format!("{}s", t.as_secs()))
                .unwrap_or_else(|| "none".to_string())
        );
        Ok(())
    }

    fn handle_action(&mut self, action: UserAction) {
        if self.visible_cycle.is_none() {
            log::debug!("[LIFECYCLE] Ignoring {:?} while hidden", action);
            return;
        }

        match action {
            UserAction::SetText(text) => {
                self.session.add_text(&text);
                self.refresh();
            }
            UserAction::SelectImages(paths) => {
                let selection = self.images.select_images(&paths);
                for image in selection.images {
                    if let Err(e) = self.session.add_image(image) {
                        self.surface.notify(&Notice::Rejected(e));
                    }
                }
                if !selection.failed.is_empty() {
                    self.surface.notify(&Notice::Warning(format!(
                        "The following files failed to load:\n{}",
                        selection.failed.join("\n")
                    )));
                }
                self.refresh();
            }
            UserAction::PasteImage => match self.images.paste_from_clipboard() {
                Ok(Some(image)) => {
                    if let Err(e) = self.session.add_image(image) {
                        self.surface.notify(&Notice::Rejected(e));
                    }
                    self.refresh();
                }
                Ok(None) => self.surface.notify(&Notice::Warning(
                    "Paste failed, no image data in clipboard".to_string(),
                )),
                Err(e) => self.surface.notify(&Notice::Rejected(e)),
            },
            UserAction::RemoveImage(index) => {
                self.session.remove_image(index);
                self.refresh();
            }
            UserAction::ClearImages => {
                if self.session.has_images() {
                    self.ask(Confirmation::ClearImages);
                }
            }
            UserAction::Submit => match validate(&self.session) {
                Ok(()) => {
                    log::info!("[LIFECYCLE] Submitting {}", self.session.summary());
                    let submission = self.session.snapshot();
                    self.finish(Outcome::Submitted(submission));
                }
                Err(violation) => {
                    log::debug!("[LIFECYCLE] Submit rejected: {}", violation);
                    self.surface
                        .notify(&Notice::Rejected(FeedbackError::ValidationFailed(violation)));
                }
            },
            UserAction::Cancel => {
                if self.session.is_empty() {
                    self.finish(Outcome::Cancelled {
                        reason: CANCEL_REASON.to_string(),
                    });
                } else {
                    self.ask(Confirmation::DiscardSession);
                }
            }
            UserAction::Confirm(yes) => {
                let Some(question) = self.pending_confirmation.take() else {
                    return;
                };
                match (question, yes) {
                    (Confirmation::DiscardSession, true) => self.finish(Outcome::Cancelled {
                        reason: CANCEL_REASON.to_string(),
                    }),
                    (Confirmation::ClearImages, true) => {
                        self.session.clear_images();
                        self.refresh();
                    }
                    (_, false) => self.refresh(),
                }
            }
        }
    }

    fn ask(&mut self, question: Confirmation) {
        self.pending_confirmation = Some(question);
        self.surface.request_confirmation(question);
    }

    fn on_timer(&mut self, cycle: CycleId) {
        if self.visible_cycle != Some(cycle) {
            log::debug!("[LIFECYCLE] Ignoring stale timer for cycle {}", cycle);
            return;
        }
        log::info!("[LIFECYCLE] Cycle {} timed out", cycle);
        self.finish(Outcome::TimedOut);
    }

    fn refresh(&mut self) {
        let view = self.view();
        self.surface.refresh(&view);
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    /// Terminal transition: stop the timer, hide, publish once.
    fn finish(&mut self, outcome: Outcome) {
        let Some(cycle) = self.visible_cycle.take() else {
            return;
        };
        self.cancel_timer();
        self.pending_confirmation = None;
        self.surface.hide();
        self.session = FeedbackSession::new();
        self.set_state(LifecycleState::Hidden);
        self.coordinator.publish(cycle, outcome);
    }
}
