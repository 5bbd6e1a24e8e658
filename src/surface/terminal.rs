//! Plain-text surface on the controlling terminal.
//!
//! stdin/stdout belong to the MCP transport, so the surface opens the TTY
//! device directly. A reader thread turns typed lines into `UserAction`s:
//! ordinary lines accumulate into the feedback text, slash commands attach
//! images or end the session.

use crate::error::FeedbackError;
use crate::surface::{
    ActionSender, Confirmation, InteractionSurface, Notice, SessionView, UserAction,
};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

#[cfg(unix)]
const TTY_IN: &str = "/dev/tty";
#[cfg(unix)]
const TTY_OUT: &str = "/dev/tty";
#[cfg(windows)]
const TTY_IN: &str = "CONIN$";
#[cfg(windows)]
const TTY_OUT: &str = "CONOUT$";

const HELP: &str = "Type your feedback, then /submit. Commands:\n  \
    /image <path>...  attach image files\n  \
    /paste            attach the image on the clipboard\n  \
    /remove <n>       remove image number n\n  \
    /clear            remove all images\n  \
    /submit           send feedback\n  \
    /cancel           discard and close";

/// Line-reader state shared between the surface and its reader thread.
#[derive(Debug, Default)]
struct InputState {
    visible: bool,
    confirming: bool,
    draft: String,
}

/// What a typed line means.
#[derive(Debug, PartialEq, Eq)]
enum LineEffect {
    Action(UserAction),
    Help,
    Usage(&'static str),
    Nothing,
}

pub struct TerminalSurface {
    out: Option<File>,
    input: Arc<Mutex<InputState>>,
}

impl Default for TerminalSurface {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(input: &Mutex<InputState>) -> MutexGuard<'_, InputState> {
    input.lock().unwrap_or_else(|e| e.into_inner())
}

impl TerminalSurface {
    pub fn new() -> Self {
        Self {
            out: None,
            input: Arc::new(Mutex::new(InputState::default())),
        }
    }

    /// Check whether a terminal can be opened, without keeping it.
    pub fn probe() -> Result<(), FeedbackError> {
        open_tty().map(|_| ())
    }

    fn write(&mut self, text: &str) {
        if let Some(out) = self.out.as_mut() {
            if let Err(e) = writeln!(out, "{}", text).and_then(|_| out.flush()) {
                log::debug!("[SURFACE] Terminal write failed: {}", e);
            }
        }
    }
}

fn open_tty() -> Result<(File, File), FeedbackError> {
    let input = File::open(TTY_IN).map_err(|e| {
        FeedbackError::EnvironmentUnavailable(format!("cannot open terminal {}: {}", TTY_IN, e))
    })?;
    let output = OpenOptions::new().write(true).open(TTY_OUT).map_err(|e| {
        FeedbackError::EnvironmentUnavailable(format!("cannot open terminal {}: {}", TTY_OUT, e))
    })?;
    Ok((input, output))
}

/// Interpret one typed line against the current input state.
fn interpret_line(line: &str, state: &mut InputState) -> LineEffect {
    if !state.visible {
        return LineEffect::Nothing;
    }

    let trimmed = line.trim();
    if state.confirming {
        state.confirming = false;
        let yes = matches!(trimmed.to_lowercase().as_str(), "y" | "yes");
        return LineEffect::Action(UserAction::Confirm(yes));
    }

    let mut words = trimmed.split_whitespace();
    match words.next() {
        Some("/submit") => LineEffect::Action(UserAction::Submit),
        Some("/cancel") => LineEffect::Action(UserAction::Cancel),
        Some("/paste") => LineEffect::Action(UserAction::PasteImage),
        Some("/clear") => LineEffect::Action(UserAction::ClearImages),
        Some("/help") => LineEffect::Help,
        Some("/remove") => match words.next().and_then(|n| n.parse::<usize>().ok()) {
            Some(n) if n >= 1 => LineEffect::Action(UserAction::RemoveImage(n - 1)),
            _ => LineEffect::Usage("usage: /remove <n>  (n starts at 1)"),
        },
        Some("/image") => {
            let paths: Vec<PathBuf> = words.map(PathBuf::from).collect();
            if paths.is_empty() {
                LineEffect::Usage("usage: /image <path>...")
            } else {
                LineEffect::Action(UserAction::SelectImages(paths))
            }
        }
        _ => {
            if trimmed.is_empty() && state.draft.is_empty() {
                return LineEffect::Nothing;
            }
            if !state.draft.is_empty() {
                state.draft.push('\n');
            }
            state.draft.push_str(line.trim_end());
            LineEffect::Action(UserAction::SetText(state.draft.clone()))
        }
    }
}

fn read_lines(input: File, state: Arc<Mutex<InputState>>, actions: ActionSender) {
    let reader = BufReader::new(input);
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::warn!("[SURFACE] Terminal read failed: {}", e);
                break;
            }
        };
        match handle_line(&line, &state, &actions) {
            Some(effect) => write_hint(&effect),
            None => break,
        }
    }
    log::debug!("[SURFACE] Terminal reader exiting");
}

/// Interpret a line and queue its action before releasing the input lock,
/// so `hide` cannot slip in between and hand the action to the next cycle.
///
/// Returns the effect for hint output, or `None` once the lifecycle is gone.
fn handle_line(
    line: &str,
    state: &Mutex<InputState>,
    actions: &ActionSender,
) -> Option<LineEffect> {
    let mut guard = lock(state);
    match interpret_line(line, &mut guard) {
        LineEffect::Action(action) => {
            if actions.send(action) {
                Some(LineEffect::Nothing)
            } else {
                None
            }
        }
        other => Some(other),
    }
}

fn write_hint(effect: &LineEffect) {
    let text = match effect {
        LineEffect::Help => HELP,
        LineEffect::Usage(msg) => *msg,
        _ => return,
    };
    if let Ok(mut out) = OpenOptions::new().write(true).open(TTY_OUT) {
        let _ = writeln!(out, "{}", text);
    }
}

impl InteractionSurface for TerminalSurface {
    fn open(&mut self, actions: ActionSender) -> Result<(), FeedbackError> {
        let (input, output) = open_tty()?;
        let state = Arc::clone(&self.input);
        // The reader blocks on the TTY for the life of the process; it is
        // detached rather than joined.
        std::thread::Builder::new()
            .name("feedback-tty-reader".to_string())
            .spawn(move || read_lines(input, state, actions))
            .map_err(|e| FeedbackError::internal("spawn terminal reader", e))?;
        self.out = Some(output);
        log::info!("[SURFACE] Terminal surface opened on {}", TTY_OUT);
        Ok(())
    }

    fn present(&mut self, view: &SessionView) -> Result<(), FeedbackError> {
        {
            let mut state = lock(&self.input);
            state.visible = true;
            state.confirming = false;
            state.draft.clear();
        }
        self.write("");
        self.write("==== Feedback requested ====");
        self.write(HELP);
        if let Some(timeout) = view.timeout {
            self.write(&format!(
                "This request closes automatically in {} minutes",
                (timeout.as_secs() / 60).max(1)
            ));
        }
        Ok(())
    }

    fn refresh(&mut self, view: &SessionView) {
        let mut lines = vec![format!("[{}]", view.summary)];
        for (i, source) in view.image_sources.iter().enumerate() {
            lines.push(format!("  {}. {}", i + 1, source));
        }
        self.write(&lines.join("\n"));
    }

    fn hide(&mut self) {
        {
            let mut state = lock(&self.input);
            state.visible = false;
            state.confirming = false;
            state.draft.clear();
        }
        self.write("==== Feedback closed ====");
    }

    fn notify(&mut self, notice: &Notice) {
        self.write(&format!("! {}", notice));
    }

    fn request_confirmation(&mut self, question: Confirmation) {
        lock(&self.input).confirming = true;
        self.write(match question {
            Confirmation::DiscardSession => {
                "Are you sure you want to cancel? All entered content will be lost. [y/N]"
            }
            Confirmation::ClearImages => "Are you sure you want to clear all images? [y/N]",
        });
    }

    fn close(&mut self) {
        lock(&self.input).visible = false;
        self.out = None;
        log::info!("[SURFACE] Terminal surface closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visible() -> InputState {
        InputState {
            visible: true,
            ..Default::default()
        }
    }

    #[test]
    fn lines_accumulate_into_text() {
        let mut state = visible();
        assert_eq!(
            interpret_line("first line", &mut state),
            LineEffect::Action(UserAction::SetText("first line".to_string()))
        );
        assert_eq!(
            interpret_line("second", &mut state),
            LineEffect::Action(UserAction::SetText("first line\nsecond".to_string()))
        );
    }

    #[test]
    fn leading_blank_lines_are_skipped() {
        let mut state = visible();
        assert_eq!(interpret_line("   ", &mut state), LineEffect::Nothing);
        assert!(state.draft.is_empty());
    }

    #[test]
    fn commands_map_to_actions() {
        let mut state = visible();
        assert_eq!(
            interpret_line("/submit", &mut state),
            LineEffect::Action(UserAction::Submit)
        );
        assert_eq!(
            interpret_line("/remove 2", &mut state),
            LineEffect::Action(UserAction::RemoveImage(1))
        );
        assert!(matches!(
            interpret_line("/remove 0", &mut state),
            LineEffect::Usage(_)
        ));
        assert_eq!(
            interpret_line("/image a.png b.jpg", &mut state),
            LineEffect::Action(UserAction::SelectImages(vec![
                PathBuf::from("a.png"),
                PathBuf::from("b.jpg")
            ]))
        );
    }

    #[test]
    fn confirmation_consumes_next_line() {
        let mut state = visible();
        state.confirming = true;
        assert_eq!(
            interpret_line("Y", &mut state),
            LineEffect::Action(UserAction::Confirm(true))
        );
        state.confirming = true;
        assert_eq!(
            interpret_line("/submit", &mut state),
            LineEffect::Action(UserAction::Confirm(false))
        );
        assert!(!state.confirming);
    }

    #[test]
    fn input_is_ignored_while_hidden() {
        let mut state = InputState::default();
        assert_eq!(interpret_line("/submit", &mut state), LineEffect::Nothing);
        assert_eq!(interpret_line("hello", &mut state), LineEffect::Nothing);
    }

    #[test]
    fn action_is_queued_before_the_lock_is_released() {
        let (tx, rx) = std::sync::mpsc::channel();
        let actions = ActionSender::new(tx);
        let state = Mutex::new(visible());

        assert_eq!(
            handle_line("/submit", &state, &actions),
            Some(LineEffect::Nothing)
        );
        // Queued by the time the line is handled; hiding afterwards cannot
        // reorder it behind the next cycle's Show.
        assert!(matches!(
            rx.try_recv(),
            Ok(crate::feedback::lifecycle::Task::Action(UserAction::Submit))
        ));

        lock(&state).visible = false;
        assert_eq!(
            handle_line("/submit", &state, &actions),
            Some(LineEffect::Nothing)
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_lifecycle_stops_the_reader() {
        let (tx, rx) = std::sync::mpsc::channel();
        drop(rx);
        let actions = ActionSender::new(tx);
        let state = Mutex::new(visible());
        assert_eq!(handle_line("hello", &state, &actions), None);
        assert_eq!(handle_line("/help", &state, &actions), Some(LineEffect::Help));
    }
}
