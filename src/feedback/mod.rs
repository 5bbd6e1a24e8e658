//! Feedback collection domain: public API.
//!
//! - **session**: FeedbackSession, ImageAttachment, Outcome
//! - **validate**: submission rules
//! - **coordinator**: single-slot publish/acquire handoff
//! - **lifecycle**: interaction thread, surface state machine, timer
//! - **service**: `collect_feedback` boundary used by the MCP layer

pub mod coordinator;
pub mod lifecycle;
pub mod service;
pub mod session;
pub mod validate;

pub use coordinator::{CollectionCoordinator, CycleId};
pub use lifecycle::{LifecycleState, SessionLifecycle};
pub use service::{FeedbackItem, FeedbackService};
pub use session::{FeedbackSession, ImageAttachment, Outcome, Submission};
pub use validate::{validate, Violation};
