//! End-to-end collection cycles through `FeedbackService` with a scripted
//! surface: reuse across cycles, timeouts, cancellation and single-flight.

mod common;

use common::{CannedImages, Script, ScriptedSurface};
use feedback_collector_lib::config::Settings;
use feedback_collector_lib::error::FeedbackError;
use feedback_collector_lib::feedback::{FeedbackItem, FeedbackService, LifecycleState};
use feedback_collector_lib::surface::UserAction;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn service(script: &Script) -> FeedbackService {
    FeedbackService::new(
        Settings::default(),
        Box::new(ScriptedSurface::new(script.clone())),
        Box::new(CannedImages),
    )
}

fn text(s: &str) -> UserAction {
    UserAction::SetText(s.to_string())
}

#[test]
fn surface_is_opened_once_across_many_cycles() {
    let script = Script::default();
    for i in 0..5 {
        script.push(vec![text(&format!("round {}", i)), UserAction::Submit]);
    }
    let service = service(&script);

    for i in 0..5 {
        let items = service.collect_feedback(30).unwrap();
        assert_eq!(
            items,
            vec![FeedbackItem::Text(format!("User text feedback: round {}", i))]
        );
        assert_eq!(service.lifecycle().state(), LifecycleState::Hidden);
    }

    assert_eq!(script.opens(), 1);
    assert_eq!(script.presents(), 5);
    assert_eq!(service.lifecycle().surface_opens(), 1);
}

#[test]
fn text_and_images_come_back_in_order() {
    let script = Script::default();
    script.push(vec![
        text("looks wrong"),
        UserAction::SelectImages(vec![PathBuf::from("a.png"), PathBuf::from("b.png")]),
        UserAction::PasteImage,
        UserAction::RemoveImage(1),
        UserAction::Submit,
    ]);
    let service = service(&script);

    let items = service.collect_feedback(30).unwrap();
    assert_eq!(
        items,
        vec![
            FeedbackItem::Text("User text feedback: looks wrong".to_string()),
            FeedbackItem::Image {
                data: b"a.png".to_vec(),
                mime_type: "image/png"
            },
            FeedbackItem::Image {
                data: b"clip".to_vec(),
                mime_type: "image/png"
            },
        ]
    );
}

#[test]
fn empty_submit_keeps_the_session_open() {
    let script = Script::default();
    script.push(vec![UserAction::Submit, text("second try"), UserAction::Submit]);
    let service = service(&script);

    let items = service.collect_feedback(30).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(script.notices.lock().unwrap().len(), 1);
}

#[test]
fn unanswered_session_times_out() {
    let script = Script::default();
    script.push(vec![]);
    let service = service(&script);

    let started = Instant::now();
    let err = service.collect_feedback(1).unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err, FeedbackError::Timeout(1));
    assert!(elapsed >= Duration::from_millis(900), "{:?}", elapsed);
    assert!(elapsed < Duration::from_secs(5), "{:?}", elapsed);
}

#[test]
fn huge_timeout_behaves_like_no_timeout() {
    let script = Script::default();
    script.push(vec![text("eventually"), UserAction::Submit]);
    let service = service(&script);

    let items = service.collect_feedback(i64::MAX).unwrap();
    assert_eq!(
        items,
        vec![FeedbackItem::Text("User text feedback: eventually".to_string())]
    );
    assert_eq!(service.lifecycle().state(), LifecycleState::Hidden);
}

#[test]
fn next_cycle_is_not_polluted_by_a_timed_out_one() {
    let script = Script::default();
    script.push(vec![text("too late")]);
    script.push(vec![text("fresh"), UserAction::Submit]);
    let service = service(&script);

    assert_eq!(
        service.collect_feedback(1).unwrap_err(),
        FeedbackError::Timeout(1)
    );
    let items = service.collect_feedback(30).unwrap();
    assert_eq!(
        items,
        vec![FeedbackItem::Text("User text feedback: fresh".to_string())]
    );
}

#[test]
fn confirmed_cancel_is_user_cancelled() {
    let script = Script::default();
    script.push(vec![text("never mind"), UserAction::Cancel]);
    let service = service(&script);

    let err = service.collect_feedback(30).unwrap_err();
    assert!(matches!(err, FeedbackError::UserCancelled(_)));
    assert_eq!(service.lifecycle().state(), LifecycleState::Hidden);
}

#[test]
fn concurrent_call_is_rejected_as_busy() {
    let script = Script::default();
    script.push(vec![]);
    let service = Arc::new(service(&script));

    let first = {
        let service = Arc::clone(&service);
        std::thread::spawn(move || service.collect_feedback(1))
    };

    let deadline = Instant::now() + Duration::from_secs(5);
    while service.lifecycle().state() != LifecycleState::Visible {
        assert!(Instant::now() < deadline, "first call never became visible");
        std::thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(service.collect_feedback(1).unwrap_err(), FeedbackError::Busy);
    assert_eq!(
        first.join().unwrap().unwrap_err(),
        FeedbackError::Timeout(1)
    );
}

#[test]
fn unavailable_environment_is_reported_and_not_retried() {
    let script = Script::default();
    let service = FeedbackService::new(
        Settings::default(),
        Box::new(ScriptedSurface::unavailable(script.clone())),
        Box::new(CannedImages),
    );

    for _ in 0..2 {
        let err = service.collect_feedback(30).unwrap_err();
        assert!(matches!(err, FeedbackError::EnvironmentUnavailable(_)));
    }
    assert_eq!(script.opens(), 1);
}

#[test]
fn shutdown_closes_the_surface_once() {
    let script = Script::default();
    script.push(vec![text("hi"), UserAction::Submit]);
    let service = service(&script);

    service.collect_feedback(30).unwrap();
    service.shutdown();
    service.shutdown();

    assert_eq!(script.closes(), 1);
    assert_eq!(service.lifecycle().state(), LifecycleState::Destroyed);
}
