//! Tests combining the barrier with the line status machine

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[test]
fn presentation_then_dismissal_cycle() {
    let barrier = CompletionBarrier::new();
    let status = Arc::new(Mutex::new(LineStatus::Running));
    let views = vec![Some("text"), Some("voice")];

    let mut presenting = Vec::new();
    let delivered_status = status.clone();
    barrier.broadcast(
        &views,
        |_, token| presenting.push(token),
        Box::new(move || {
            delivered_status.lock().unwrap().deliver();
        }),
    );

    // Player hurries the line while the voice is still playing
    assert_eq!(status.lock().unwrap().proceed(), ProceedEffect::Interrupt);
    for token in presenting {
        token.complete();
    }
    assert_eq!(*status.lock().unwrap(), LineStatus::Delivered);

    assert_eq!(status.lock().unwrap().proceed(), ProceedEffect::Dismiss);
    let resumed = Arc::new(AtomicUsize::new(0));
    let counter = resumed.clone();
    barrier.broadcast(
        &views,
        |_, token| token.complete(),
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );

    assert_eq!(*status.lock().unwrap(), LineStatus::Ended);
    assert_eq!(resumed.load(Ordering::SeqCst), 1);
}

#[test]
fn forced_dismissal_ignores_late_presentation_tokens() {
    let barrier = CompletionBarrier::new();
    let mut status = LineStatus::Running;
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = delivered.clone();

    let mut presenting = Vec::new();
    barrier.broadcast(
        &[Some(())],
        |_, token| presenting.push(token),
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );

    assert_eq!(status.proceed(), ProceedEffect::Interrupt);
    assert_eq!(status.proceed(), ProceedEffect::Dismiss);

    let mut dismissing = Vec::new();
    barrier.broadcast(&[Some(())], |_, token| dismissing.push(token), Box::new(|| {}));

    presenting.pop().unwrap().complete();
    assert_eq!(delivered.load(Ordering::SeqCst), 0);
    assert_eq!(barrier.pending(), 1);

    dismissing.pop().unwrap().complete();
    assert!(barrier.is_idle());
}
