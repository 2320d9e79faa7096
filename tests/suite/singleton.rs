//! Process-wide counter tests
//!
//! Everything that touches `Counter::instance()` lives in the one test below:
//! the instance is shared by the whole test binary, so splitting these up
//! would let parallel tests observe each other's steps.

use std::sync::Mutex;
use std::thread;

use gatekeep_core::{AuditLog, Counter, FieldSelector, HandlerChain, MemorySink, Proxy};
use gatekeep_types::AlreadyConstructed;

#[test]
fn process_counter_is_single_and_loses_no_updates() {
    let first = Counter::instance();
    let start = first.count();

    // Every caller, on every thread, reaches the same state.
    let handles: Vec<_> = thread::scope(|scope| {
        let spawned: Vec<_> = (0..8)
            .map(|_| scope.spawn(Counter::instance))
            .collect();
        spawned.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(handles.iter().all(|h| h.same_instance(&first)));

    // Direct construction is refused once the instance exists.
    assert_eq!(Counter::construct().unwrap_err(), AlreadyConstructed);

    // Raw handles: 6 threads x 500 increments, 2 threads x 500 decrements.
    thread::scope(|scope| {
        for t in 0..8 {
            scope.spawn(move || {
                let counter = Counter::instance();
                for _ in 0..500 {
                    if t < 6 {
                        counter.increment();
                    } else {
                        counter.decrement();
                    }
                }
            });
        }
    });
    assert_eq!(first.count(), start + 2_000);

    // Guarded access through one shared proxy.
    let sink = MemorySink::new();
    let chain = HandlerChain::new().with(FieldSelector::Any, AuditLog::new(sink.clone()));
    let proxy = Mutex::new(Proxy::wrap(Counter::instance(), chain));
    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..100 {
                    proxy.lock().unwrap().increment().unwrap();
                }
            });
        }
    });
    assert_eq!(first.count(), start + 2_400);
    assert_eq!(sink.len(), 400);

    let mut proxy = proxy.into_inner().unwrap();
    let before = proxy.count().unwrap();
    proxy.increment().unwrap();
    proxy.increment().unwrap();
    proxy.increment().unwrap();
    proxy.decrement().unwrap();
    assert_eq!(proxy.count(), Some(before + 2));
}
