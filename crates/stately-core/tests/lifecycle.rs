use std::cell::RefCell;
use std::rc::Rc;

use stately_core::prelude::*;

/// Owner type: the only place that can assign the counter.
struct Counter {
    notifier: StateNotifier<i64>,
}

impl Counter {
    fn new() -> Self {
        Self {
            notifier: StateNotifier::new(0),
        }
    }

    fn increment(&self) -> Result<(), StateError> {
        self.notifier.update(|v| v + 1)
    }

    fn listenable(&self) -> StateListenable<i64> {
        self.notifier.listenable()
    }

    fn current(&self) -> Result<i64, StateError> {
        self.notifier.state()
    }
}

#[test]
fn subscribe_update_unsubscribe_dispose() {
    let counter = Counter::new();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let remove = counter
        .listenable()
        .subscribe({
            let seen = seen.clone();
            move |v: &i64| {
                seen.borrow_mut().push(*v);
                Ok(())
            }
        })
        .unwrap();
    assert_eq!(*seen.borrow(), vec![0]);

    counter.increment().unwrap();
    assert_eq!(*seen.borrow(), vec![0, 1]);

    remove.remove();
    counter.increment().unwrap();
    assert_eq!(*seen.borrow(), vec![0, 1]);
    assert_eq!(counter.current().unwrap(), 2);

    counter.listenable().dispose().unwrap();
    assert!(matches!(
        counter.current(),
        Err(StateError::UseAfterDispose { .. })
    ));
    assert!(!counter.listenable().mounted());
}

#[test]
fn invocations_match_registrations_at_pass_start() {
    let counter = Counter::new();
    let listenable = counter.listenable();
    let calls = Rc::new(RefCell::new(Vec::new()));
    let mut removers = Vec::new();

    for id in 0..4 {
        let calls = calls.clone();
        removers.push(
            listenable
                .subscribe_with(
                    move |v: &i64| {
                        calls.borrow_mut().push((id, *v));
                        Ok(())
                    },
                    false,
                )
                .unwrap(),
        );
    }

    counter.increment().unwrap();
    removers[1].remove();
    removers[3].remove();
    removers[3].remove();
    counter.increment().unwrap();

    assert_eq!(
        *calls.borrow(),
        vec![(0, 1), (1, 1), (2, 1), (3, 1), (0, 2), (2, 2)]
    );
    assert_eq!(listenable.listener_count().unwrap(), 2);
}
