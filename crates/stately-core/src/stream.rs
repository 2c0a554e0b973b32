use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

use futures_core::Stream;

struct Shared<T> {
    queue: RefCell<VecDeque<T>>,
    closed: Cell<bool>,
    waker: RefCell<Option<Waker>>,
}

impl<T> Shared<T> {
    fn wake(&self) {
        let waker = self.waker.borrow_mut().take();
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// Fan-out of notified states to any number of [`StateStream`]s.
///
/// Streams are held weakly; the ones dropped by their consumer are pruned on
/// the next broadcast.
pub(crate) struct StreamHub<T> {
    subscribers: RefCell<Vec<Weak<Shared<T>>>>,
}

impl<T> Default for StreamHub<T> {
    fn default() -> Self {
        Self {
            subscribers: RefCell::new(Vec::new()),
        }
    }
}

impl<T> StreamHub<T> {
    pub(crate) fn close(&self) {
        let subs = std::mem::take(&mut *self.subscribers.borrow_mut());
        for shared in subs.iter().filter_map(Weak::upgrade) {
            shared.closed.set(true);
            shared.wake();
        }
    }
}

impl<T: Clone> StreamHub<T> {
    pub(crate) fn subscribe(&self) -> StateStream<T> {
        let shared = Rc::new(Shared {
            queue: RefCell::new(VecDeque::new()),
            closed: Cell::new(false),
            waker: RefCell::new(None),
        });
        self.subscribers.borrow_mut().push(Rc::downgrade(&shared));
        StateStream { shared }
    }

    pub(crate) fn broadcast(&self, value: &T) {
        let live: Vec<Rc<Shared<T>>> = {
            let mut subs = self.subscribers.borrow_mut();
            subs.retain(|w| w.strong_count() > 0);
            subs.iter().filter_map(Weak::upgrade).collect()
        };
        for shared in live {
            shared.queue.borrow_mut().push_back(value.clone());
            shared.wake();
        }
    }
}

/// Every state a notifier notified after this stream was created.
///
/// Values assigned without notification (filtered by the update predicate)
/// are not seen. Queued values are still yielded after `dispose`, then the
/// stream ends.
pub struct StateStream<T> {
    shared: Rc<Shared<T>>,
}

impl<T> StateStream<T> {
    /// Number of values waiting to be polled.
    pub fn pending(&self) -> usize {
        self.shared.queue.borrow().len()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.get()
    }
}

impl<T> Stream for StateStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let shared = &self.shared;
        if let Some(value) = shared.queue.borrow_mut().pop_front() {
            return Poll::Ready(Some(value));
        }
        if shared.closed.get() {
            return Poll::Ready(None);
        }
        *shared.waker.borrow_mut() = Some(cx.waker().clone());
        Poll::Pending
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let pending = self.pending();
        if self.is_closed() {
            (pending, Some(pending))
        } else {
            (pending, None)
        }
    }
}

impl<T> std::fmt::Debug for StateStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStream")
            .field("pending", &self.pending())
            .field("closed", &self.is_closed())
            .finish()
    }
}
