use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

new_key_type! {
    /// Stable handle to one registered listener.
    pub struct ListenerKey;
}

/// A state listener. Returning `Err` (or panicking) marks the call as failed.
pub type Listener<T> = Rc<dyn Fn(&T) -> anyhow::Result<()>>;

struct Node<T> {
    listener: Listener<T>,
    prev: Option<ListenerKey>,
    next: Option<ListenerKey>,
}

/// Insertion-ordered listener registry.
///
/// Nodes live in a slot map and are threaded into a doubly-linked list, so
/// appending and removing are O(1) and iteration follows registration order.
/// Keys are generational: a removed key never aliases a later entry, which
/// makes removal idempotent.
pub(crate) struct ListenerList<T> {
    nodes: SlotMap<ListenerKey, Node<T>>,
    head: Option<ListenerKey>,
    tail: Option<ListenerKey>,
}

impl<T> Default for ListenerList<T> {
    fn default() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            head: None,
            tail: None,
        }
    }
}

impl<T> ListenerList<T> {
    pub(crate) fn push_back(&mut self, listener: Listener<T>) -> ListenerKey {
        let prev = self.tail;
        let key = self.nodes.insert(Node {
            listener,
            prev,
            next: None,
        });
        match prev.and_then(|p| self.nodes.get_mut(p)) {
            Some(node) => node.next = Some(key),
            None => self.head = Some(key),
        }
        self.tail = Some(key);
        key
    }

    /// Unlinks `key`. Returns `false` if it was already gone.
    pub(crate) fn remove(&mut self, key: ListenerKey) -> bool {
        let Some(node) = self.nodes.remove(key) else {
            return false;
        };
        match node.prev.and_then(|p| self.nodes.get_mut(p)) {
            Some(prev) => prev.next = node.next,
            None => self.head = node.next,
        }
        match node.next.and_then(|n| self.nodes.get_mut(n)) {
            Some(next) => next.prev = node.prev,
            None => self.tail = node.prev,
        }
        true
    }

    pub(crate) fn contains(&self, key: ListenerKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Listeners in registration order, detached from the registry so they
    /// can be called while the registry is mutated.
    pub(crate) fn snapshot(&self) -> SmallVec<[(ListenerKey, Listener<T>); 4]> {
        let mut out = SmallVec::with_capacity(self.nodes.len());
        let mut cursor = self.head;
        while let Some(key) = cursor {
            let Some(node) = self.nodes.get(key) else {
                break;
            };
            out.push((key, node.listener.clone()));
            cursor = node.next;
        }
        out
    }
}

/// Returned by `subscribe`; removes the listener it was created for.
///
/// Clones share the same slot, so the removal runs at most once no matter
/// how many clones call [`RemoveListener::remove`]. Dropping the handle does
/// not unsubscribe.
#[derive(Clone)]
pub struct RemoveListener(Rc<RefCell<Option<Box<dyn FnOnce()>>>>);

impl RemoveListener {
    pub(crate) fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Rc::new(RefCell::new(Some(Box::new(f)))))
    }

    /// Removes the listener if it is still registered.
    pub fn remove(&self) {
        let pending = self.0.borrow_mut().take();
        if let Some(f) = pending {
            f()
        }
    }

    /// `true` once [`remove`](Self::remove) has run.
    pub fn is_spent(&self) -> bool {
        self.0.borrow().is_none()
    }
}

impl fmt::Debug for RemoveListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoveListener")
            .field("spent", &self.is_spent())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Listener<i32> {
        Rc::new(|_| Ok(()))
    }

    fn order(list: &ListenerList<i32>) -> Vec<ListenerKey> {
        list.snapshot().into_iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn keeps_registration_order() {
        let mut list = ListenerList::default();
        let a = list.push_back(noop());
        let b = list.push_back(noop());
        let c = list.push_back(noop());
        assert_eq!(order(&list), vec![a, b, c]);
    }

    #[test]
    fn unlinks_head_middle_and_tail() {
        let mut list = ListenerList::default();
        let a = list.push_back(noop());
        let b = list.push_back(noop());
        let c = list.push_back(noop());
        let d = list.push_back(noop());

        assert!(list.remove(b));
        assert_eq!(order(&list), vec![a, c, d]);
        assert!(list.remove(a));
        assert_eq!(order(&list), vec![c, d]);
        assert!(list.remove(d));
        assert_eq!(order(&list), vec![c]);

        let e = list.push_back(noop());
        assert_eq!(order(&list), vec![c, e]);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn stale_keys_are_ignored() {
        let mut list = ListenerList::default();
        let a = list.push_back(noop());
        assert!(list.remove(a));
        assert!(!list.remove(a));

        // The freed slot is reused, but the old key must not reach it.
        let b = list.push_back(noop());
        assert!(!list.remove(a));
        assert!(list.contains(b));
        assert!(!list.is_empty());
    }

    #[test]
    fn remove_listener_runs_once() {
        let runs = Rc::new(std::cell::Cell::new(0));
        let handle = RemoveListener::new({
            let runs = runs.clone();
            move || runs.set(runs.get() + 1)
        });
        let clone = handle.clone();

        handle.remove();
        clone.remove();
        handle.remove();

        assert_eq!(runs.get(), 1);
        assert!(clone.is_spent());
    }
}
