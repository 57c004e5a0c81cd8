use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

pub(crate) type SubscriptionId = u64;

type Listener = Rc<dyn Fn()>;

/// Listeners notified after a batch of edits becomes observable.
#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    listeners: RefCell<Vec<(SubscriptionId, Listener)>>,
    next_id: Cell<SubscriptionId>,
}

impl SubscriberRegistry {
    pub(crate) fn register(&self, listener: Listener) -> SubscriptionId {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    pub(crate) fn cancel(&self, id: SubscriptionId) {
        self.listeners
            .borrow_mut()
            .retain(|(listener_id, _)| *listener_id != id);
    }

    pub(crate) fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub(crate) fn notify(&self) {
        // Listeners may subscribe or unsubscribe while running.
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener();
        }
    }
}

/// Handle returned by `Document::subscribe`. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    registry: Weak<SubscriberRegistry>,
    id: Option<SubscriptionId>,
}

impl Subscription {
    pub(crate) fn new(registry: &Rc<SubscriberRegistry>, id: SubscriptionId) -> Self {
        Self {
            registry: Rc::downgrade(registry),
            id: Some(id),
        }
    }

    /// Whether the listener is still registered with a live document.
    pub fn is_active(&self) -> bool {
        let Some(id) = self.id else {
            return false;
        };
        self.registry.upgrade().is_some_and(|registry| {
            registry
                .listeners
                .borrow()
                .iter()
                .any(|(listener_id, _)| *listener_id == id)
        })
    }

    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(id) = self.id.take() {
            if let Some(registry) = self.registry.upgrade() {
                registry.cancel(id);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
