//! Detachable progress callbacks.
//!
//! A [`Subscription`] is handed to a long-running operation; the caller keeps
//! a [`DetachHandle`] and may drop interest at any time (e.g. the user
//! navigates away). A `notify` that begins after `detach()` returns delivers
//! nothing. A `notify` already past its lookup when `detach()` runs on another
//! thread still completes its one delivery.

use parking_lot::Mutex;
use std::sync::Arc;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub struct Subscription<T> {
    slot: Arc<Mutex<Option<Callback<T>>>>,
}

impl<T> Subscription<T> {
    pub fn new(callback: impl Fn(&T) + Send + Sync + 'static) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(Arc::new(callback)))),
        }
    }

    /// A subscription nobody listens to.
    pub fn detached() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Deliver `value` if still attached. Returns whether it was delivered.
    ///
    /// The lock is released before the callback runs so a callback may
    /// detach its own subscription. A concurrent detach therefore does not
    /// interrupt a delivery that has already looked up the callback.
    pub fn notify(&self, value: &T) -> bool {
        let callback = self.slot.lock().clone();
        match callback {
            Some(cb) => {
                cb(value);
                true
            }
            None => false,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.slot.lock().is_some()
    }

    pub fn detach_handle(&self) -> DetachHandle<T> {
        DetachHandle {
            slot: Arc::clone(&self.slot),
        }
    }

    pub fn detach(&self) {
        self.slot.lock().take();
    }
}

impl<T> Clone for Subscription<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Caller-side half of a [`Subscription`].
pub struct DetachHandle<T> {
    slot: Arc<Mutex<Option<Callback<T>>>>,
}

impl<T> DetachHandle<T> {
    /// Idempotent.
    pub fn detach(&self) {
        self.slot.lock().take();
    }

    pub fn is_attached(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl<T> Clone for DetachHandle<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn delivers_until_detached() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let sub = Subscription::new(move |v: &u8| {
            c.fetch_add(*v as usize, Ordering::SeqCst);
        });
        let handle = sub.detach_handle();

        assert!(sub.notify(&2));
        assert!(sub.notify(&3));
        handle.detach();
        assert!(!sub.notify(&100));
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn detach_is_idempotent() {
        let sub = Subscription::new(|_: &()| {});
        let handle = sub.detach_handle();
        handle.detach();
        handle.detach();
        sub.detach();
        assert!(!handle.is_attached());
        assert!(!sub.is_attached());
    }

    #[test]
    fn detached_subscription_never_fires() {
        let sub: Subscription<u8> = Subscription::detached();
        assert!(!sub.notify(&1));
    }

    #[test]
    fn callback_may_detach_itself() {
        let own_handle: Arc<Mutex<Option<DetachHandle<u8>>>> = Arc::new(Mutex::new(None));
        let count = Arc::new(AtomicUsize::new(0));

        let (h, c) = (Arc::clone(&own_handle), Arc::clone(&count));
        let sub = Subscription::new(move |_: &u8| {
            c.fetch_add(1, Ordering::SeqCst);
            if let Some(handle) = h.lock().as_ref() {
                handle.detach();
            }
        });
        *own_handle.lock() = Some(sub.detach_handle());

        assert!(sub.notify(&0));
        assert!(!sub.notify(&0));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn detach_during_delivery_lets_it_finish() {
        let count = Arc::new(AtomicUsize::new(0));
        let entered = Arc::new(std::sync::Barrier::new(2));
        let release = Arc::new(std::sync::Barrier::new(2));

        let (c, e, r) = (Arc::clone(&count), Arc::clone(&entered), Arc::clone(&release));
        let sub = Subscription::new(move |_: &u8| {
            e.wait();
            r.wait();
            c.fetch_add(1, Ordering::SeqCst);
        });
        let handle = sub.detach_handle();
        let worker = {
            let sub = sub.clone();
            std::thread::spawn(move || sub.notify(&1))
        };

        entered.wait();
        handle.detach();
        release.wait();
        assert!(worker.join().unwrap());
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert!(!sub.notify(&2));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
