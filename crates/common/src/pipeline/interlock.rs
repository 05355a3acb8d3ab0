//! Notification interlock
//!
//! One process-wide lock guards the "notifications enabled" flag read by
//! [`ArticleEvents`](super::ArticleEvents). Internal saves made by the
//! linker and indexer run inside [`Interlock::with_suspended_notifications`]
//! so they never re-trigger the processing chain that led to them.
//!
//! The lock is global, not per article: only one suspended section runs
//! at a time, so sections must stay as short as a single save.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::trace;

pub struct Interlock {
    lock: Mutex<()>,
    notifications_enabled: AtomicBool,
}

/// Re-enables notifications when dropped
struct Suspension<'a> {
    flag: &'a AtomicBool,
}

impl<'a> Suspension<'a> {
    fn begin(flag: &'a AtomicBool) -> Self {
        flag.store(false, Ordering::SeqCst);
        trace!("Article save notifications suspended");
        Self { flag }
    }
}

impl Drop for Suspension<'_> {
    fn drop(&mut self) {
        self.flag.store(true, Ordering::SeqCst);
        trace!("Article save notifications resumed");
    }
}

impl Interlock {
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            notifications_enabled: AtomicBool::new(true),
        }
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications_enabled.load(Ordering::SeqCst)
    }

    /// Acquire the lock, disable notifications, run `section`, re-enable
    /// notifications, release the lock.
    ///
    /// Re-enabling and releasing happen on every exit path: an error
    /// result, a panic, or the returned future being dropped mid-way.
    pub async fn with_suspended_notifications<F, Fut, T>(&self, section: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.lock.lock().await;
        // declared after the guard so it drops first
        let _suspension = Suspension::begin(&self.notifications_enabled);
        section().await
    }

    /// Run `section` holding the lock with notifications left enabled.
    ///
    /// Article creation runs here so that it can never interleave with a
    /// suspended section and lose its own notifications.
    pub async fn exclusive<F, Fut, T>(&self, section: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.lock.lock().await;
        section().await
    }
}

impl Default for Interlock {
    fn default() -> Self {
        Self::new()
    }
}
