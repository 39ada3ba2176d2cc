use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::kind::ErrorKind;

/// How long an error or success message stays visible.
pub const DEFAULT_CLEAR_AFTER: Duration = Duration::from_millis(3000);

/// UI-facing state of one logical operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Status {
    pub loading: bool,
    pub error: Option<String>,
    pub message: Option<String>,
}

impl Status {
    pub fn is_idle(&self) -> bool {
        !self.loading && self.error.is_none() && self.message.is_none()
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Error,
    Message,
}

struct Inner {
    status: Status,
    last_token: u64,
    /// Token of the call that last set each field; a timer only clears a
    /// field whose token still matches its own.
    error_token: Option<u64>,
    message_token: Option<u64>,
    timers: Vec<JoinHandle<()>>,
    disposed: bool,
    tx: watch::Sender<Status>,
}

impl Inner {
    fn next_token(&mut self) -> u64 {
        self.last_token += 1;
        self.last_token
    }

    fn publish(&self) {
        self.tx.send_replace(self.status.clone());
    }

    fn abort_timers(&mut self) {
        for timer in self.timers.drain(..) {
            timer.abort();
        }
    }

    fn expire(&mut self, field: Field, token: u64) -> bool {
        match field {
            Field::Error if self.error_token == Some(token) => {
                self.status.error = None;
                self.error_token = None;
                true
            }
            Field::Message if self.message_token == Some(token) => {
                self.status.message = None;
                self.message_token = None;
                true
            }
            _ => false,
        }
    }
}

/// Loading/error/success indicator for a single logical operation.
///
/// Errors and success messages clear themselves after a fixed window.
/// Every `succeed`/`fail` arms its own timer tagged with a fresh token, so a
/// timer left over from an earlier call never clears a newer value. The last
/// of `succeed`/`fail` wins: each drops whatever the other left showing.
/// `loading` is only changed by explicit calls.
///
/// Timers run on the ambient tokio runtime. Outside a runtime the fields are
/// still set but stay until the next transition.
pub struct StatusController {
    inner: Arc<Mutex<Inner>>,
    clear_after: Duration,
}

impl Default for StatusController {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusController {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Status::default());
        Self {
            inner: Arc::new(Mutex::new(Inner {
                status: Status::default(),
                last_token: 0,
                error_token: None,
                message_token: None,
                timers: Vec::new(),
                disposed: false,
                tx,
            })),
            clear_after: DEFAULT_CLEAR_AFTER,
        }
    }

    pub fn with_clear_after(mut self, clear_after: Duration) -> Self {
        self.clear_after = clear_after;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state.
    pub fn snapshot(&self) -> Status {
        self.lock().status.clone()
    }

    /// Receiver that observes every transition, including timer clears.
    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.lock().tx.subscribe()
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    /// Mark the operation as running. Error and message are left alone.
    pub fn begin(&self) {
        let mut inner = self.lock();
        if inner.disposed {
            return;
        }
        inner.status.loading = true;
        inner.publish();
    }

    /// Mark the operation as running and drop any previous error or message.
    pub fn begin_and_clear(&self) {
        let mut inner = self.lock();
        if inner.disposed {
            return;
        }
        inner.status = Status {
            loading: true,
            error: None,
            message: None,
        };
        inner.error_token = None;
        inner.message_token = None;
        inner.publish();
    }

    /// Stop loading without reporting anything.
    pub fn settle(&self) {
        let mut inner = self.lock();
        if inner.disposed {
            return;
        }
        inner.status.loading = false;
        inner.publish();
    }

    pub fn succeed(&self, message: impl Into<String>) {
        let mut inner = self.lock();
        if inner.disposed {
            debug!("Ignoring success on disposed status");
            return;
        }
        let token = inner.next_token();
        inner.status.loading = false;
        inner.status.message = Some(message.into());
        inner.message_token = Some(token);
        inner.status.error = None;
        inner.error_token = None;
        self.arm(&mut inner, Field::Message, token);
        inner.publish();
    }

    pub fn fail(&self, kind: ErrorKind, detail: impl AsRef<str>) {
        let mut inner = self.lock();
        if inner.disposed {
            debug!(?kind, "Ignoring failure on disposed status");
            return;
        }
        let token = inner.next_token();
        inner.status.loading = false;
        inner.status.error = Some(kind.describe(detail.as_ref()));
        inner.error_token = Some(token);
        inner.status.message = None;
        inner.message_token = None;
        self.arm(&mut inner, Field::Error, token);
        inner.publish();
    }

    /// Back to idle immediately, cancelling pending clears.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.abort_timers();
        inner.status = Status::default();
        inner.error_token = None;
        inner.message_token = None;
        inner.publish();
    }

    /// Reset and stop accepting transitions. Used when the owner goes away
    /// while an operation may still complete.
    pub fn dispose(&self) {
        self.reset();
        self.lock().disposed = true;
    }

    fn arm(&self, inner: &mut Inner, field: Field, token: u64) {
        inner.timers.retain(|timer| !timer.is_finished());

        let Ok(handle) = Handle::try_current() else {
            warn!(?field, "No tokio runtime, status will not auto-clear");
            return;
        };

        let shared = Arc::clone(&self.inner);
        let delay = self.clear_after;
        inner.timers.push(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let mut inner = shared.lock().unwrap_or_else(PoisonError::into_inner);
            if inner.expire(field, token) {
                debug!(?field, token, "Status auto-cleared");
                inner.publish();
            }
        }));
    }
}

impl Drop for StatusController {
    fn drop(&mut self) {
        self.lock().abort_timers();
    }
}

impl std::fmt::Debug for StatusController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusController")
            .field("status", &self.snapshot())
            .field("clear_after", &self.clear_after)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_new_controller_is_idle() {
        let status = StatusController::new();
        assert!(status.snapshot().is_idle());
    }

    #[test]
    fn test_begin_is_idempotent_and_keeps_messages() {
        let status = StatusController::new();
        status.succeed("Saved");
        status.begin();
        status.begin();

        let snap = status.snapshot();
        assert!(snap.loading);
        assert_eq!(snap.message.as_deref(), Some("Saved"));
    }

    #[test]
    fn test_begin_and_clear_drops_previous_feedback() {
        let status = StatusController::new();
        status.fail(ErrorKind::NotFound, "user 3");
        status.succeed("Saved");
        status.begin_and_clear();

        assert_eq!(
            status.snapshot(),
            Status {
                loading: true,
                error: None,
                message: None
            }
        );
    }

    #[test]
    fn test_without_runtime_fields_are_set_but_not_cleared() {
        let status = StatusController::new();
        status.begin();
        status.fail(ErrorKind::Validation, "name is required");

        let snap = status.snapshot();
        assert!(!snap.loading);
        assert_eq!(snap.error.as_deref(), Some("Invalid request: name is required"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeed_sets_message_then_clears() {
        let status = StatusController::new();
        status.begin();
        status.succeed("Users fetched");

        let snap = status.snapshot();
        assert!(!snap.loading);
        assert_eq!(snap.message.as_deref(), Some("Users fetched"));

        sleep(ms(2900)).await;
        assert_eq!(status.snapshot().message.as_deref(), Some("Users fetched"));

        sleep(ms(200)).await;
        assert_eq!(status.snapshot().message, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_is_never_auto_cleared() {
        let status = StatusController::new();
        status.succeed("Done");
        status.begin();

        sleep(ms(5000)).await;
        let snap = status.snapshot();
        assert!(snap.loading);
        assert_eq!(snap.message, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_then_succeed_settles_on_latest_message() {
        let status = StatusController::new();
        status.fail(ErrorKind::Remote, "A");
        status.succeed("B");

        let snap = status.snapshot();
        assert_eq!(snap.message.as_deref(), Some("B"));
        assert_eq!(snap.error, None);

        // A's timer shares B's deadline; sample until just before it
        for _ in 0..29 {
            sleep(ms(100)).await;
            let snap = status.snapshot();
            assert_eq!(snap.message.as_deref(), Some("B"));
            assert_eq!(snap.error, None);
        }

        sleep(ms(200)).await;
        assert!(status.snapshot().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeed_then_fail_shows_only_the_error() {
        let status = StatusController::new();
        status.succeed("Saved");
        sleep(ms(1000)).await;
        status.fail(ErrorKind::NotFound, "user 3");

        let snap = status.snapshot();
        assert_eq!(snap.message, None);
        assert_eq!(snap.error.as_deref(), Some("Not found: user 3"));

        // Saved's timer fires at 3000 and must not touch the error
        sleep(ms(2500)).await;
        assert_eq!(status.snapshot().error.as_deref(), Some("Not found: user 3"));

        sleep(ms(600)).await;
        assert!(status.snapshot().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_does_not_clear_newer_message() {
        let status = StatusController::new();
        status.succeed("first");
        sleep(ms(2000)).await;
        status.succeed("second");

        // first's timer fires at 3000 and must leave "second" alone
        sleep(ms(1500)).await;
        assert_eq!(status.snapshot().message.as_deref(), Some("second"));

        sleep(ms(1600)).await;
        assert_eq!(status.snapshot().message, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replaced_error_timer_leaves_newer_error() {
        let status = StatusController::new();
        status.fail(ErrorKind::CacheWrite, "");
        sleep(ms(2000)).await;
        status.fail(ErrorKind::Remote, "timeout");

        sleep(ms(1500)).await;
        assert_eq!(status.snapshot().error.as_deref(), Some("Error: timeout"));

        sleep(ms(1600)).await;
        assert_eq!(status.snapshot().error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_cancels_pending_clears() {
        let status = StatusController::new();
        status.succeed("old");
        status.reset();
        assert!(status.snapshot().is_idle());

        sleep(ms(1000)).await;
        status.succeed("new");

        // old's timer would have fired at 3000
        sleep(ms(2500)).await;
        assert_eq!(status.snapshot().message.as_deref(), Some("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_clear_window() {
        let status = StatusController::new().with_clear_after(ms(500));
        status.succeed("quick");
        sleep(ms(600)).await;
        assert_eq!(status.snapshot().message, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_ignores_later_transitions() {
        let status = StatusController::new();
        status.succeed("before");
        status.dispose();

        status.begin();
        status.succeed("after");
        status.fail(ErrorKind::Remote, "after");

        assert!(status.is_disposed());
        assert!(status.snapshot().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_transitions_and_clears() {
        let status = StatusController::new();
        let mut rx = status.subscribe();

        status.begin();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().loading);

        status.succeed("ok");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().message.as_deref(), Some("ok"));

        // Woken by the auto-clear
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().message, None);
    }
}
