//! Refresh cadence driven by user activity.
//!
//! Two states: **Active** (initial) and **Idle**. With no qualifying input
//! for 30 seconds the monitor goes Idle and polls the booking collection
//! once per minute; any input cancels the poll timer, triggers one
//! immediate booking/user/boat refresh, and returns to Active. While the
//! session is required and absent, nothing is refreshed at all.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::ports::Clock;

pub const IDLE_AFTER: Duration = Duration::from_secs(30);
pub const POLL_PERIOD: Duration = Duration::from_secs(60);

/// Input that counts as user activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    PointerDown,
    KeyDown,
    TouchStart,
    Focus,
}

/// What the monitor drives. Implemented by [`crate::client::FleetClient`];
/// tests substitute a recording fake.
pub trait Refresh: Clone + Send + Sync + 'static {
    fn refresh_bookings(&self) -> impl Future<Output = ()> + Send;
    fn refresh_active(&self) -> impl Future<Output = ()> + Send;
    fn polling_allowed(&self) -> bool;
}

pub struct ActivityMonitor<C> {
    clock: C,
}

impl<C: Clock> ActivityMonitor<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    /// Run the state machine until the event channel closes or the handle
    /// is aborted.
    pub fn spawn<R: Refresh>(
        self,
        events: mpsc::Receiver<InputEvent>,
        refresher: R,
    ) -> MonitorHandle {
        let handle = tokio::spawn(run(self.clock, events, refresher));
        MonitorHandle { handle }
    }
}

pub struct MonitorHandle {
    handle: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Deterministic teardown: stop polling immediately.
    pub fn abort(&self) {
        self.handle.abort();
    }

    #[cfg(test)]
    pub(crate) async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.handle.await
    }
}

async fn run<C, R>(clock: C, mut events: mpsc::Receiver<InputEvent>, refresher: R)
where
    C: Clock,
    R: Refresh,
{
    loop {
        // Active: every qualifying event restarts the idle window.
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(_) => continue,
                    None => return,
                },
                () = clock.sleep(IDLE_AFTER) => break,
            }
        }
        tracing::debug!("input idle, polling bookings");
        // Idle: poll bookings until input returns.
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(_) => {
                        if refresher.polling_allowed() {
                            refresher.refresh_active().await;
                        }
                        break;
                    }
                    None => return,
                },
                () = clock.sleep(POLL_PERIOD) => {
                    if refresher.polling_allowed() {
                        refresher.refresh_bookings().await;
                    }
                }
            }
        }
        tracing::debug!("input resumed");
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};
    use time::OffsetDateTime;
    use time::format_description::well_known::Rfc3339;
    use tokio::sync::oneshot;

    #[derive(Clone)]
    struct ManualClock {
        now: OffsetDateTime,
        sleeps: Arc<Mutex<Vec<oneshot::Sender<()>>>>,
        durations: Arc<Mutex<Vec<Duration>>>,
    }

    impl ManualClock {
        fn new() -> Self {
            let now = OffsetDateTime::parse("2025-01-12T09:30:00Z", &Rfc3339).expect("parse now");
            Self {
                now,
                sleeps: Arc::new(Mutex::new(Vec::new())),
                durations: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn sleep_durations(&self) -> Vec<Duration> {
            self.durations.lock().expect("durations lock").clone()
        }

        fn trigger_all(&self) {
            let mut sends = self.sleeps.lock().expect("sleeps lock");
            for sender in sends.drain(..) {
                let _ = sender.send(());
            }
        }
    }

    struct ManualSleep {
        receiver: oneshot::Receiver<()>,
    }

    impl Future for ManualSleep {
        type Output = ();

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
            match Pin::new(&mut self.receiver).poll(cx) {
                Poll::Ready(_) => Poll::Ready(()),
                Poll::Pending => Poll::Pending,
            }
        }
    }

    impl Clock for ManualClock {
        type Sleep<'a> = ManualSleep;

        fn now(&self) -> OffsetDateTime {
            self.now
        }

        fn sleep<'a>(&'a self, duration: Duration) -> Self::Sleep<'a> {
            let (sender, receiver) = oneshot::channel();
            self.durations
                .lock()
                .expect("durations lock")
                .push(duration);
            self.sleeps.lock().expect("sleeps lock").push(sender);
            ManualSleep { receiver }
        }
    }

    #[derive(Clone)]
    struct FakeRefresher {
        calls: mpsc::UnboundedSender<&'static str>,
        allowed: Arc<AtomicBool>,
    }

    impl FakeRefresher {
        fn new(allowed: bool) -> (Self, mpsc::UnboundedReceiver<&'static str>) {
            let (calls, receiver) = mpsc::unbounded_channel();
            (
                Self {
                    calls,
                    allowed: Arc::new(AtomicBool::new(allowed)),
                },
                receiver,
            )
        }
    }

    impl Refresh for FakeRefresher {
        async fn refresh_bookings(&self) {
            let _ = self.calls.send("bookings");
        }

        async fn refresh_active(&self) {
            let _ = self.calls.send("active");
        }

        fn polling_allowed(&self) -> bool {
            self.allowed.load(Ordering::SeqCst)
        }
    }

    async fn settle() {
        for _ in 0..32 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn monitor__should_go_idle_and_poll_bookings_once_per_period() {
        // Given
        let clock = ManualClock::new();
        let (refresher, mut calls) = FakeRefresher::new(true);
        let (_events, receiver) = mpsc::channel(8);
        let handle = ActivityMonitor::new(clock.clone()).spawn(receiver, refresher);

        // Then: the monitor starts Active and arms the 30 s idle window.
        settle().await;
        assert_eq!(clock.sleep_durations(), vec![IDLE_AFTER]);

        // When: the window elapses.
        clock.trigger_all();
        settle().await;

        // Then: Idle, with a 60 s poll timer armed and no refresh yet.
        assert_eq!(clock.sleep_durations(), vec![IDLE_AFTER, POLL_PERIOD]);
        assert!(calls.try_recv().is_err());

        // When: a poll period elapses.
        clock.trigger_all();

        // Then: exactly one booking refresh, and the next timer armed.
        assert_eq!(calls.recv().await, Some("bookings"));
        settle().await;
        assert_eq!(
            clock.sleep_durations(),
            vec![IDLE_AFTER, POLL_PERIOD, POLL_PERIOD]
        );
        assert!(calls.try_recv().is_err());
        assert!(!handle.is_finished());
    }

    #[tokio::test]
    async fn monitor__should_wake_on_input_and_refresh_the_active_set() {
        // Given: a monitor that has gone idle.
        let clock = ManualClock::new();
        let (refresher, mut calls) = FakeRefresher::new(true);
        let (events, receiver) = mpsc::channel(8);
        let handle = ActivityMonitor::new(clock.clone()).spawn(receiver, refresher);
        settle().await;
        clock.trigger_all();
        settle().await;
        assert_eq!(clock.sleep_durations(), vec![IDLE_AFTER, POLL_PERIOD]);

        // When
        events.send(InputEvent::PointerDown).await.expect("send");

        // Then: one immediate multi-collection refresh, poll timer gone,
        // idle window re-armed.
        assert_eq!(calls.recv().await, Some("active"));
        settle().await;
        assert_eq!(
            clock.sleep_durations(),
            vec![IDLE_AFTER, POLL_PERIOD, IDLE_AFTER]
        );
        assert!(calls.try_recv().is_err());

        // When: the event source closes.
        drop(events);
        settle().await;

        // Then: the monitor ends.
        handle.join().await.expect("join monitor");
    }

    #[tokio::test]
    async fn monitor__should_restart_the_idle_window_on_input_while_active() {
        // Given
        let clock = ManualClock::new();
        let (refresher, mut calls) = FakeRefresher::new(true);
        let (events, receiver) = mpsc::channel(8);
        let _handle = ActivityMonitor::new(clock.clone()).spawn(receiver, refresher);
        settle().await;

        // When: input arrives while still Active.
        events.send(InputEvent::KeyDown).await.expect("send");
        settle().await;

        // Then: no refresh, just a fresh 30 s window.
        assert!(calls.try_recv().is_err());
        assert_eq!(clock.sleep_durations(), vec![IDLE_AFTER, IDLE_AFTER]);
    }

    #[tokio::test]
    async fn monitor__should_not_refresh_while_unauthenticated() {
        // Given: polling is not allowed.
        let clock = ManualClock::new();
        let (refresher, mut calls) = FakeRefresher::new(false);
        let (events, receiver) = mpsc::channel(8);
        let _handle = ActivityMonitor::new(clock.clone()).spawn(receiver, refresher);
        settle().await;
        clock.trigger_all();
        settle().await;

        // When: a poll period elapses and input arrives.
        clock.trigger_all();
        settle().await;
        events.send(InputEvent::Focus).await.expect("send");
        settle().await;

        // Then: never a refresh, but the machine kept moving (back to
        // Active with a fresh idle window).
        assert!(calls.try_recv().is_err());
        assert_eq!(
            clock.sleep_durations().last().copied(),
            Some(IDLE_AFTER)
        );
    }

    #[tokio::test]
    async fn monitor__should_stop_on_abort() {
        // Given
        let clock = ManualClock::new();
        let (refresher, _calls) = FakeRefresher::new(true);
        let (_events, receiver) = mpsc::channel(8);
        let handle = ActivityMonitor::new(clock.clone()).spawn(receiver, refresher);
        settle().await;

        // When
        handle.abort();
        settle().await;

        // Then
        assert!(handle.is_finished());
    }
}
