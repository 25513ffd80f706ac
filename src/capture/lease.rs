//! Bounded-lifetime ownership of a capture session.
//!
//! A [`SessionLease`] takes the session into a background task that
//! releases it when the deadline passes. The handle can push the
//! deadline out, release early, take the session back, or wait for
//! the release to happen.

use super::session::CaptureSession;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

/// Deadline used when the requested duration overflows the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Why a leased session was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseReason {
    /// The lease deadline passed.
    Expired,
    /// The holder asked for an early release.
    Explicit,
}

/// Outcome of a completed lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRecord {
    pub session_id: u64,
    pub reason: ReleaseReason,
    pub tracks_stopped: usize,
    /// Time between acquisition and release.
    pub held_for: Duration,
}

/// Current state of a lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseState {
    Armed,
    Released(ReleaseReason),
    /// The timer was disarmed and the session handed back.
    Cancelled,
}

#[derive(Debug, Clone)]
struct LeaseStatus {
    state: LeaseState,
    deadline: Instant,
    record: Option<ReleaseRecord>,
}

enum Command {
    Extend(Duration),
    ReleaseNow,
    Cancel(oneshot::Sender<CaptureSession>),
}

/// Handle to a session held by a release timer.
///
/// Dropping the handle leaves the timer running.
#[derive(Debug)]
pub struct SessionLease {
    session_id: u64,
    armed_at: Instant,
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<LeaseStatus>,
}

impl SessionLease {
    /// Takes ownership of `session` and releases it after `duration`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(session: CaptureSession, duration: Duration) -> Self {
        let armed_at = Instant::now();
        let deadline = armed_at
            .checked_add(duration)
            .unwrap_or_else(|| armed_at + FAR_FUTURE);
        let session_id = session.id();

        let (commands, rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(LeaseStatus {
            state: LeaseState::Armed,
            deadline,
            record: None,
        });

        tracing::debug!(
            session = session_id,
            release_after_ms = duration.as_millis() as u64,
            "Release timer armed"
        );
        tokio::spawn(hold(session, deadline, rx, status_tx));

        Self {
            session_id,
            armed_at,
            commands,
            status,
        }
    }

    #[inline]
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// When the timer was armed.
    #[inline]
    pub fn armed_at(&self) -> Instant {
        self.armed_at
    }

    /// When the session will be released unless extended.
    pub fn deadline(&self) -> Instant {
        self.status.borrow().deadline
    }

    pub fn state(&self) -> LeaseState {
        self.status.borrow().state
    }

    pub fn is_armed(&self) -> bool {
        self.state() == LeaseState::Armed
    }

    /// Pushes the deadline out by `by`.
    ///
    /// Returns `false` once the lease has ended or when the new deadline
    /// cannot be represented.
    pub fn extend(&self, by: Duration) -> bool {
        self.is_armed()
            && self.deadline().checked_add(by).is_some()
            && self.commands.send(Command::Extend(by)).is_ok()
    }

    /// Releases the session now instead of at the deadline.
    pub fn release_now(&self) -> bool {
        self.is_armed() && self.commands.send(Command::ReleaseNow).is_ok()
    }

    /// Disarms the timer and returns the session to the caller.
    ///
    /// Returns `None` if the session was already released.
    pub async fn cancel(self) -> Option<CaptureSession> {
        let (reply, session) = oneshot::channel();
        self.commands.send(Command::Cancel(reply)).ok()?;
        session.await.ok()
    }

    /// Waits until the session is released.
    ///
    /// Returns `None` if the lease was cancelled instead.
    pub async fn released(&mut self) -> Option<ReleaseRecord> {
        // The holder task publishes its final status before exiting, so a
        // closed channel still carries the terminal state.
        let _ = self
            .status
            .wait_for(|status| status.state != LeaseState::Armed)
            .await;
        self.status.borrow().record.clone()
    }
}

async fn hold(
    mut session: CaptureSession,
    mut deadline: Instant,
    mut commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<LeaseStatus>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {
                finish(&mut session, ReleaseReason::Expired, &status);
                return;
            }
            command = commands.recv() => {
                match command {
                    Some(Command::Extend(by)) => match deadline.checked_add(by) {
                        Some(extended) => {
                            deadline = extended;
                            status.send_modify(|s| s.deadline = deadline);
                            tracing::debug!(
                                session = session.id(),
                                extended_ms = by.as_millis() as u64,
                                "Lease extended"
                            );
                        }
                        None => {
                            tracing::warn!(session = session.id(), "Lease extension ignored");
                        }
                    },
                    Some(Command::ReleaseNow) => {
                        finish(&mut session, ReleaseReason::Explicit, &status);
                        return;
                    }
                    Some(Command::Cancel(reply)) => {
                        status.send_modify(|s| s.state = LeaseState::Cancelled);
                        tracing::debug!(session = session.id(), "Lease cancelled");
                        // A dropped receiver drops the session, which releases it.
                        let _ = reply.send(session);
                        return;
                    }
                    None => {
                        tokio::time::sleep_until(deadline).await;
                        finish(&mut session, ReleaseReason::Expired, &status);
                        return;
                    }
                }
            }
        }
    }
}

fn finish(
    session: &mut CaptureSession,
    reason: ReleaseReason,
    status: &watch::Sender<LeaseStatus>,
) {
    let tracks_stopped = session.release();
    let record = ReleaseRecord {
        session_id: session.id(),
        reason,
        tracks_stopped,
        held_for: session.acquired_at().elapsed(),
    };
    status.send_modify(|s| {
        s.state = LeaseState::Released(reason);
        s.record = Some(record);
    });
}
