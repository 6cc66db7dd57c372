use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// How often call presence is re-checked while the incoming-call alert shows.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Hard cap on presence checks. The first fires immediately, so the alert
/// never outlives a minute of polling.
pub const MAX_POLL_ATTEMPTS: u32 = 12;

/// Actor kind as the backend spells it on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorType {
    Users,
    Guests,
    Emails,
    Groups,
    Bots,
    #[default]
    #[serde(other)]
    Unknown,
}

/// One party currently in a call, as reported by the participants endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(rename = "actorId", default)]
    pub actor_id: String,
    #[serde(rename = "actorType", default)]
    pub actor_type: ActorType,
}

/// A single participants query failed. Never fatal: the attempt is consumed
/// and the loop carries on with its last observed state.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PresenceQueryError {
    #[error("participants request failed: {0}")]
    Transport(String),
    #[error("participants endpoint returned HTTP {0}")]
    Status(u16),
    #[error("participants response malformed: {0}")]
    Malformed(String),
}

/// Backend view of who is currently in a call. Implemented by
/// [`TalkApi`](crate::TalkApi) in production and by fakes in tests.
pub trait ParticipantsSource: Send + Sync + 'static {
    fn current_participants(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = Result<Vec<Participant>, PresenceQueryError>> + Send;
}

impl<S: ParticipantsSource> ParticipantsSource for Arc<S> {
    fn current_participants(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = Result<Vec<Participant>, PresenceQueryError>> + Send {
        (**self).current_participants(conversation_id)
    }
}

/// Owner-side handle for a presented incoming-call alert.
///
/// Replaces the old shared "service in foreground" flag: the UI dismissal
/// path calls [`CallAlertHandle::dismiss`] explicitly and the polling loop
/// observes it immediately, even mid-sleep. Cloneable; any clone may dismiss.
#[derive(Debug, Clone)]
pub struct CallAlertHandle {
    foreground: watch::Sender<bool>,
}

impl CallAlertHandle {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (foreground, rx) = watch::channel(true);
        (Self { foreground }, rx)
    }

    /// Signal that the alert left the foreground (answered, explicitly
    /// closed, or cleared by a later delete push).
    pub fn dismiss(&self) {
        let _ = self.foreground.send(false);
    }

    pub fn is_active(&self) -> bool {
        *self.foreground.borrow()
    }
}

/// Terminal decision of one presence-polling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceOutcome {
    /// Nobody is in the call any more; stop ringing.
    Ended,
    /// One of the user's own devices joined; this device yields.
    AnsweredElsewhere,
    /// All attempts consumed with the call still ringing.
    TimedOut,
    /// The alert was dismissed externally while polling was in flight.
    Dismissed,
}

/// Decides whether a presented incoming-call alert should stay up.
///
/// Single-writer: only [`run`](Self::run) mutates the poll state. The
/// foreground flag is the one external input and arrives over the watch
/// channel, so the loop halts promptly when the alert is torn down.
pub struct CallPresenceReconciler<S> {
    source: S,
    local_user_id: String,
    conversation_id: String,
}

impl<S: ParticipantsSource> CallPresenceReconciler<S> {
    pub fn new(
        source: S,
        local_user_id: impl Into<String>,
        conversation_id: impl Into<String>,
    ) -> Self {
        Self {
            source,
            local_user_id: local_user_id.into(),
            conversation_id: conversation_id.into(),
        }
    }

    /// Poll until a terminal decision.
    ///
    /// The first query fires immediately, so a call that already ended stops
    /// ringing without waiting out an interval; repeats are [`POLL_INTERVAL`]
    /// apart. A failed query consumes the attempt without touching the
    /// presence flags, so sustained backend failure still terminates after
    /// [`MAX_POLL_ATTEMPTS`] queries.
    pub async fn run(self, mut foreground: watch::Receiver<bool>) -> PresenceOutcome {
        let mut attempts_remaining = MAX_POLL_ATTEMPTS;
        let mut participants_present = true;
        let mut same_user_on_other_device = false;

        loop {
            if !*foreground.borrow() {
                return PresenceOutcome::Dismissed;
            }

            attempts_remaining -= 1;
            match self
                .source
                .current_participants(&self.conversation_id)
                .await
            {
                Ok(participants) => {
                    participants_present = !participants.is_empty();
                    same_user_on_other_device = participants.iter().any(|p| {
                        p.actor_type == ActorType::Users && p.actor_id == self.local_user_id
                    });
                }
                Err(err) => {
                    // Flags keep their last observed values so one flaky poll
                    // cannot end the call; the attempt still counts.
                    tracing::warn!(
                        conversation_id = %self.conversation_id,
                        attempts_remaining,
                        %err,
                        "participants query failed"
                    );
                }
            }

            if !*foreground.borrow() {
                return PresenceOutcome::Dismissed;
            }
            if !participants_present {
                return PresenceOutcome::Ended;
            }
            if same_user_on_other_device {
                tracing::debug!(
                    conversation_id = %self.conversation_id,
                    "user answered on another device; yielding"
                );
                return PresenceOutcome::AnsweredElsewhere;
            }
            if attempts_remaining == 0 {
                return PresenceOutcome::TimedOut;
            }

            tokio::select! {
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
                _ = dismissed_externally(&mut foreground) => {
                    tracing::debug!(
                        conversation_id = %self.conversation_id,
                        "call alert dismissed externally; stopping presence polling"
                    );
                    return PresenceOutcome::Dismissed;
                }
            }
        }
    }
}

/// Resolves once the alert is no longer foregrounded. Treats a dropped
/// sender as dismissal: nobody is left to keep the alert alive.
async fn dismissed_externally(foreground: &mut watch::Receiver<bool>) {
    loop {
        if !*foreground.borrow() {
            return;
        }
        if foreground.changed().await.is_err() {
            return;
        }
    }
}
