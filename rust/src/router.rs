use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::accounts::RegisteredAccount;
use crate::payload::{DecryptedNotification, PushEvent};
use crate::presence::{CallAlertHandle, PresenceOutcome};

/// What the router decided for one push, in documented precedence order.
#[derive(Debug, Clone, PartialEq)]
pub enum RouterAction {
    /// Cancel the single notification identified by `id`, account-scoped.
    CancelNotification { id: String },
    /// Cancel all notifications for the matched account.
    CancelAllForAccount,
    /// Cancel each listed notification id for the matched account.
    CancelNotifications { ids: Vec<i64> },
    /// Surface the incoming-call alert and start presence polling.
    StartIncomingCall { conversation_id: String },
    /// Enqueue a background render of a normal message notification.
    EnqueueNotification { id: String, subject: String },
}

/// Map a decrypted notification to its action. Pure and total; precedence is
/// fixed by [`PushMessage::event`](crate::PushMessage::event).
pub fn route(notification: &DecryptedNotification) -> RouterAction {
    match notification.event() {
        PushEvent::Delete { id } => RouterAction::CancelNotification { id },
        PushEvent::DeleteAll => RouterAction::CancelAllForAccount,
        PushEvent::DeleteMultiple { ids } => RouterAction::CancelNotifications { ids },
        PushEvent::Call {
            conversation_id, ..
        } => RouterAction::StartIncomingCall { conversation_id },
        PushEvent::Message {
            id,
            display_subject,
        } => RouterAction::EnqueueNotification {
            id,
            subject: display_subject,
        },
    }
}

/// Platform notification surface. The core only instructs it; rendering,
/// channels, ringtones and full-screen intents live in the mobile shells.
pub trait NotificationPresenter: Send + Sync {
    /// Cancel one presented notification, scoped to `account`.
    fn cancel_notification(&self, account: &RegisteredAccount, id: &str);
    /// Cancel everything presented for `account`.
    fn cancel_all(&self, account: &RegisteredAccount);
    /// Present the full-screen incoming-call alert (high-priority channel,
    /// insistent ringtone).
    fn show_incoming_call(&self, account: &RegisteredAccount, notification: &DecryptedNotification);
    /// Tear the incoming-call alert down.
    fn dismiss_incoming_call(&self, account: &RegisteredAccount, conversation_id: &str);
    /// Background-render a normal message notification.
    fn enqueue_message_notification(
        &self,
        account: &RegisteredAccount,
        notification: &DecryptedNotification,
    );
}

/// Applies router decisions to the presenter.
///
/// Tracks cancelled ids so a duplicate cancel for the same id is a no-op
/// until that id is presented again, and keeps the active call-alert handles
/// so a later delete for a ringing conversation stops its in-flight presence
/// polling.
pub struct Dispatcher {
    presenter: Arc<dyn NotificationPresenter>,
    cancelled: Mutex<HashSet<(String, String)>>,
    call_alerts: Mutex<HashMap<(String, String), CallAlertHandle>>,
}

impl Dispatcher {
    pub fn new(presenter: Arc<dyn NotificationPresenter>) -> Self {
        Self {
            presenter,
            cancelled: Mutex::new(HashSet::new()),
            call_alerts: Mutex::new(HashMap::new()),
        }
    }

    pub fn execute(
        &self,
        action: &RouterAction,
        account: &RegisteredAccount,
        notification: &DecryptedNotification,
    ) {
        match action {
            RouterAction::CancelNotification { id } => self.cancel_once(account, id),
            RouterAction::CancelAllForAccount => {
                let scope = account.scope_key();
                match self.cancelled.lock() {
                    Ok(mut set) => set.retain(|(s, _)| s != &scope),
                    Err(poison) => poison.into_inner().retain(|(s, _)| s != &scope),
                }
                self.presenter.cancel_all(account);
            }
            RouterAction::CancelNotifications { ids } => {
                for id in ids {
                    self.cancel_once(account, &id.to_string());
                }
            }
            RouterAction::StartIncomingCall { conversation_id } => {
                self.mark_presented(account, conversation_id);
                self.presenter.show_incoming_call(account, notification);
            }
            RouterAction::EnqueueNotification { id, .. } => {
                self.mark_presented(account, id);
                self.presenter
                    .enqueue_message_notification(account, notification);
            }
        }
    }

    /// Remember the handle of a presented call alert so later delete pushes
    /// for the same conversation can stop its polling loop.
    pub(crate) fn register_call_alert(
        &self,
        account: &RegisteredAccount,
        conversation_id: &str,
        handle: CallAlertHandle,
    ) {
        let key = (account.scope_key(), conversation_id.to_string());
        match self.call_alerts.lock() {
            Ok(mut map) => {
                map.insert(key, handle);
            }
            Err(poison) => {
                poison.into_inner().insert(key, handle);
            }
        }
    }

    /// Called once per reconciler run with its terminal outcome. Issues the
    /// single UI dismissal, unless the alert was already torn down
    /// externally (in which case the reconciler saw `Dismissed`).
    pub(crate) fn finish_call_alert(
        &self,
        account: &RegisteredAccount,
        conversation_id: &str,
        outcome: PresenceOutcome,
    ) {
        let key = (account.scope_key(), conversation_id.to_string());
        let handle = match self.call_alerts.lock() {
            Ok(mut map) => map.remove(&key),
            Err(poison) => poison.into_inner().remove(&key),
        };
        if outcome == PresenceOutcome::Dismissed {
            return;
        }
        if let Some(handle) = handle {
            handle.dismiss();
            self.presenter.dismiss_incoming_call(account, conversation_id);
        }
    }

    /// Presenting a notification reopens its id for cancellation, so an id
    /// redelivered after an earlier delete can be cancelled again. Only
    /// back-to-back duplicate deletes stay a no-op.
    fn mark_presented(&self, account: &RegisteredAccount, id: &str) {
        let key = (account.scope_key(), id.to_string());
        match self.cancelled.lock() {
            Ok(mut set) => {
                set.remove(&key);
            }
            Err(poison) => {
                poison.into_inner().remove(&key);
            }
        }
    }

    fn cancel_once(&self, account: &RegisteredAccount, id: &str) {
        // A delete can target a conversation that is still ringing; stop its
        // polling loop along with the notification.
        let key = (account.scope_key(), id.to_string());
        let alert = match self.call_alerts.lock() {
            Ok(mut map) => map.remove(&key),
            Err(poison) => poison.into_inner().remove(&key),
        };
        if let Some(alert) = alert {
            alert.dismiss();
        }

        let newly_cancelled = match self.cancelled.lock() {
            Ok(mut set) => set.insert(key),
            Err(poison) => poison.into_inner().insert(key),
        };
        if newly_cancelled {
            self.presenter.cancel_notification(account, id);
        } else {
            tracing::debug!(id, "notification already cancelled; skipping");
        }
    }
}
