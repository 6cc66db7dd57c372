use std::sync::Arc;

use rsa::RsaPrivateKey;

use crate::accounts::RegisteredAccount;
use crate::crypto::{self, DecryptError};
use crate::payload::{DecryptedNotification, PushEnvelope};
use crate::presence::{CallAlertHandle, CallPresenceReconciler, ParticipantsSource};
use crate::router::{route, Dispatcher, NotificationPresenter, RouterAction};

/// Why a push was dropped. Every variant is terminal and local: the only
/// user-visible effect of any of these is that no notification appears.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("signature did not match any registered account")]
    VerificationFailed,
    #[error("payload decryption failed: {0}")]
    DecryptionFailed(DecryptError),
    #[error("decrypted payload failed to parse: {0}")]
    ParseFailed(serde_json::Error),
}

/// What one successfully handled push did.
#[derive(Debug)]
pub struct HandledPush {
    pub account: RegisteredAccount,
    pub action: RouterAction,
    pub notification: DecryptedNotification,
    /// Present for call pushes: dismissing it stops the presence polling and
    /// is the authoritative cancellation point for the alert.
    pub call_alert: Option<CallAlertHandle>,
}

/// Verify → decrypt → route → dispatch, for one device.
///
/// Owns the registered accounts, the device decryption key and the
/// collaborators that side effects land on. Call handling spawns the
/// presence reconciler onto the held runtime.
pub struct PushPipeline<S> {
    accounts: Vec<RegisteredAccount>,
    device_private_key: Option<RsaPrivateKey>,
    dispatcher: Arc<Dispatcher>,
    participants: Arc<S>,
    runtime: tokio::runtime::Handle,
}

impl<S: ParticipantsSource> PushPipeline<S> {
    pub fn new(
        accounts: Vec<RegisteredAccount>,
        device_private_key: Option<RsaPrivateKey>,
        presenter: Arc<dyn NotificationPresenter>,
        participants: Arc<S>,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        Self {
            accounts,
            device_private_key,
            dispatcher: Arc::new(Dispatcher::new(presenter)),
            participants,
            runtime,
        }
    }

    /// Entry point for raw relay payloads. Failures are logged and swallowed;
    /// nothing is surfaced to the user. Call from a background worker, never
    /// from the platform main thread: verification and decryption block.
    pub fn handle(&self, envelope: &PushEnvelope) {
        match self.process(envelope) {
            Ok(handled) => {
                tracing::debug!(account = %handled.account.username, action = ?handled.action, "push handled");
            }
            Err(err) => {
                tracing::debug!(%err, "dropping push");
            }
        }
    }

    /// Handle one push, reporting what happened.
    ///
    /// No account-scoped side effect happens unless the signature matched a
    /// registered account, and no notification is produced from a payload
    /// that failed to decrypt or parse.
    pub fn process(&self, envelope: &PushEnvelope) -> Result<HandledPush, PushError> {
        let verification =
            crypto::verify_signature(&envelope.signature, &envelope.subject, &self.accounts);
        let account = verification
            .into_account()
            .ok_or(PushError::VerificationFailed)?;

        let private_key = self
            .device_private_key
            .as_ref()
            .ok_or(PushError::DecryptionFailed(DecryptError::KeyUnavailable))?;
        let notification =
            crypto::decrypt_subject(&envelope.subject, private_key).map_err(|err| match err {
                DecryptError::MalformedPayload(parse) => PushError::ParseFailed(parse),
                other => PushError::DecryptionFailed(other),
            })?;

        let action = route(&notification);
        self.dispatcher.execute(&action, &account, &notification);

        let call_alert = match &action {
            RouterAction::StartIncomingCall { conversation_id } => {
                Some(self.start_presence_polling(&account, conversation_id))
            }
            _ => None,
        };

        Ok(HandledPush {
            account,
            action,
            notification,
            call_alert,
        })
    }

    /// Spawn the reconciler for a freshly presented call alert. Runs
    /// concurrently with the alert; its terminal outcome issues at most one
    /// dismissal through the dispatcher.
    fn start_presence_polling(
        &self,
        account: &RegisteredAccount,
        conversation_id: &str,
    ) -> CallAlertHandle {
        let (handle, foreground) = CallAlertHandle::new();
        self.dispatcher
            .register_call_alert(account, conversation_id, handle.clone());

        let reconciler = CallPresenceReconciler::new(
            self.participants.clone(),
            account.user_id.clone(),
            conversation_id,
        );
        let dispatcher = self.dispatcher.clone();
        let account = account.clone();
        let conversation_id = conversation_id.to_string();
        self.runtime.spawn(async move {
            let outcome = reconciler.run(foreground).await;
            tracing::info!(
                conversation_id = %conversation_id,
                ?outcome,
                "call presence polling finished"
            );
            dispatcher.finish_call_alert(&account, &conversation_id, outcome);
        });
        handle
    }
}
