//! Push decryption and call presence core for the Talk mobile client.
//!
//! The pipeline runs inbound relay payloads through signature verification,
//! RSA decryption and JSON parsing, then routes the resulting event to the
//! platform notification layer. Call events additionally start a bounded
//! presence-polling loop that decides how long the incoming-call alert stays
//! up. The mobile shells only implement [`NotificationPresenter`]; everything
//! else lives here.

mod accounts;
mod api;
mod crypto;
mod logging;
mod payload;
mod pipeline;
mod presence;
mod router;

pub use accounts::RegisteredAccount;
pub use api::TalkApi;
pub use crypto::{decrypt_subject, verify_signature, DecryptError, SignatureVerification};
pub use logging::init_logging;
pub use payload::{DecryptedNotification, PushEnvelope, PushEvent, PushMessage, MESSAGE_TYPE_CALL};
pub use pipeline::{HandledPush, PushError, PushPipeline};
pub use presence::{
    ActorType, CallAlertHandle, CallPresenceReconciler, Participant, ParticipantsSource,
    PresenceOutcome, PresenceQueryError, MAX_POLL_ATTEMPTS, POLL_INTERVAL,
};
pub use router::{route, Dispatcher, NotificationPresenter, RouterAction};
