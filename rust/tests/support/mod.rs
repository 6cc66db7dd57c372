//! Shared fixtures: deterministic RSA identities, sealed push envelopes and
//! a recording presenter.
#![allow(dead_code)]

use std::future::Future;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha2::Sha512;
use talk_core::{
    DecryptedNotification, NotificationPresenter, Participant, ParticipantsSource,
    PresenceQueryError, PushEnvelope, RegisteredAccount,
};

pub struct TestIdentity {
    /// The server's push signing key; its public half is registered on the
    /// account.
    pub server_key: RsaPrivateKey,
    /// The device's decryption key; the server encrypts to its public half.
    pub device_key: RsaPrivateKey,
    pub account: RegisteredAccount,
}

pub fn test_identity(seed: u64, username: &str) -> TestIdentity {
    let mut rng = StdRng::seed_from_u64(seed);
    let server_key = RsaPrivateKey::new(&mut rng, 2048).expect("server keygen");
    let device_key = RsaPrivateKey::new(&mut rng, 2048).expect("device keygen");
    let account = RegisteredAccount {
        base_url: format!("https://cloud.example.org/{username}"),
        username: username.to_string(),
        auth_token: "app-token".into(),
        user_id: format!("{username}-uid"),
        server_public_key: RsaPublicKey::from(&server_key),
    };
    TestIdentity {
        server_key,
        device_key,
        account,
    }
}

/// Encrypt `message` to the identity's device key and sign the ciphertext
/// with its server key, exactly as the backend seals a push.
pub fn seal(identity: &TestIdentity, message: &serde_json::Value) -> PushEnvelope {
    let mut rng = StdRng::seed_from_u64(7);
    let plaintext = serde_json::to_vec(message).expect("serialize push message");
    let subject = RsaPublicKey::from(&identity.device_key)
        .encrypt(&mut rng, Pkcs1v15Encrypt, &plaintext)
        .expect("encrypt subject");
    let signing_key = SigningKey::<Sha512>::new(identity.server_key.clone());
    let signature = signing_key.sign(&subject).to_bytes().to_vec();
    PushEnvelope { subject, signature }
}

/// Presenter that records every instruction it receives.
#[derive(Default)]
pub struct RecordingPresenter {
    cancelled: Mutex<Vec<String>>,
    cancelled_all_scopes: Mutex<Vec<String>>,
    calls_shown: Mutex<Vec<String>>,
    calls_dismissed: Mutex<Vec<String>>,
    enqueued: Mutex<Vec<String>>,
}

impl RecordingPresenter {
    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().expect("recorder lock").clone()
    }

    pub fn cancelled_all_scopes(&self) -> Vec<String> {
        self.cancelled_all_scopes
            .lock()
            .expect("recorder lock")
            .clone()
    }

    pub fn calls_shown(&self) -> Vec<String> {
        self.calls_shown.lock().expect("recorder lock").clone()
    }

    pub fn calls_dismissed(&self) -> Vec<String> {
        self.calls_dismissed.lock().expect("recorder lock").clone()
    }

    pub fn enqueued(&self) -> Vec<String> {
        self.enqueued.lock().expect("recorder lock").clone()
    }

    pub fn is_untouched(&self) -> bool {
        self.cancelled().is_empty()
            && self.cancelled_all_scopes().is_empty()
            && self.calls_shown().is_empty()
            && self.calls_dismissed().is_empty()
            && self.enqueued().is_empty()
    }
}

impl NotificationPresenter for RecordingPresenter {
    fn cancel_notification(&self, _account: &RegisteredAccount, id: &str) {
        self.cancelled
            .lock()
            .expect("recorder lock")
            .push(id.to_string());
    }

    fn cancel_all(&self, account: &RegisteredAccount) {
        self.cancelled_all_scopes
            .lock()
            .expect("recorder lock")
            .push(account.scope_key());
    }

    fn show_incoming_call(
        &self,
        _account: &RegisteredAccount,
        notification: &DecryptedNotification,
    ) {
        self.calls_shown
            .lock()
            .expect("recorder lock")
            .push(notification.message.id.clone());
    }

    fn dismiss_incoming_call(&self, _account: &RegisteredAccount, conversation_id: &str) {
        self.calls_dismissed
            .lock()
            .expect("recorder lock")
            .push(conversation_id.to_string());
    }

    fn enqueue_message_notification(
        &self,
        _account: &RegisteredAccount,
        notification: &DecryptedNotification,
    ) {
        self.enqueued
            .lock()
            .expect("recorder lock")
            .push(notification.message.id.clone());
    }
}

/// Source for tests that never have anyone in the call.
pub struct NoParticipants;

impl ParticipantsSource for NoParticipants {
    fn current_participants(
        &self,
        _conversation_id: &str,
    ) -> impl Future<Output = Result<Vec<Participant>, PresenceQueryError>> + Send {
        async { Ok(Vec::new()) }
    }
}
