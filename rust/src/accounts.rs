use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rsa::RsaPublicKey;

/// A server account registered on this device.
///
/// Several accounts may be registered at once; signature verification tries
/// each candidate's server key in turn. Loaded from external provisioning and
/// treated as immutable for the duration of a verification attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredAccount {
    pub base_url: String,
    pub username: String,
    pub auth_token: String,
    /// Server-side identifier of the user, matched against call participants
    /// to detect the same user answering on another device.
    pub user_id: String,
    /// Public half of the server's push signing key, captured when the device
    /// registered for push.
    pub server_public_key: RsaPublicKey,
}

impl RegisteredAccount {
    /// Opaque bearer string the backend expects on authenticated requests.
    pub fn credentials(&self) -> String {
        let raw = format!("{}:{}", self.username, self.auth_token);
        format!("Basic {}", BASE64.encode(raw))
    }

    /// Stable key for scoping per-account notification state.
    pub fn scope_key(&self) -> String {
        format!("{}@{}", self.username, self.base_url)
    }
}
