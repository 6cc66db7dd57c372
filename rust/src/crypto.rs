use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::signature::Verifier;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};
use sha2::Sha512;

use crate::accounts::RegisteredAccount;
use crate::payload::{DecryptedNotification, PushMessage};

/// Result of checking an inbound signature against the registered accounts.
/// Consumed immediately by the decryption stage; never persisted.
#[derive(Debug, Clone)]
pub struct SignatureVerification {
    account: Option<RegisteredAccount>,
}

impl SignatureVerification {
    fn invalid() -> Self {
        Self { account: None }
    }

    pub fn is_valid(&self) -> bool {
        self.account.is_some()
    }

    /// The account whose server key produced the signature, if any.
    pub fn into_account(self) -> Option<RegisteredAccount> {
        self.account
    }
}

/// Find which account, if any, legitimately signed `ciphertext`.
///
/// The check is RSA-PKCS#1 v1.5 with SHA-512 over the raw ciphertext bytes,
/// tried against each candidate's server key in order; the first key that
/// validates wins. All comparisons stay inside the signature primitive, so
/// "wrong key" and "right key, wrong signature" are not distinguished by any
/// shortcut of ours.
///
/// Pure over the supplied accounts and never fails: malformed signature
/// bytes yield an invalid result and the caller drops the push.
pub fn verify_signature(
    signature: &[u8],
    ciphertext: &[u8],
    accounts: &[RegisteredAccount],
) -> SignatureVerification {
    let Ok(signature) = Signature::try_from(signature) else {
        return SignatureVerification::invalid();
    };
    for account in accounts {
        let key = VerifyingKey::<Sha512>::new(account.server_public_key.clone());
        if key.verify(ciphertext, &signature).is_ok() {
            return SignatureVerification {
                account: Some(account.clone()),
            };
        }
    }
    SignatureVerification::invalid()
}

/// Why decryption of a verified payload failed. All variants are non-fatal:
/// the event is dropped and logged, no partial notification is shown.
#[derive(Debug, thiserror::Error)]
pub enum DecryptError {
    #[error("device private key unavailable")]
    KeyUnavailable,
    #[error("decryption algorithm rejected the input: {0}")]
    UnsupportedAlgorithm(String),
    #[error("ciphertext padding rejected")]
    PaddingError,
    #[error("decrypted payload is not a valid push message: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

/// Decrypt a verified subject ciphertext into a push message.
///
/// RSA PKCS#1 v1.5 decryption with the device private key, then a JSON parse
/// of the wire schema. Stamps the local receipt timestamp. Only invoked once
/// [`verify_signature`] matched an account.
pub fn decrypt_subject(
    ciphertext: &[u8],
    private_key: &RsaPrivateKey,
) -> Result<DecryptedNotification, DecryptError> {
    let plaintext = private_key
        .decrypt(Pkcs1v15Encrypt, ciphertext)
        .map_err(|err| match err {
            rsa::Error::Decryption => DecryptError::PaddingError,
            other => DecryptError::UnsupportedAlgorithm(other.to_string()),
        })?;
    let message: PushMessage = serde_json::from_slice(&plaintext)?;
    Ok(DecryptedNotification::received_now(message))
}
