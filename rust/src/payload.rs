use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Type value the backend uses for incoming-call pushes. The only
/// semantically distinguished `type` besides the delete variants.
pub const MESSAGE_TYPE_CALL: &str = "call";

/// Raw push payload as delivered by the relay: two opaque base64 fields.
#[derive(Debug, Clone)]
pub struct PushEnvelope {
    /// Ciphertext the signature covers and the device key decrypts.
    pub subject: Vec<u8>,
    /// Signature bytes produced by one of the registered servers.
    pub signature: Vec<u8>,
}

impl PushEnvelope {
    /// Build from the relay's data map values.
    ///
    /// Returns `None` when either field is missing, empty, or not valid
    /// base64; processing for that push is silently aborted.
    pub fn from_fields(subject: Option<&str>, signature: Option<&str>) -> Option<Self> {
        let subject = subject.filter(|v| !v.is_empty())?;
        let signature = signature.filter(|v| !v.is_empty())?;
        Some(Self {
            subject: BASE64.decode(subject).ok()?,
            signature: BASE64.decode(signature).ok()?,
        })
    }
}

/// Decrypted wire schema. Field names are normative; they must match what
/// the existing backend sends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Conversation/message identifier, also the call-alert id for calls.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub delete: bool,
    #[serde(rename = "deleteAll", default)]
    pub delete_all: bool,
    #[serde(rename = "deleteMultiple", default)]
    pub delete_multiple: bool,
    #[serde(rename = "notificationIds", default)]
    pub notification_ids: Vec<i64>,
}

/// Closed classification of a push message. Exactly one variant applies to
/// any message; see [`PushMessage::event`] for the precedence order.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// Cancel the single notification identified by `id`.
    Delete { id: String },
    /// Cancel every notification for the matched account.
    DeleteAll,
    /// Cancel each listed notification id.
    DeleteMultiple { ids: Vec<i64> },
    /// Incoming call for the conversation `id`.
    Call {
        conversation_id: String,
        display_subject: String,
    },
    /// Anything else renders as a normal message notification.
    Message { id: String, display_subject: String },
}

impl PushMessage {
    /// Total, deterministic classification with first-match-wins precedence:
    /// `delete` > `deleteAll` > `deleteMultiple` > `type == "call"` > generic.
    ///
    /// The backend never sets more than one flag, but the precedence keeps
    /// accidental combinations specified instead of ambiguous.
    pub fn event(&self) -> PushEvent {
        if self.delete {
            PushEvent::Delete {
                id: self.id.clone(),
            }
        } else if self.delete_all {
            PushEvent::DeleteAll
        } else if self.delete_multiple {
            PushEvent::DeleteMultiple {
                ids: self.notification_ids.clone(),
            }
        } else if self.kind == MESSAGE_TYPE_CALL {
            PushEvent::Call {
                conversation_id: self.id.clone(),
                display_subject: self.subject.clone(),
            }
        } else {
            PushEvent::Message {
                id: self.id.clone(),
                display_subject: self.subject.clone(),
            }
        }
    }
}

/// A decrypted push message plus the local receipt timestamp.
///
/// The server sends no timestamp; the local one stamped at decrypt time
/// orders notification display. Lives only for the handling of one push.
#[derive(Debug, Clone, PartialEq)]
pub struct DecryptedNotification {
    pub message: PushMessage,
    pub received_at_ms: i64,
}

impl DecryptedNotification {
    pub(crate) fn received_now(message: PushMessage) -> Self {
        Self {
            message,
            received_at_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn event(&self) -> PushEvent {
        self.message.event()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_requires_both_fields_present_and_decodable() {
        assert!(PushEnvelope::from_fields(Some("aGk="), Some("c2ln")).is_some());
        assert!(PushEnvelope::from_fields(None, Some("c2ln")).is_none());
        assert!(PushEnvelope::from_fields(Some("aGk="), None).is_none());
        assert!(PushEnvelope::from_fields(Some(""), Some("c2ln")).is_none());
        assert!(PushEnvelope::from_fields(Some("not base64!!"), Some("c2ln")).is_none());
    }

    #[test]
    fn wire_names_parse_and_absent_fields_default() {
        let msg: PushMessage = serde_json::from_str(
            r#"{"type":"call","id":"room-7","subject":"Alice","delete":false,
                "deleteAll":false,"deleteMultiple":true,"notificationIds":[3,4]}"#,
        )
        .expect("well-formed wire message");
        assert_eq!(msg.kind, "call");
        assert_eq!(msg.notification_ids, vec![3, 4]);

        let sparse: PushMessage = serde_json::from_str(r#"{"id":"x"}"#).expect("sparse message");
        assert!(!sparse.delete && !sparse.delete_all && !sparse.delete_multiple);
        assert!(sparse.notification_ids.is_empty());
    }

    #[test]
    fn delete_wins_over_call_type() {
        let msg = PushMessage {
            kind: MESSAGE_TYPE_CALL.into(),
            id: "room-1".into(),
            delete: true,
            ..Default::default()
        };
        assert_eq!(msg.event(), PushEvent::Delete { id: "room-1".into() });
    }

    #[test]
    fn delete_all_wins_over_delete_multiple() {
        let msg = PushMessage {
            delete_all: true,
            delete_multiple: true,
            notification_ids: vec![1],
            ..Default::default()
        };
        assert_eq!(msg.event(), PushEvent::DeleteAll);
    }

    #[test]
    fn call_type_classifies_as_call() {
        let msg = PushMessage {
            kind: MESSAGE_TYPE_CALL.into(),
            id: "room-2".into(),
            subject: "Bob".into(),
            ..Default::default()
        };
        assert_eq!(
            msg.event(),
            PushEvent::Call {
                conversation_id: "room-2".into(),
                display_subject: "Bob".into(),
            }
        );
    }

    #[test]
    fn unknown_type_classifies_as_generic_message() {
        let msg = PushMessage {
            kind: "chat".into(),
            id: "room-3".into(),
            subject: "hi".into(),
            ..Default::default()
        };
        assert_eq!(
            msg.event(),
            PushEvent::Message {
                id: "room-3".into(),
                display_subject: "hi".into(),
            }
        );
    }
}
