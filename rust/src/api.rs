use std::future::Future;

use reqwest::header;
use serde::Deserialize;

use crate::accounts::RegisteredAccount;
use crate::presence::{Participant, ParticipantsSource, PresenceQueryError};

/// Conversations API generation this client speaks.
const CALL_API_VERSION: &str = "apiv4";

/// HTTP client for the chat server's call endpoints, bound to one account.
#[derive(Debug, Clone)]
pub struct TalkApi {
    http: reqwest::Client,
    base_url: String,
    credentials: String,
}

impl TalkApi {
    pub fn new(account: &RegisteredAccount) -> Result<Self, url::ParseError> {
        // Validate up front so a bad base URL fails at construction, not on
        // the first poll.
        url::Url::parse(&account.base_url)?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: account.base_url.clone(),
            credentials: account.credentials(),
        })
    }
}

fn participants_url(base_url: &str, conversation_id: &str) -> String {
    format!(
        "{}/ocs/v2.php/{CALL_API_VERSION}/call/{conversation_id}",
        base_url.trim_end_matches('/')
    )
}

#[derive(Debug, Deserialize)]
struct OcsEnvelope {
    ocs: OcsBody,
}

#[derive(Debug, Deserialize)]
struct OcsBody {
    #[serde(default)]
    data: Vec<Participant>,
}

impl ParticipantsSource for TalkApi {
    fn current_participants(
        &self,
        conversation_id: &str,
    ) -> impl Future<Output = Result<Vec<Participant>, PresenceQueryError>> + Send {
        let request = self
            .http
            .get(participants_url(&self.base_url, conversation_id))
            .header(header::AUTHORIZATION, self.credentials.clone())
            .header("OCS-APIRequest", "true")
            .header(header::ACCEPT, "application/json");
        async move {
            let response = request
                .send()
                .await
                .map_err(|err| PresenceQueryError::Transport(err.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(PresenceQueryError::Status(status.as_u16()));
            }
            let envelope: OcsEnvelope = response
                .json()
                .await
                .map_err(|err| PresenceQueryError::Malformed(err.to_string()))?;
            Ok(envelope.ocs.data)
        }
    }
}
