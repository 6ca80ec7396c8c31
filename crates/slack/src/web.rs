use async_trait::async_trait;
use garcon_agent::collaborators::IdentityResolver;
use garcon_core::domain::message::OutgoingMessage;
use garcon_core::domain::roster::Roster;
use garcon_core::errors::{Collaborator, CollaboratorError};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::events::{MessageSink, SinkError};

pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

/// `users.list` pages are capped to keep startup requests small.
const USERS_PAGE_LIMIT: u32 = 200;

#[derive(Debug, Error)]
pub enum WebApiError {
    #[error("slack {method} request failed: {source}")]
    Http {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("slack {method} returned http {status}")]
    Status { method: &'static str, status: u16 },
    #[error("slack {method} returned error `{code}`")]
    Api { method: &'static str, code: String },
}

impl WebApiError {
    fn into_collaborator(self, collaborator: Collaborator) -> CollaboratorError {
        match self {
            Self::Api { code, .. } => CollaboratorError::rejected(collaborator, code),
            other => CollaboratorError::unavailable(collaborator, other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    payload: Option<T>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct AuthIdentity {
    pub user_id: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub team: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UsersPage {
    #[serde(default)]
    pub members: Vec<SlackUser>,
    #[serde(default)]
    pub response_metadata: Option<ResponseMetadata>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ResponseMetadata {
    #[serde(default)]
    pub next_cursor: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SlackUser {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub profile: Option<SlackProfile>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SlackProfile {
    #[serde(default)]
    pub display_name: String,
}

impl SlackUser {
    /// Profile display name when set, otherwise the account handle.
    pub fn display_name(&self) -> &str {
        self.profile
            .as_ref()
            .map(|profile| profile.display_name.trim())
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.name)
    }
}

#[derive(Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct Posted {}

/// Thin client for the three Web API methods the bot needs.
#[derive(Clone)]
pub struct SlackWebClient {
    client: Client,
    base_url: String,
    bot_token: SecretString,
    bot_name: String,
}

impl SlackWebClient {
    pub fn new(bot_token: SecretString, bot_name: impl Into<String>) -> Self {
        Self::with_base_url(Client::new(), DEFAULT_API_BASE, bot_token, bot_name)
    }

    pub fn with_base_url(
        client: Client,
        base_url: impl Into<String>,
        bot_token: SecretString,
        bot_name: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client, base_url, bot_token, bot_name: bot_name.into() }
    }

    pub async fn auth_test(&self) -> Result<AuthIdentity, WebApiError> {
        self.call_get("auth.test", &[]).await
    }

    /// Every page of `users.list`, following `next_cursor` until it comes back empty.
    pub async fn users_list(&self) -> Result<Vec<SlackUser>, WebApiError> {
        let limit = USERS_PAGE_LIMIT.to_string();
        let mut users = Vec::new();
        let mut cursor = String::new();
        loop {
            let mut query = vec![("limit", limit.as_str())];
            if !cursor.is_empty() {
                query.push(("cursor", cursor.as_str()));
            }
            let page: UsersPage = self.call_get("users.list", &query).await?;
            users.extend(page.members);

            match page.response_metadata.map(|meta| meta.next_cursor) {
                Some(next) if !next.is_empty() => cursor = next,
                _ => return Ok(users),
            }
        }
    }

    pub async fn post_message(&self, channel: &str, text: &str) -> Result<(), WebApiError> {
        const METHOD: &str = "chat.postMessage";
        let response = self
            .client
            .post(format!("{}/{METHOD}", self.base_url))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&PostMessage { channel, text })
            .send()
            .await
            .map_err(|source| WebApiError::Http { method: METHOD, source })?;
        let _: Posted = decode(METHOD, response).await?;
        Ok(())
    }

    async fn call_get<T: DeserializeOwned>(
        &self,
        method: &'static str,
        query: &[(&str, &str)],
    ) -> Result<T, WebApiError> {
        let response = self
            .client
            .get(format!("{}/{method}", self.base_url))
            .bearer_auth(self.bot_token.expose_secret())
            .query(query)
            .send()
            .await
            .map_err(|source| WebApiError::Http { method, source })?;
        decode(method, response).await
    }
}

async fn decode<T: DeserializeOwned>(
    method: &'static str,
    response: reqwest::Response,
) -> Result<T, WebApiError> {
    if !response.status().is_success() {
        return Err(WebApiError::Status { method, status: response.status().as_u16() });
    }
    let envelope: ApiEnvelope<T> =
        response.json().await.map_err(|source| WebApiError::Http { method, source })?;
    unwrap_envelope(method, envelope)
}

fn unwrap_envelope<T>(method: &'static str, envelope: ApiEnvelope<T>) -> Result<T, WebApiError> {
    match (envelope.ok, envelope.payload) {
        (true, Some(payload)) => Ok(payload),
        (true, None) => Err(WebApiError::Api { method, code: "empty_response".to_owned() }),
        (false, _) => Err(WebApiError::Api {
            method,
            code: envelope.error.unwrap_or_else(|| "unknown_error".to_owned()),
        }),
    }
}

/// Builds the roster from the bot's own identity plus every active workspace member.
pub fn build_roster(identity: &AuthIdentity, bot_name: &str, users: &[SlackUser]) -> Roster {
    let mut roster = Roster::new(identity.user_id.clone(), bot_name);
    for user in users.iter().filter(|user| !user.deleted) {
        roster.insert(user.id.clone(), user.display_name());
    }
    roster
}

#[async_trait]
impl IdentityResolver for SlackWebClient {
    async fn roster(&self) -> Result<Roster, CollaboratorError> {
        let to_identity_error =
            |error: WebApiError| error.into_collaborator(Collaborator::Identity);
        let identity = self.auth_test().await.map_err(to_identity_error)?;
        let users = self.users_list().await.map_err(to_identity_error)?;
        debug!(
            event_name = "collaborator.identity.roster_loaded",
            bot_user_id = %identity.user_id,
            member_count = users.len(),
            "loaded workspace roster"
        );
        Ok(build_roster(&identity, &self.bot_name, &users))
    }
}

#[async_trait]
impl MessageSink for SlackWebClient {
    async fn post(&self, message: &OutgoingMessage) -> Result<(), SinkError> {
        self.post_message(message.channel.as_str(), &message.text).await.map_err(|error| {
            warn!(
                event_name = "egress.slack.post_failed",
                channel_id = %message.channel.as_str(),
                error = %error,
                "chat.postMessage failed"
            );
            match error {
                WebApiError::Api { code, .. } => SinkError::Rejected(code),
                other => SinkError::Unavailable(other.to_string()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use garcon_core::errors::{Collaborator, CollaboratorError};

    use super::{build_roster, unwrap_envelope, ApiEnvelope, AuthIdentity, UsersPage, WebApiError};

    fn users_page(json: &str) -> UsersPage {
        let envelope: ApiEnvelope<UsersPage> = serde_json::from_str(json).expect("users.list json");
        unwrap_envelope("users.list", envelope).expect("ok envelope")
    }

    #[test]
    fn roster_prefers_display_names_and_skips_deactivated_accounts() {
        let page = users_page(
            r#"{"ok":true,"members":[
                {"id":"U1","name":"bob","profile":{"display_name":"brainfart"}},
                {"id":"U2","name":"alice","profile":{"display_name":"  "}},
                {"id":"U3","name":"gone","deleted":true}
            ],"response_metadata":{"next_cursor":""}}"#,
        );
        let identity = AuthIdentity {
            user_id: "G4RC0NB0T".to_owned(),
            user: "garcon".to_owned(),
            team: "T1".to_owned(),
        };

        let roster = build_roster(&identity, "garcon", &page.members);

        assert_eq!(roster.self_id(), "G4RC0NB0T");
        assert_eq!(roster.self_name(), "garcon");
        assert_eq!(roster.display_name("U1"), Some("brainfart"));
        assert_eq!(roster.display_name("U2"), Some("alice"));
        assert_eq!(roster.display_name("U3"), None);
    }

    #[test]
    fn pagination_cursor_is_exposed() {
        let page = users_page(
            r#"{"ok":true,"members":[],
                "response_metadata":{"next_cursor":"dXNlcjpVMEc5V0ZYTlo="}}"#,
        );
        assert_eq!(
            page.response_metadata.map(|meta| meta.next_cursor).as_deref(),
            Some("dXNlcjpVMEc5V0ZYTlo=")
        );
    }

    #[test]
    fn api_errors_become_rejections() {
        let envelope: ApiEnvelope<AuthIdentity> =
            serde_json::from_str(r#"{"ok":false,"error":"invalid_auth"}"#).expect("json");

        let error = unwrap_envelope("auth.test", envelope).expect_err("not ok");
        assert!(matches!(&error, WebApiError::Api { code, .. } if code == "invalid_auth"));
        assert_eq!(
            error.into_collaborator(Collaborator::Identity),
            CollaboratorError::rejected(Collaborator::Identity, "invalid_auth")
        );
    }

    #[test]
    fn status_errors_become_unavailability() {
        let error = WebApiError::Status { method: "chat.postMessage", status: 503 };
        assert_eq!(
            error.into_collaborator(Collaborator::ChatTransport),
            CollaboratorError::unavailable(
                Collaborator::ChatTransport,
                "slack chat.postMessage returned http 503"
            )
        );
    }
}
