//! Ticket writer — posts composed comments via the ticketing platform's
//! comment-update API.
//!
//! Pure I/O: authentication and transport live here, nothing else. The
//! orchestrator owns ordering and failure reporting.

use async_trait::async_trait;
use secrecy::ExposeSecret;

use crate::config::TicketConfig;
use crate::error::TicketError;
use crate::pipeline::types::ComposedComment;

/// Ticket comment API, injected into the orchestrator.
#[async_trait]
pub trait TicketApi: Send + Sync {
    /// Append one comment to a ticket. There is no transaction primitive:
    /// a comment that was written stays written.
    async fn put_comment(
        &self,
        ticket_id: &str,
        comment: &ComposedComment,
    ) -> Result<(), TicketError>;
}

// ── HTTP implementation (Zendesk-style ticket update API) ───────────

pub struct TicketClient {
    base_url: String,
    email: String,
    api_token: secrecy::SecretString,
    client: reqwest::Client,
}

impl TicketClient {
    pub fn new(config: TicketConfig) -> Self {
        Self {
            base_url: config.base_url,
            email: config.email,
            api_token: config.api_token,
            client: reqwest::Client::new(),
        }
    }

    fn ticket_url(&self, ticket_id: &str) -> String {
        format!("{}/api/v2/tickets/{ticket_id}.json", self.base_url)
    }
}

#[async_trait]
impl TicketApi for TicketClient {
    async fn put_comment(
        &self,
        ticket_id: &str,
        comment: &ComposedComment,
    ) -> Result<(), TicketError> {
        let body = serde_json::json!({
            "ticket": {
                "comment": {
                    "body": comment.body,
                    "public": comment.public,
                }
            }
        });

        let resp = self
            .client
            .put(self.ticket_url(ticket_id))
            .basic_auth(
                format!("{}/token", self.email),
                Some(self.api_token.expose_secret()),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| TicketError::WriteFailed {
                ticket_id: ticket_id.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TicketError::ServiceError {
                ticket_id: ticket_id.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(ticket_id, public = comment.public, "Ticket comment written");
        Ok(())
    }
}
