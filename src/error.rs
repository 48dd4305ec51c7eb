//! Error types for the relay.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
}

/// Translation-service errors.
///
/// The invoker performs no retries — a failure here is terminal for the
/// request and no ticket writes are attempted afterwards.
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("Translation request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("Translation service returned {status}: {body}")]
    ServiceError { status: u16, body: String },

    #[error("Invalid response from translation service: {reason}")]
    InvalidResponse { reason: String },

    #[error("Translation timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// Ticket-write errors.
///
/// The ticketing platform offers no transaction primitive, so a failed
/// write is reported as-is — writes that already committed stay committed.
#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    #[error("Comment write to ticket {ticket_id} failed: {reason}")]
    WriteFailed { ticket_id: String, reason: String },

    #[error("Ticket API returned {status} for ticket {ticket_id}: {body}")]
    ServiceError {
        ticket_id: String,
        status: u16,
        body: String,
    },

    #[error("Comment write to ticket {ticket_id} timed out after {timeout:?}")]
    Timeout {
        ticket_id: String,
        timeout: Duration,
    },
}
