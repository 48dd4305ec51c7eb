//! Shared types for the translation pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Translation request ─────────────────────────────────────────────

/// Who authored the incoming comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginRole {
    /// Support agent (operator side).
    Agent,
    /// Customer. The safe default: client-authored content never becomes
    /// public without agent review, so an unlabelled event is treated as
    /// client-authored.
    #[default]
    Client,
}

impl OriginRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Client => "client",
        }
    }
}

/// One webhook invocation, immutable once constructed.
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    /// Correlation id for logs (generated, not part of the wire format).
    pub id: Uuid,
    /// Raw comment body.
    pub text: String,
    /// Declared source language, or "auto".
    pub source_lang: String,
    /// Target language.
    pub target_lang: String,
    /// Ticket the comment belongs to.
    pub ticket_id: String,
    /// Who authored the source comment.
    pub origin: OriginRole,
    /// Whether the source comment was public.
    pub public: bool,
    /// When the relay received the event.
    pub received_at: DateTime<Utc>,
}

impl TranslationRequest {
    pub fn new(
        text: impl Into<String>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
        ticket_id: impl Into<String>,
        origin: OriginRole,
        public: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            ticket_id: ticket_id.into(),
            origin,
            public,
            received_at: Utc::now(),
        }
    }
}

// ── Routing decision ────────────────────────────────────────────────

/// What a planned output comment carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentRole {
    /// Quoted original-language text.
    Quote,
    /// The translated text.
    Translation,
}

/// One comment the relay plans to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedComment {
    pub public: bool,
    pub role: CommentRole,
}

/// Derived from a request: translation direction plus the ordered list of
/// comments to write. Never empty unless the request was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub from: String,
    pub to: String,
    pub outputs: Vec<PlannedComment>,
}

impl RoutingDecision {
    /// Direction string, e.g. "ko→ru".
    pub fn direction(&self) -> String {
        format!("{}→{}", self.from, self.to)
    }
}

// ── Composed comment ────────────────────────────────────────────────

/// A comment body ready to be written to the ticket. The body always
/// carries the sentinel marker that the loop guard recognizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposedComment {
    pub body: String,
    pub public: bool,
}

// ── Outcome ─────────────────────────────────────────────────────────

/// Why a request was skipped. Skips are policy decisions, not faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Text carries a relay sentinel — the relay wrote it itself.
    LoopMarker,
    /// Source and target language are the same.
    SameLanguage,
    /// The translation came back identical to the input.
    IdenticalTranslation,
    /// A client cannot author a public-facing translated reply.
    InvalidOriginVisibility,
    /// Detected language disagrees with the expected one for the role.
    UnexpectedLanguage,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoopMarker => "loop-marker",
            Self::SameLanguage => "same-language",
            Self::IdenticalTranslation => "identical-translation",
            Self::InvalidOriginVisibility => "invalid-origin-visibility",
            Self::UnexpectedLanguage => "unexpected-language",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage at which a request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Translate,
    TicketWrite,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Translate => "translate",
            Self::TicketWrite => "ticket-write",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of one request.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// A guard or routing rule rejected the request. Not an error.
    Skipped { reason: SkipReason },
    /// All planned comments were written.
    Posted {
        translated: String,
        direction: String,
        comments: Vec<ComposedComment>,
    },
    /// An external call failed. `comments_posted` reports how many writes
    /// committed before the failure — they are not rolled back.
    Failed {
        stage: Stage,
        comments_posted: usize,
        cause: String,
    },
}
