//! Language/origin resolver — decides direction and output visibility.
//!
//! Pure: detection is an external capability, so the orchestrator performs
//! it (best effort) and passes the result in. The resolver only applies
//! policy.

use crate::config::RelayConfig;
use crate::pipeline::types::{
    CommentRole, OriginRole, PlannedComment, RoutingDecision, SkipReason, TranslationRequest,
};

/// Inputs shorter than this (in characters) are too short for reliable
/// language detection; they are treated as undetermined, never rejected.
pub const MIN_DETECT_LEN: usize = 12;

/// Policy knobs the resolver needs, extracted from [`RelayConfig`].
#[derive(Debug, Clone, Default)]
pub struct ResolverPolicy {
    pub strict_language: bool,
    pub agent_lang: Option<String>,
    pub client_lang: Option<String>,
}

impl From<&RelayConfig> for ResolverPolicy {
    fn from(config: &RelayConfig) -> Self {
        Self {
            strict_language: config.strict_language,
            agent_lang: config.agent_lang.clone(),
            client_lang: config.client_lang.clone(),
        }
    }
}

/// Resolve a request into a routing decision, or reject it.
///
/// Rules, in order:
/// 1. Same source and target language (after resolving "auto" against the
///    detected language) → `SameLanguage`.
/// 2. A client cannot author a public-facing reply → `InvalidOriginVisibility`.
/// 3. Strict mode: detected language disagrees with the expected language
///    for the origin role → `UnexpectedLanguage`.
///
/// Otherwise the ordered output list is always quote first, translation
/// second. The quote is private in every case; the translation inherits
/// the request's visibility for agents and is forced private for clients.
pub fn resolve(
    request: &TranslationRequest,
    detected: Option<&str>,
    policy: &ResolverPolicy,
) -> Result<RoutingDecision, SkipReason> {
    let from = effective_source(&request.source_lang, detected);

    if from != "auto" && from.eq_ignore_ascii_case(&request.target_lang) {
        return Err(SkipReason::SameLanguage);
    }

    if request.origin == OriginRole::Client && request.public {
        return Err(SkipReason::InvalidOriginVisibility);
    }

    if policy.strict_language
        && let Some(detected) = detected
    {
        let expected = match request.origin {
            OriginRole::Agent => policy.agent_lang.as_deref(),
            OriginRole::Client => policy.client_lang.as_deref(),
        };
        if let Some(expected) = expected
            && !expected.eq_ignore_ascii_case(detected)
        {
            return Err(SkipReason::UnexpectedLanguage);
        }
    }

    let translation_public = match request.origin {
        OriginRole::Agent => request.public,
        OriginRole::Client => false,
    };

    Ok(RoutingDecision {
        from,
        to: request.target_lang.clone(),
        outputs: vec![
            PlannedComment {
                public: false,
                role: CommentRole::Quote,
            },
            PlannedComment {
                public: translation_public,
                role: CommentRole::Translation,
            },
        ],
    })
}

fn effective_source(declared: &str, detected: Option<&str>) -> String {
    if declared == "auto" {
        detected.unwrap_or("auto").to_lowercase()
    } else {
        declared.to_lowercase()
    }
}
