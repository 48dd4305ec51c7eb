//! Comment composer — renders the bodies the relay writes back.
//!
//! Every body starts with the sentinel header so the loop guard's
//! substring check holds regardless of template variant. Template choice
//! is a pure function of the direction — no side effects here.

use crate::pipeline::guard::SENTINEL;
use crate::pipeline::types::{
    CommentRole, ComposedComment, RoutingDecision, TranslationRequest,
};

/// Compose one body per planned output, in resolver order.
pub fn compose(
    request: &TranslationRequest,
    translated: &str,
    decision: &RoutingDecision,
) -> Vec<ComposedComment> {
    decision
        .outputs
        .iter()
        .map(|planned| {
            let (label, text) = match planned.role {
                CommentRole::Quote => (quote_label(&decision.from, &decision.to), request.text.as_str()),
                CommentRole::Translation => {
                    (translation_label(&decision.from, &decision.to), translated)
                }
            };
            ComposedComment {
                body: format!("{}\n{label}\n{text}", header(decision)),
                public: planned.public,
            }
        })
        .collect()
}

/// Sentinel header line, e.g. `[RELAY:v1] [ko→ru]`.
///
/// The sentinel appears exactly once, at the start, at a fixed position.
fn header(decision: &RoutingDecision) -> String {
    format!("{SENTINEL} [{}]", decision.direction())
}

/// Label for the quoted original, in the source language where we have a
/// native-script template for the pair.
fn quote_label(from: &str, to: &str) -> &'static str {
    match (from, to) {
        ("ko", "ru") => "원문:",
        ("ru", "ko") => "Оригинал:",
        _ => "Original:",
    }
}

/// Label for the translation, in the target language for known pairs.
fn translation_label(from: &str, to: &str) -> &'static str {
    match (from, to) {
        ("ko", "ru") => "Перевод:",
        ("ru", "ko") => "번역:",
        _ => "Translation:",
    }
}
