//! Loop guard — recognizes relay-authored text before anything else runs.
//!
//! Every comment the relay writes is itself a candidate input on the next
//! webhook delivery, so the pipeline must terminate the loop here. The
//! guard is a pure predicate evaluated before any external call.
//!
//! The composer embeds [`SENTINEL`] in every body it produces; the guard
//! checks for the same constant. Detection and tagging share this single
//! source of truth — there is no second copy of the marker anywhere.

use crate::pipeline::types::SkipReason;

/// Current sentinel marker, embedded once in every relay-authored comment.
pub const SENTINEL: &str = "[RELAY:v1]";

/// Markers emitted by earlier protocol versions. Tickets retain history
/// indefinitely, so these are recognized permanently.
pub const LEGACY_MARKERS: &[&str] = &["[Auto-translated]", "[Original", "[AI] [", "자동 번역"];

/// Result of classifying raw incoming text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Human-authored as far as the guard can tell — continue the pipeline.
    Proceed,
    /// Relay-authored — terminate here.
    Skip(SkipReason),
}

/// Classify raw incoming text.
///
/// A substring match, not equality: agents may quote or partially edit a
/// relay comment, and the quoted marker must still stop the loop.
pub fn classify(text: &str) -> Classification {
    if contains_marker(text) {
        Classification::Skip(SkipReason::LoopMarker)
    } else {
        Classification::Proceed
    }
}

fn contains_marker(text: &str) -> bool {
    text.contains(SENTINEL) || LEGACY_MARKERS.iter().any(|m| text.contains(m))
}
