//! Polyglot Relay — bidirectional ticket translation relay.
//!
//! Sits between a support-ticketing platform and a machine-translation
//! service. Each ticket-comment webhook event is classified (was it written
//! by a human, or by the relay itself?), routed (which direction does the
//! translation flow, and who may see the result?), translated, and written
//! back to the ticket as a quoted original plus a translation comment.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod server;
pub mod ticket;
pub mod translate;
