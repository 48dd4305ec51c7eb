//! Relay orchestrator — ties guard, resolver, invoker and composer together.
//!
//! **Core invariant: the relay never re-processes its own output.**
//!
//! One request moves through:
//! `Received → Classified → Resolved → Translated → Composed → Posting(i/n) → Done`,
//! with terminal `Skipped(reason)` and `Failed(stage, cause)`. The two
//! external calls (translate, ticket write) are the only suspension points
//! and both run under a bounded timeout. Writes are sequential — quote
//! before translation — and are never rolled back: the ticketing platform
//! has no transaction primitive, so a partial failure reports exactly how
//! many writes committed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::TranslateError;
use crate::pipeline::composer;
use crate::pipeline::guard::{self, Classification};
use crate::pipeline::resolver::{self, MIN_DETECT_LEN, ResolverPolicy};
use crate::pipeline::types::{Outcome, SkipReason, Stage, TranslationRequest};
use crate::ticket::TicketApi;
use crate::translate::Translator;

/// Per-ticket write serialization.
///
/// Two webhook deliveries for the same ticket may be processed
/// concurrently; without this, one request's quote/translation pair could
/// be split by another request's writes landing in between. Entries are
/// kept for the process lifetime — the map grows with the number of
/// distinct tickets seen, which is fine at support-desk scale.
#[derive(Clone, Default)]
struct TicketLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl TicketLocks {
    fn lock_for(&self, ticket_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            map.entry(ticket_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}

/// The relay pipeline. Holds no request-scoped mutable state; both
/// collaborators are injected so tests can substitute doubles.
pub struct RelayPipeline {
    translator: Arc<dyn Translator>,
    tickets: Arc<dyn TicketApi>,
    policy: ResolverPolicy,
    call_timeout: Duration,
    locks: TicketLocks,
}

impl RelayPipeline {
    pub fn new(
        translator: Arc<dyn Translator>,
        tickets: Arc<dyn TicketApi>,
        policy: ResolverPolicy,
        call_timeout: Duration,
    ) -> Self {
        Self {
            translator,
            tickets,
            policy,
            call_timeout,
            locks: TicketLocks::default(),
        }
    }

    /// Process a single request to a terminal outcome.
    pub async fn process(&self, request: TranslationRequest) -> Outcome {
        info!(
            request_id = %request.id,
            ticket_id = %request.ticket_id,
            origin = request.origin.as_str(),
            "Processing translation request"
        );

        // Classified
        if let Classification::Skip(reason) = guard::classify(&request.text) {
            info!(
                request_id = %request.id,
                ticket_id = %request.ticket_id,
                reason = reason.as_str(),
                "Request skipped by loop guard"
            );
            return Outcome::Skipped { reason };
        }

        // Resolved
        let detected = self.detect_language(&request).await;
        let mut decision = match resolver::resolve(&request, detected.as_deref(), &self.policy) {
            Ok(decision) => decision,
            Err(reason) => {
                info!(
                    request_id = %request.id,
                    ticket_id = %request.ticket_id,
                    reason = reason.as_str(),
                    "Request skipped by resolver"
                );
                return Outcome::Skipped { reason };
            }
        };
        debug!(
            request_id = %request.id,
            direction = %decision.direction(),
            outputs = decision.outputs.len(),
            "Routing decision made"
        );

        // Translated
        let translate = self
            .translator
            .translate(&request.text, &decision.from, &decision.to);
        let translation = match tokio::time::timeout(self.call_timeout, translate).await {
            Err(_) => {
                let cause = TranslateError::Timeout {
                    timeout: self.call_timeout,
                };
                warn!(
                    request_id = %request.id,
                    ticket_id = %request.ticket_id,
                    direction = %decision.direction(),
                    "Translation call timed out"
                );
                return Outcome::Failed {
                    stage: Stage::Translate,
                    comments_posted: 0,
                    cause: cause.to_string(),
                };
            }
            Ok(Err(e)) => {
                warn!(
                    request_id = %request.id,
                    ticket_id = %request.ticket_id,
                    direction = %decision.direction(),
                    error = %e,
                    "Translation call failed"
                );
                return Outcome::Failed {
                    stage: Stage::Translate,
                    comments_posted: 0,
                    cause: e.to_string(),
                };
            }
            Ok(Ok(translation)) => translation,
        };

        // A service that echoes the input back has nothing to say —
        // writing it would only add noise to the ticket.
        if translation.text.trim() == request.text.trim() {
            info!(
                request_id = %request.id,
                ticket_id = %request.ticket_id,
                "Translation identical to input, skipping"
            );
            return Outcome::Skipped {
                reason: SkipReason::IdenticalTranslation,
            };
        }

        // The service may resolve "auto" where the detector could not.
        if decision.from == "auto"
            && let Some(source) = &translation.detected_source
        {
            decision.from = source.clone();
        }

        // Composed
        let comments = composer::compose(&request, &translation.text, &decision);

        // Posting(i/n) — serialized per ticket so this request's writes
        // land contiguously. Runs on its own task: a caller that aborts
        // (client disconnect drops this future) must not cancel a write
        // that was already issued, so the task owns the whole sequence
        // and survives the drop.
        let tickets = Arc::clone(&self.tickets);
        let locks = self.locks.clone();
        let call_timeout = self.call_timeout;
        let request_id = request.id;
        let ticket_id = request.ticket_id.clone();
        let direction = decision.direction();
        let to_post = comments.clone();

        let posting = tokio::spawn(async move {
            let ticket_lock = locks.lock_for(&ticket_id);
            let _guard = ticket_lock.lock_owned().await;

            for (i, comment) in to_post.iter().enumerate() {
                let write = tickets.put_comment(&ticket_id, comment);
                let result = match tokio::time::timeout(call_timeout, write).await {
                    Err(_) => Err(crate::error::TicketError::Timeout {
                        ticket_id: ticket_id.clone(),
                        timeout: call_timeout,
                    }),
                    Ok(result) => result,
                };

                if let Err(e) = result {
                    warn!(
                        request_id = %request_id,
                        ticket_id = %ticket_id,
                        direction = %direction,
                        comments_posted = i,
                        planned = to_post.len(),
                        error = %e,
                        "Ticket write failed; earlier writes stay committed"
                    );
                    return Err((i, e.to_string()));
                }
                debug!(
                    request_id = %request_id,
                    ticket_id = %ticket_id,
                    write = i + 1,
                    planned = to_post.len(),
                    "Ticket write committed"
                );
            }
            Ok(())
        });

        match posting.await {
            Ok(Ok(())) => {}
            Ok(Err((posted, cause))) => {
                return Outcome::Failed {
                    stage: Stage::TicketWrite,
                    comments_posted: posted,
                    cause,
                };
            }
            // Task panic — writes past the panic point never ran.
            Err(e) => {
                return Outcome::Failed {
                    stage: Stage::TicketWrite,
                    comments_posted: 0,
                    cause: e.to_string(),
                };
            }
        }

        info!(
            request_id = %request.id,
            ticket_id = %request.ticket_id,
            direction = %decision.direction(),
            comments_posted = comments.len(),
            "Request done"
        );
        Outcome::Posted {
            translated: translation.text,
            direction: decision.direction(),
            comments,
        }
    }

    /// Best-effort language detection. Only attempted when the request
    /// needs it (declared "auto" source, or strict enforcement) and the
    /// text is long enough to detect reliably. Failures are logged and
    /// treated as undetermined.
    async fn detect_language(&self, request: &TranslationRequest) -> Option<String> {
        let wanted = request.source_lang == "auto" || self.policy.strict_language;
        if !wanted || request.text.chars().count() < MIN_DETECT_LEN {
            return None;
        }

        match tokio::time::timeout(self.call_timeout, self.translator.detect(&request.text)).await
        {
            Ok(Ok(detected)) => detected,
            Ok(Err(e)) => {
                warn!(
                    request_id = %request.id,
                    error = %e,
                    "Language detection failed, treating as undetermined"
                );
                None
            }
            Err(_) => {
                warn!(request_id = %request.id, "Language detection timed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::error::TicketError;
    use crate::pipeline::types::{ComposedComment, OriginRole, SkipReason};
    use crate::translate::Translation;

    /// Mock translator: prefixes the text, counts calls, optional delay.
    struct MockTranslator {
        calls: AtomicUsize,
        detected: Option<String>,
        echo: bool,
        delay: Option<Duration>,
        fail: bool,
    }

    impl Default for MockTranslator {
        fn default() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                detected: None,
                echo: false,
                delay: None,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl Translator for MockTranslator {
        async fn translate(
            &self,
            text: &str,
            _from: &str,
            _to: &str,
        ) -> Result<Translation, TranslateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(TranslateError::ServiceError {
                    status: 503,
                    body: "unavailable".into(),
                });
            }
            let translated = if self.echo {
                text.to_string()
            } else {
                format!("translated: {text}")
            };
            Ok(Translation {
                text: translated,
                detected_source: self.detected.clone(),
            })
        }

        async fn detect(&self, _text: &str) -> Result<Option<String>, TranslateError> {
            Ok(self.detected.clone())
        }
    }

    /// Mock ticket sink: records writes, optionally fails at an index.
    /// `started_tx` signals the moment a write is issued, before the
    /// simulated network delay.
    #[derive(Default)]
    struct MockTickets {
        writes: Mutex<Vec<(String, ComposedComment)>>,
        fail_at: Option<usize>,
        delay: Option<Duration>,
        started_tx: Option<tokio::sync::mpsc::UnboundedSender<()>>,
    }

    #[async_trait]
    impl TicketApi for MockTickets {
        async fn put_comment(
            &self,
            ticket_id: &str,
            comment: &ComposedComment,
        ) -> Result<(), TicketError> {
            if let Some(tx) = &self.started_tx {
                let _ = tx.send(());
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let mut writes = self.writes.lock().unwrap();
            if self.fail_at == Some(writes.len()) {
                return Err(TicketError::ServiceError {
                    ticket_id: ticket_id.to_string(),
                    status: 500,
                    body: "boom".into(),
                });
            }
            writes.push((ticket_id.to_string(), comment.clone()));
            Ok(())
        }
    }

    fn make_pipeline(
        translator: MockTranslator,
        tickets: MockTickets,
    ) -> (RelayPipeline, Arc<MockTranslator>, Arc<MockTickets>) {
        let translator = Arc::new(translator);
        let tickets = Arc::new(tickets);
        let pipeline = RelayPipeline::new(
            Arc::clone(&translator) as Arc<dyn Translator>,
            Arc::clone(&tickets) as Arc<dyn TicketApi>,
            ResolverPolicy::default(),
            Duration::from_secs(2),
        );
        (pipeline, translator, tickets)
    }

    fn client_request(text: &str) -> TranslationRequest {
        TranslationRequest::new(text, "ko", "ru", "1", OriginRole::Client, false)
    }

    #[tokio::test]
    async fn relay_authored_text_is_skipped_without_external_calls() {
        let (pipeline, translator, tickets) =
            make_pipeline(MockTranslator::default(), MockTickets::default());

        let request = client_request("[RELAY:v1] [ko→ru]\nПеревод:\nтекст");
        let outcome = pipeline.process(request).await;

        assert!(matches!(
            outcome,
            Outcome::Skipped {
                reason: SkipReason::LoopMarker
            }
        ));
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
        assert!(tickets.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn same_language_never_reaches_the_translator() {
        let (pipeline, translator, tickets) =
            make_pipeline(MockTranslator::default(), MockTickets::default());

        let request =
            TranslationRequest::new("same", "en", "en", "4", OriginRole::Client, false);
        let outcome = pipeline.process(request).await;

        assert!(matches!(
            outcome,
            Outcome::Skipped {
                reason: SkipReason::SameLanguage
            }
        ));
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
        assert!(tickets.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn public_client_is_skipped_regardless_of_text() {
        let (pipeline, translator, _tickets) =
            make_pipeline(MockTranslator::default(), MockTickets::default());

        let request =
            TranslationRequest::new("안녕하세요 고객입니다", "ko", "ru", "9", OriginRole::Client, true);
        let outcome = pipeline.process(request).await;

        assert!(matches!(
            outcome,
            Outcome::Skipped {
                reason: SkipReason::InvalidOriginVisibility
            }
        ));
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn identical_translation_skips_after_invoking_but_before_writing() {
        let translator = MockTranslator {
            echo: true,
            ..Default::default()
        };
        let (pipeline, translator, tickets) = make_pipeline(translator, MockTickets::default());

        let outcome = pipeline.process(client_request("unchanged text")).await;

        assert!(matches!(
            outcome,
            Outcome::Skipped {
                reason: SkipReason::IdenticalTranslation
            }
        ));
        assert_eq!(translator.calls.load(Ordering::SeqCst), 1);
        assert!(tickets.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn client_request_posts_two_private_comments_quote_first() {
        let (pipeline, _translator, tickets) =
            make_pipeline(MockTranslator::default(), MockTickets::default());

        let outcome = pipeline.process(client_request("안녕하세요")).await;

        match outcome {
            Outcome::Posted {
                translated,
                direction,
                comments,
            } => {
                assert_eq!(translated, "translated: 안녕하세요");
                assert_eq!(direction, "ko→ru");
                assert_eq!(comments.len(), 2);
            }
            other => panic!("expected Posted, got {other:?}"),
        }

        let writes = tickets.writes.lock().unwrap();
        assert_eq!(writes.len(), 2);
        assert!(writes.iter().all(|(id, c)| id == "1" && !c.public));
        assert!(writes[0].1.body.contains("안녕하세요"));
        assert!(writes[1].1.body.contains("translated: 안녕하세요"));
    }

    #[tokio::test]
    async fn public_agent_posts_private_quote_then_public_translation() {
        let (pipeline, _translator, tickets) =
            make_pipeline(MockTranslator::default(), MockTickets::default());

        let request =
            TranslationRequest::new("Здравствуйте", "ru", "ko", "2", OriginRole::Agent, true);
        let outcome = pipeline.process(request).await;

        assert!(matches!(outcome, Outcome::Posted { .. }));
        let writes = tickets.writes.lock().unwrap();
        assert_eq!(writes.len(), 2);
        assert!(!writes[0].1.public);
        assert!(writes[1].1.public);
    }

    #[tokio::test]
    async fn second_write_failure_reports_one_committed_write() {
        let tickets = MockTickets {
            fail_at: Some(1),
            ..Default::default()
        };
        let (pipeline, _translator, tickets) = make_pipeline(MockTranslator::default(), tickets);

        let outcome = pipeline.process(client_request("안녕하세요")).await;

        match outcome {
            Outcome::Failed {
                stage,
                comments_posted,
                ..
            } => {
                assert_eq!(stage, Stage::TicketWrite);
                assert_eq!(comments_posted, 1);
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        // The quote is still on the ticket — no rollback.
        assert_eq!(tickets.writes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn translation_failure_attempts_no_writes() {
        let translator = MockTranslator {
            fail: true,
            ..Default::default()
        };
        let (pipeline, _translator, tickets) = make_pipeline(translator, MockTickets::default());

        let outcome = pipeline.process(client_request("안녕하세요")).await;

        match outcome {
            Outcome::Failed {
                stage,
                comments_posted,
                cause,
            } => {
                assert_eq!(stage, Stage::Translate);
                assert_eq!(comments_posted, 0);
                assert!(cause.contains("503"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(tickets.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn translation_timeout_is_reported_as_timeout() {
        let translator = Arc::new(MockTranslator {
            delay: Some(Duration::from_secs(5)),
            ..Default::default()
        });
        let tickets = Arc::new(MockTickets::default());
        let pipeline = RelayPipeline::new(
            Arc::clone(&translator) as Arc<dyn Translator>,
            Arc::clone(&tickets) as Arc<dyn TicketApi>,
            ResolverPolicy::default(),
            Duration::from_millis(50),
        );

        let outcome = pipeline.process(client_request("안녕하세요")).await;

        match outcome {
            Outcome::Failed { stage, cause, .. } => {
                assert_eq!(stage, Stage::Translate);
                assert!(cause.contains("timed out"), "cause: {cause}");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn auto_source_direction_uses_detected_language() {
        let translator = MockTranslator {
            detected: Some("ko".into()),
            ..Default::default()
        };
        let (pipeline, _translator, tickets) = make_pipeline(translator, MockTickets::default());

        let request = TranslationRequest::new(
            "안녕하세요! 제 주문이 어디에 있는지 알려주세요?",
            "auto",
            "ru",
            "5",
            OriginRole::Client,
            false,
        );
        let outcome = pipeline.process(request).await;

        match outcome {
            Outcome::Posted { direction, .. } => assert_eq!(direction, "ko→ru"),
            other => panic!("expected Posted, got {other:?}"),
        }
        let writes = tickets.writes.lock().unwrap();
        assert!(writes[0].1.body.contains("[ko→ru]"));
    }

    #[tokio::test]
    async fn strict_mode_skips_unexpected_language() {
        let translator = Arc::new(MockTranslator {
            detected: Some("en".into()),
            ..Default::default()
        });
        let tickets = Arc::new(MockTickets::default());
        let pipeline = RelayPipeline::new(
            Arc::clone(&translator) as Arc<dyn Translator>,
            Arc::clone(&tickets) as Arc<dyn TicketApi>,
            ResolverPolicy {
                strict_language: true,
                agent_lang: Some("ru".into()),
                client_lang: Some("ko".into()),
            },
            Duration::from_secs(2),
        );

        let request = TranslationRequest::new(
            "this is clearly english text",
            "auto",
            "ru",
            "6",
            OriginRole::Client,
            false,
        );
        let outcome = pipeline.process(request).await;

        assert!(matches!(
            outcome,
            Outcome::Skipped {
                reason: SkipReason::UnexpectedLanguage
            }
        ));
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn writes_for_the_same_ticket_are_contiguous() {
        let tickets = MockTickets {
            delay: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        let (pipeline, _translator, tickets) = make_pipeline(MockTranslator::default(), tickets);
        let pipeline = Arc::new(pipeline);

        let a = TranslationRequest::new("first message", "ko", "ru", "7", OriginRole::Client, false);
        let b = TranslationRequest::new("second message", "ko", "ru", "7", OriginRole::Client, false);

        let (oa, ob) = tokio::join!(
            pipeline.process(a),
            pipeline.process(b)
        );
        assert!(matches!(oa, Outcome::Posted { .. }));
        assert!(matches!(ob, Outcome::Posted { .. }));

        let writes = tickets.writes.lock().unwrap();
        assert_eq!(writes.len(), 4);
        // Each request's quote/translation pair must not be interleaved
        // with the other request's writes.
        let marker = |body: &str| {
            if body.contains("first message") { "a" } else { "b" }
        };
        assert_eq!(marker(&writes[0].1.body), marker(&writes[1].1.body));
        assert_eq!(marker(&writes[2].1.body), marker(&writes[3].1.body));
    }

    #[tokio::test]
    async fn aborted_request_does_not_cancel_issued_writes() {
        // A client disconnect drops the request future mid-posting. The
        // write that was already issued — and the rest of the planned
        // sequence — must still commit.
        let (started_tx, mut started_rx) = tokio::sync::mpsc::unbounded_channel();
        let tickets = MockTickets {
            delay: Some(Duration::from_millis(100)),
            started_tx: Some(started_tx),
            ..Default::default()
        };
        let (pipeline, _translator, tickets) = make_pipeline(MockTranslator::default(), tickets);
        let pipeline = Arc::new(pipeline);

        let handle = tokio::spawn({
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.process(client_request("안녕하세요")).await }
        });

        // Wait until the quote write is in flight, then abort the caller.
        started_rx.recv().await.unwrap();
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        // Give the detached posting task time to finish both writes.
        tokio::time::sleep(Duration::from_millis(400)).await;
        let writes = tickets.writes.lock().unwrap();
        assert_eq!(
            writes.len(),
            2,
            "issued writes must complete after the caller aborts"
        );
    }

    #[tokio::test]
    async fn short_text_skips_detection_entirely() {
        // Text below the detection threshold with strict mode on still
        // passes through (undetermined is not a rejection).
        let translator = Arc::new(MockTranslator {
            detected: Some("en".into()),
            ..Default::default()
        });
        let tickets = Arc::new(MockTickets::default());
        let pipeline = RelayPipeline::new(
            Arc::clone(&translator) as Arc<dyn Translator>,
            Arc::clone(&tickets) as Arc<dyn TicketApi>,
            ResolverPolicy {
                strict_language: true,
                agent_lang: Some("ru".into()),
                client_lang: Some("ko".into()),
            },
            Duration::from_secs(2),
        );

        let request = TranslationRequest::new("짧다", "ko", "ru", "8", OriginRole::Client, false);
        let outcome = pipeline.process(request).await;
        assert!(matches!(outcome, Outcome::Posted { .. }));
    }
}
