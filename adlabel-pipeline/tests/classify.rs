mod common;

use adlabel_common::LabelerError;
use adlabel_llm::completion::TokenUsage;
use adlabel_llm::traits::Role;
use adlabel_pipeline::classifier::{MAX_COMPLETION_TOKENS, SYSTEM_INSTRUCTION};
use adlabel_pipeline::{AdClassifier, AdField, AdRecord, Label, RetryPolicy};
use common::{completion, provider_down, ScriptedProvider};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::{Layer, Registry};

/// Counts WARN events and the ones whose message matches `message`.
#[derive(Clone, Default)]
struct WarnCounter {
    message: &'static str,
    warns: Arc<AtomicUsize>,
    matching: Arc<AtomicUsize>,
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::WARN {
            return;
        }
        self.warns.fetch_add(1, Ordering::SeqCst);
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        if visitor.0 == self.message {
            self.matching.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn harris_ad() -> AdRecord {
    AdRecord::new("1946402405848135")
        .with(
            AdField::Body,
            "We have entered the final stretch of this race, and we need to look at Donald Trump \
             and remember -- I mean really remember -- who he is.\n\n\
             Trump is the guy who prefers to run on problems instead of finding solutions.\n\n\
             Trump is the guy who spends his time name-calling and demeaning his fellow Americans \
             -- including our veterans.\n\n\
             Trump is the guy who said that women should be punished for having abortions.\n\n\
             That is who Donald Trump and his allies are. Now, we must remember who we are and \
             fight for the country we so love. Donate right away. #gotrump",
        )
        .with(AdField::LinkTitle, "['Now or never']")
        .with(AdField::DeliveryStart, "2024-10-28")
        .with(AdField::DeliveryStop, "2024-10-29")
        .with(AdField::Bylines, "HARRIS VICTORY FUND")
        .with(AdField::Transcript, "you")
}

#[tokio::test]
async fn harris_ad_end_to_end() {
    let provider = Arc::new(ScriptedProvider::answering(completion(
        "Presidential",
        412,
        2,
        414,
    )));
    let classifier = AdClassifier::new(provider.clone(), 0.0);

    let result = classifier.analyze(&harris_ad()).await;

    assert_eq!(result.ad_id, "1946402405848135");
    assert_eq!(result.label, Label::Presidential);
    assert_eq!(
        result.usage,
        TokenUsage {
            prompt_tokens: 412,
            completion_tokens: 2,
            total_tokens: 414
        }
    );

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.model, "llama-3.1-8b-instant");
    assert_eq!(req.temperature, 0.0);
    assert_eq!(req.max_completion_tokens, MAX_COMPLETION_TOKENS);
    assert_eq!(req.messages.len(), 2);
    assert_eq!(req.messages[0].role, Role::System);
    assert_eq!(req.messages[0].content, SYSTEM_INSTRUCTION);
    assert_eq!(req.messages[1].role, Role::User);
    let prompt = &req.messages[1].content;
    assert!(prompt.contains("Bylines: HARRIS VICTORY FUND\nLink Title: Now or never\nAd Text: "));
    assert!(prompt.ends_with("Stop Time: 2024-10-29\nTranscript: you"));

    let ad_text = prompt
        .lines()
        .find_map(|line| line.strip_prefix("Ad Text: "))
        .unwrap();
    assert!(ad_text.starts_with("We have entered the final stretch of this race"));
    assert!(!ad_text.contains("really"));
    assert!(ad_text.ends_with("for having abortions. That is w... #gotrump"), "{ad_text}");
    assert_eq!(ad_text.chars().count(), 400 + "... #gotrump".len());
}

#[tokio::test(start_paused = true)]
async fn two_failures_then_success_takes_three_calls_and_backs_off() {
    let provider = Arc::new(
        ScriptedProvider::answering(completion("Other", 100, 1, 101))
            .then(Err(provider_down()))
            .then(Err(provider_down())),
    );
    let classifier = AdClassifier::new(provider.clone(), 0.0);

    let start = Instant::now();
    let c = classifier.classify("Bylines: City PAC").await;

    assert_eq!(provider.calls(), 3);
    assert!(start.elapsed() >= Duration::from_secs(30));
    assert_eq!(c.label, Label::Other);
    assert_eq!(c.usage.total_tokens, 101);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_become_error() {
    let provider = Arc::new(
        ScriptedProvider::answering(completion("Other", 1, 1, 2))
            .then(Err(provider_down()))
            .then(Err(provider_down()))
            .then(Err(provider_down())),
    );
    let classifier = AdClassifier::new(provider.clone(), 0.0);

    let start = Instant::now();
    let c = classifier.classify("prompt").await;

    assert_eq!(provider.calls(), 3);
    assert_eq!(c.label, Label::Error);
    assert_eq!(c.usage, TokenUsage::default());
    // 10s + 20s, no sleep after the last attempt
    assert!(start.elapsed() >= Duration::from_secs(30));
    assert!(start.elapsed() < Duration::from_secs(40));
}

#[tokio::test(start_paused = true)]
async fn custom_policy_controls_attempts() {
    let provider = Arc::new(
        ScriptedProvider::answering(completion("Unsure", 1, 1, 2))
            .then(Err(provider_down()))
            .then(Err(provider_down())),
    );
    let classifier = AdClassifier::new(provider.clone(), 0.0)
        .with_retry_policy(RetryPolicy::new(2, Duration::from_secs(1), 2.0));

    let c = classifier.classify("prompt").await;
    assert_eq!(provider.calls(), 2);
    assert_eq!(c.label, Label::Error);
}

#[tokio::test]
async fn configuration_errors_are_not_retried() {
    let provider = Arc::new(
        ScriptedProvider::answering(completion("Other", 1, 1, 2))
            .then(Err(LabelerError::Config("bad endpoint".into()))),
    );
    let classifier = AdClassifier::new(provider.clone(), 0.0);

    let c = classifier.classify("prompt").await;
    assert_eq!(provider.calls(), 1);
    assert_eq!(c.label, Label::Error);
}

#[tokio::test]
async fn undecodable_provider_body_fails_on_the_first_attempt() {
    let counter = WarnCounter {
        message: "classify.retrying",
        ..Default::default()
    };
    let subscriber = Registry::default().with(counter.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let provider = Arc::new(
        ScriptedProvider::answering(completion("Other", 1, 1, 2)).then(Err(
            LabelerError::Response("decode error: expected value, body_snippet: <html>gateway</html>".into()),
        )),
    );
    let classifier = AdClassifier::new(provider.clone(), 0.0);

    let c = classifier.classify("prompt").await;
    assert_eq!(provider.calls(), 1);
    assert_eq!(c.label, Label::Error);
    assert_eq!(c.usage, TokenUsage::default());
    assert_eq!(counter.matching.load(Ordering::SeqCst), 0);
    assert_eq!(counter.warns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_choices_is_error_with_one_warning() {
    let counter = WarnCounter {
        message: "classify.malformed_response",
        ..Default::default()
    };
    let subscriber = Registry::default().with(counter.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let provider = Arc::new(ScriptedProvider::answering(json!({
        "id": "chatcmpl-x",
        "usage": {"prompt_tokens": 50, "completion_tokens": 1, "total_tokens": 51}
    })));
    let classifier = AdClassifier::new(provider.clone(), 0.0);

    let result = classifier.analyze(&AdRecord::new("77").with(AdField::Bylines, "X")).await;

    assert_eq!(result.ad_id, "77");
    assert_eq!(result.label, Label::Error);
    assert_eq!(result.usage, TokenUsage::default());
    assert_eq!(provider.calls(), 1);
    assert_eq!(counter.warns.load(Ordering::SeqCst), 1);
    assert_eq!(counter.matching.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn off_list_answer_is_invalid_response() {
    let provider = Arc::new(ScriptedProvider::answering(completion(
        "I think Presidential",
        30,
        5,
        35,
    )));
    let classifier = AdClassifier::new(provider, 0.0);

    let c = classifier.classify("prompt").await;
    assert_eq!(c.label, Label::InvalidResponse);
    assert_eq!(c.usage.total_tokens, 35);
}
