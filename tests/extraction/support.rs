//! Scripted in-memory provider and fixtures shared by extraction tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::DateTime;
use textcal::clock::{FixedClock, ReferenceClock};
use textcal::config::{BatchPolicy, ExtractionSettings};
use textcal::credentials::ApiKey;
use textcal::extraction::EventExtractor;
use textcal::providers::{
    CompletionRequest, CompletionResponse, LlmProvider, ProviderError, StopReason, UsageStats,
};

/// One scripted provider outcome.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Successful completion with this text.
    Text(String),
    /// Non-success HTTP status with this body.
    Status(u16, String),
    /// Provider envelope that could not be decoded.
    Malformed(String),
    /// Never answers.
    Hang,
}

/// Replays a fixed list of replies and records every request.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        let next = self
            .replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front());
        match next {
            Some(Reply::Text(text)) => Ok(CompletionResponse {
                text,
                stop_reason: StopReason::EndTurn,
                usage: UsageStats::default(),
                model: "scripted".to_owned(),
            }),
            Some(Reply::Status(status, body)) => Err(ProviderError::HttpStatus { status, body }),
            Some(Reply::Malformed(detail)) => Err(ProviderError::Parse(detail)),
            Some(Reply::Hang) => std::future::pending().await,
            None => panic!("scripted provider ran out of replies"),
        }
    }

    fn supports_json_mode(&self) -> bool {
        true
    }

    fn model_id(&self) -> &str {
        "scripted/test"
    }
}

/// Tuesday 2025-05-27 09:00 in UTC+02:00.
pub fn reference_clock() -> Arc<dyn ReferenceClock> {
    let at = DateTime::parse_from_rfc3339("2025-05-27T09:00:00+02:00").expect("valid instant");
    Arc::new(FixedClock::new(at, "Europe/Berlin"))
}

pub fn settings(max_retries: u32) -> ExtractionSettings {
    ExtractionSettings::new(ApiKey::new("test-key"), "openai/gpt-4o-mini", max_retries, 30)
        .expect("valid settings")
}

pub fn extractor(provider: &Arc<ScriptedProvider>, max_retries: u32) -> EventExtractor {
    extractor_with(provider, settings(max_retries))
}

pub fn extractor_with_policy(
    provider: &Arc<ScriptedProvider>,
    policy: BatchPolicy,
) -> EventExtractor {
    extractor_with(provider, settings(3).with_batch_policy(policy))
}

fn extractor_with(provider: &Arc<ScriptedProvider>, settings: ExtractionSettings) -> EventExtractor {
    let provider: Arc<dyn LlmProvider> = Arc::clone(provider) as Arc<dyn LlmProvider>;
    EventExtractor::new(settings, provider, reference_clock())
}

/// JSON for one event object.
pub fn event(summary: &str, start: &str, end: &str) -> serde_json::Value {
    serde_json::json!({
        "summary": summary,
        "start": start,
        "end": end,
    })
}

/// `{"events": [...]}` reply text.
pub fn envelope(events: Vec<serde_json::Value>) -> Reply {
    Reply::Text(serde_json::json!({ "events": events }).to_string())
}
