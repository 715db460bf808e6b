//! Optional narrative summaries from a chat-completions deployment.
//!
//! Every failure is returned to the caller, which falls back to the
//! heuristic text; nothing here may abort an insight run.

use crate::client::{ApiClient, ClientError};
use crate::config::NarrativeConfig;
use crate::models::chat::{ChatMessage, ChatRequest, ChatResponse};
use std::time::Duration;

const API_VERSION: &str = "2024-02-15-preview";
pub const NARRATIVE_TIMEOUT: Duration = Duration::from_secs(20);

const SYSTEM_PROMPT: &str = "You write one-sentence solar potential summaries for a ZIP code. \
Start with the ZIP code followed by a colon. Mention whether today is above, below or near the \
30-day baseline and quote the mean GHI in W/m². No more than 40 words.";

/// Metrics handed to the narrative service for one ZIP.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeInput<'a> {
    pub zip: &'a str,
    pub ghi_today: f64,
    pub dni_today: f64,
    pub cloud_today: f64,
    pub ghi_baseline: Option<f64>,
    pub pct_change: Option<f64>,
    pub trend: Option<&'a str>,
}

pub struct NarrativeClient<'a> {
    http: &'a ApiClient,
    config: &'a NarrativeConfig,
}

impl<'a> NarrativeClient<'a> {
    pub fn new(http: &'a ApiClient, config: &'a NarrativeConfig) -> Self {
        NarrativeClient { http, config }
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.config.endpoint, self.config.deployment, API_VERSION
        )
    }

    pub fn summarize(&self, input: &NarrativeInput<'_>) -> Result<String, ClientError> {
        let request = build_request(input);
        let response: ChatResponse = self.http.post_json(
            &self.url(),
            &[("api-key", self.config.api_key.as_str())],
            &request,
            NARRATIVE_TIMEOUT,
        )?;
        first_content(&response)
    }
}

pub fn build_request(input: &NarrativeInput<'_>) -> ChatRequest {
    let baseline = match (input.ghi_baseline, input.pct_change) {
        (Some(b), Some(p)) => format!(
            "30-day baseline GHI {:.1} W/m²; today is {:+.1}% vs baseline ({}).",
            b,
            p,
            input.trend.unwrap_or("near")
        ),
        _ => "No usable 30-day baseline yet.".to_string(),
    };
    let user = format!(
        "ZIP {}. Today: mean GHI {:.1} W/m², DNI {:.1} W/m², cloud cover {:.1}%. {}",
        input.zip, input.ghi_today, input.dni_today, input.cloud_today, baseline
    );
    ChatRequest {
        messages: vec![
            ChatMessage {
                role: "system".to_string(),
                content: SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: user,
            },
        ],
        max_tokens: 120,
        temperature: 0.3,
    }
}

/// First non-empty choice, collapsed onto a single line.
pub fn first_content(response: &ChatResponse) -> Result<String, ClientError> {
    let text = response
        .choices
        .iter()
        .filter_map(|c| c.message.as_ref().and_then(|m| m.content.as_deref()))
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|s| !s.is_empty())
        .ok_or_else(|| ClientError::MissingData("narrative response had no content".to_string()))?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::decode_json;

    fn input() -> NarrativeInput<'static> {
        NarrativeInput {
            zip: "93727",
            ghi_today: 250.0,
            dni_today: 180.04,
            cloud_today: 5.0,
            ghi_baseline: Some(200.0),
            pct_change: Some(25.0),
            trend: Some("above"),
        }
    }

    #[test]
    fn request_carries_metrics_and_trend() {
        let req = build_request(&input());
        assert_eq!(req.messages.len(), 2);
        let user = &req.messages[1].content;
        assert!(user.contains("ZIP 93727"));
        assert!(user.contains("GHI 250.0"));
        assert!(user.contains("+25.0%"));
        assert!(user.contains("above"));
    }

    #[test]
    fn request_without_baseline_says_so() {
        let mut no_base = input();
        no_base.ghi_baseline = None;
        no_base.pct_change = None;
        let req = build_request(&no_base);
        assert!(req.messages[1].content.contains("No usable 30-day baseline"));
    }

    #[test]
    fn content_is_trimmed_to_one_line() {
        let response: ChatResponse = decode_json(
            r#"{"choices":[{"message":{"content":"  93727: sunny\n and bright. "}}]}"#,
        )
        .unwrap();
        assert_eq!(first_content(&response).unwrap(), "93727: sunny and bright.");
    }

    #[test]
    fn blank_or_missing_content_is_an_error() {
        let blank: ChatResponse = decode_json(r#"{"choices":[{"message":{"content":"   "}}]}"#).unwrap();
        assert!(first_content(&blank).is_err());
        let none: ChatResponse = decode_json(r#"{"choices":[]}"#).unwrap();
        assert!(first_content(&none).is_err());
    }
}
