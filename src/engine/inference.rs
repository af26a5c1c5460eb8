// * Selector Inference Engine
// * Asks a text-completion provider for review selectors and validates the answer strictly

use futures::future::BoxFuture;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::network::errors::InferenceError;
use crate::refinery::extractor::is_valid_selector;
use crate::refinery::sample::PageSample;
use crate::refinery::schema::SelectorSet;

// * Strings models emit instead of JSON null
const NULL_PLACEHOLDERS: &[&str] = &["null", "none", "n/a", "na", "not found", "-"];

/// Text-completion capability consumed by the inference engine
pub trait TextCompleter: Send + Sync {
    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, InferenceError>>;
}

impl<T: TextCompleter + ?Sized> TextCompleter for Arc<T> {
    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, InferenceError>> {
        (**self).complete(prompt)
    }
}

/// Builds the fixed inference prompt around a page sample
pub fn build_prompt(sample: &PageSample) -> String {
    format!(
        "Analyze this HTML from {url} and identify the CSS selectors for customer review elements.\n\
         Return only a JSON object with these keys: container, title, rating, body, reviewer, date, next_page.\n\
         \"container\" selects the element repeated once per review. title, rating, body, reviewer and date \
         are relative to the container. next_page selects the link or button leading to the next page of reviews.\n\
         Each value must be a CSS selector string or null if not found.\n\
         Sample HTML:\n{excerpt}\n",
        url = sample.source_url(),
        excerpt = sample.excerpt(),
    )
}

#[derive(Debug, Deserialize)]
struct SelectorResponse {
    container: Option<String>,
    title: Option<String>,
    rating: Option<String>,
    body: Option<String>,
    reviewer: Option<String>,
    date: Option<String>,
    #[serde(alias = "pagination")]
    next_page: Option<String>,
}

/// Parses a provider answer into a selector set
///
/// The answer must contain one JSON object; code fences and chatter around it
/// are tolerated. A missing, empty or invalid container selector is a failure.
/// Invalid optional selectors are dropped.
pub fn parse_selector_response(text: &str) -> Result<SelectorSet, InferenceError> {
    let start = text
        .find('{')
        .ok_or_else(|| InferenceError::Parse("no JSON object in response".to_string()))?;
    let end = text
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| InferenceError::Parse("unterminated JSON object".to_string()))?;

    let response: SelectorResponse = serde_json::from_str(&text[start..=end])
        .map_err(|e| InferenceError::Parse(e.to_string()))?;

    let container = response
        .container
        .as_deref()
        .and_then(clean_selector)
        .ok_or(InferenceError::EmptyContainer)?;

    if !is_valid_selector(&container) {
        return Err(InferenceError::InvalidSelector(container));
    }

    let set = SelectorSet::new(container).map_err(|_| InferenceError::EmptyContainer)?;
    let field = |value: &Option<String>| {
        value
            .as_deref()
            .and_then(clean_selector)
            .filter(|sel| {
                let valid = is_valid_selector(sel);
                if !valid {
                    debug!(selector = %sel, "Dropping invalid inferred field selector");
                }
                valid
            })
            .unwrap_or_default()
    };

    Ok(set
        .with_title(field(&response.title))
        .with_rating(field(&response.rating))
        .with_body(field(&response.body))
        .with_reviewer(field(&response.reviewer))
        .with_date(field(&response.date))
        .with_next_page(field(&response.next_page)))
}

fn clean_selector(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || NULL_PLACEHOLDERS.contains(&trimmed.to_lowercase().as_str()) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Inference with a per-attempt timeout and a single retry on timeout
pub struct SelectorInference<C> {
    completer: C,
    timeout: Duration,
    backoff: Duration,
}

impl<C: TextCompleter> SelectorInference<C> {
    pub fn new(completer: C, config: &PipelineConfig) -> Self {
        Self {
            completer,
            timeout: config.inference_timeout,
            backoff: config.retry_backoff,
        }
    }

    /// Infers a selector set for one page sample
    ///
    /// Output may vary run to run; callers validate it by extraction.
    pub async fn infer(&self, sample: &PageSample) -> Result<SelectorSet, InferenceError> {
        if sample.is_empty() {
            return Err(InferenceError::Parse("empty page sample".to_string()));
        }

        debug!(
            url = sample.source_url(),
            chars = sample.excerpt().chars().count(),
            cap = sample.cap(),
            "Requesting selectors"
        );
        let prompt = build_prompt(sample);
        let text = match self.attempt(&prompt).await {
            Err(e) if e.is_timeout() => {
                warn!(
                    url = sample.source_url(),
                    backoff_ms = self.backoff.as_millis() as u64,
                    "Inference timed out, retrying once"
                );
                tokio::time::sleep(self.backoff).await;
                self.attempt(&prompt).await?
            }
            other => other?,
        };

        let selectors = parse_selector_response(&text)?;
        info!(
            url = sample.source_url(),
            container = selectors.container(),
            "Selectors inferred"
        );
        Ok(selectors)
    }

    async fn attempt(&self, prompt: &str) -> Result<String, InferenceError> {
        match tokio::time::timeout(self.timeout, self.completer.complete(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(InferenceError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedCompleter {
        delays_ms: Vec<u64>,
        answer: String,
        calls: AtomicUsize,
    }

    impl ScriptedCompleter {
        fn new(delays_ms: Vec<u64>, answer: &str) -> Self {
            Self {
                delays_ms,
                answer: answer.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TextCompleter for ScriptedCompleter {
        fn complete<'a>(&'a self, _prompt: &'a str) -> BoxFuture<'a, Result<String, InferenceError>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.delays_ms.get(call).copied().unwrap_or(0);
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(self.answer.clone())
            })
        }
    }

    const ANSWER: &str = r#"{"container": "div.review", "title": "h3", "rating": ".stars",
        "body": "p", "reviewer": ".author", "date": null, "pagination": "a.next"}"#;

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            inference_timeout: Duration::from_millis(50),
            retry_backoff: Duration::from_millis(5),
            ..PipelineConfig::default()
        }
    }

    fn sample() -> PageSample {
        PageSample::from_html(
            "https://shop.test/item",
            "<html><body><div class=\"review\"><h3>Good</h3></div></body></html>",
            2_000,
        )
    }

    #[test]
    fn test_parse_plain_json() {
        let set = parse_selector_response(ANSWER).unwrap();
        assert_eq!(set.container(), "div.review");
        assert_eq!(set.date(), None);
        assert_eq!(set.next_page(), Some("a.next"));
    }

    #[test]
    fn test_parse_fenced_json_with_chatter() {
        let text = format!("Sure! Here you go:\n```json\n{}\n```", ANSWER);
        let set = parse_selector_response(&text).unwrap();
        assert_eq!(set.title(), Some("h3"));
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(parse_selector_response("I cannot help"), Err(InferenceError::Parse(_))));
        assert!(matches!(
            parse_selector_response(r#"{"container": "", "title": "h3"}"#),
            Err(InferenceError::EmptyContainer)
        ));
        assert!(matches!(
            parse_selector_response(r#"{"container": "null"}"#),
            Err(InferenceError::EmptyContainer)
        ));
        assert!(matches!(
            parse_selector_response(r#"{"container": "div[[["}"#),
            Err(InferenceError::InvalidSelector(_))
        ));
        assert!(matches!(
            parse_selector_response(r#"{"container": 42}"#),
            Err(InferenceError::Parse(_))
        ));
    }

    #[test]
    fn test_invalid_optional_selector_is_dropped() {
        let set = parse_selector_response(r#"{"container": "li.r", "title": "h3[[", "body": "N/A"}"#).unwrap();
        assert_eq!(set.title(), None);
        assert_eq!(set.body(), None);
    }

    #[test]
    fn test_prompt_is_deterministic_and_embeds_sample() {
        let s = sample();
        assert_eq!(build_prompt(&s), build_prompt(&s));
        assert!(build_prompt(&s).contains("https://shop.test/item"));
        assert!(build_prompt(&s).contains("class=\"review\""));
    }

    #[tokio::test]
    async fn test_single_retry_after_timeout() {
        let completer = ScriptedCompleter::new(vec![500, 0], ANSWER);
        let inference = SelectorInference::new(completer, &fast_config());
        let set = inference.infer(&sample()).await.unwrap();
        assert_eq!(set.container(), "div.review");
        assert_eq!(inference.completer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_timeout_gives_up() {
        let completer = ScriptedCompleter::new(vec![500, 500, 0], ANSWER);
        let inference = SelectorInference::new(completer, &fast_config());
        let err = inference.infer(&sample()).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(inference.completer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_parse_errors_are_not_retried() {
        let completer = ScriptedCompleter::new(vec![0, 0], "no json here");
        let inference = SelectorInference::new(completer, &fast_config());
        assert!(inference.infer(&sample()).await.is_err());
        assert_eq!(inference.completer.calls.load(Ordering::SeqCst), 1);
    }
}
