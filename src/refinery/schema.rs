// * Data model of the extraction pipeline
// * SelectorSet -> ExtractionResult (per page) -> AggregateResult (per request)

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("Container selector must not be empty")]
    EmptyContainer,
}

/// One CSS selector per semantic field of a review
///
/// Only the container selector is mandatory. Absent field selectors simply
/// leave that field absent in the extracted records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectorSet {
    container: String,
    title: Option<String>,
    rating: Option<String>,
    body: Option<String>,
    reviewer: Option<String>,
    date: Option<String>,
    next_page: Option<String>,
}

impl SelectorSet {
    /// Creates a set with only a container selector
    pub fn new(container: impl Into<String>) -> Result<Self, SchemaError> {
        let container = container.into().trim().to_string();
        if container.is_empty() {
            return Err(SchemaError::EmptyContainer);
        }

        Ok(Self {
            container,
            title: None,
            rating: None,
            body: None,
            reviewer: None,
            date: None,
            next_page: None,
        })
    }

    pub fn with_title(mut self, selector: impl Into<String>) -> Self {
        self.title = non_empty(selector.into());
        self
    }

    pub fn with_rating(mut self, selector: impl Into<String>) -> Self {
        self.rating = non_empty(selector.into());
        self
    }

    pub fn with_body(mut self, selector: impl Into<String>) -> Self {
        self.body = non_empty(selector.into());
        self
    }

    pub fn with_reviewer(mut self, selector: impl Into<String>) -> Self {
        self.reviewer = non_empty(selector.into());
        self
    }

    pub fn with_date(mut self, selector: impl Into<String>) -> Self {
        self.date = non_empty(selector.into());
        self
    }

    pub fn with_next_page(mut self, selector: impl Into<String>) -> Self {
        self.next_page = non_empty(selector.into());
        self
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn rating(&self) -> Option<&str> {
        self.rating.as_deref()
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn reviewer(&self) -> Option<&str> {
        self.reviewer.as_deref()
    }

    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    pub fn next_page(&self) -> Option<&str> {
        self.next_page.as_deref()
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Fully rendered page as handed over by the renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// Final URL after redirects
    pub url: String,
    pub html: String,
}

impl RenderedPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }
}

/// Where the selector set applied to a page came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SelectorSource {
    /// Reused from an earlier page with the same template
    Cached,
    /// Produced by the inference provider for this page
    Inferred,
    /// Entry `n` of the fallback table
    Fallback(usize),
}

impl SelectorSource {
    pub fn label(&self) -> &'static str {
        match self {
            SelectorSource::Cached => "cached",
            SelectorSource::Inferred => "inferred",
            SelectorSource::Fallback(_) => "fallback",
        }
    }
}

/// A single review as found on the page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReview {
    pub title: Option<String>,
    pub body: Option<String>,
    /// Normalized to 1-5
    pub rating: Option<u8>,
    pub reviewer: Option<String>,
    /// Left exactly as displayed on the page
    pub date: Option<String>,
}

impl RawReview {
    /// A record is kept only when it carries a title or a body
    pub fn has_content(&self) -> bool {
        let filled = |field: &Option<String>| field.as_deref().is_some_and(|s| !s.trim().is_empty());
        filled(&self.title) || filled(&self.body)
    }
}

/// Records pulled from one page with one selector set
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub reviews: Vec<RawReview>,
    pub selectors: SelectorSet,
    pub source: SelectorSource,
    /// Container selector matched at least one element
    pub success: bool,
    pub containers_matched: usize,
}

impl ExtractionResult {
    /// Result for a page where the selector set found nothing
    pub fn empty(selectors: SelectorSet, source: SelectorSource) -> Self {
        Self {
            reviews: Vec::new(),
            selectors,
            source,
            success: false,
            containers_matched: 0,
        }
    }

    /// True when the set produced at least one accepted record
    pub fn is_productive(&self) -> bool {
        !self.reviews.is_empty()
    }
}

/// Final output of one extraction request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateResult {
    pub pages_processed: u32,
    pub reviews: Vec<RawReview>,
    pub average_rating: Option<f64>,
    /// Set when pagination stopped on a failure or cancellation
    pub incomplete: bool,
}

impl AggregateResult {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_container_rejected() {
        assert_eq!(SelectorSet::new("   "), Err(SchemaError::EmptyContainer));
    }

    #[test]
    fn test_blank_field_selectors_become_absent() {
        let set = SelectorSet::new("div.review")
            .unwrap()
            .with_title("h3")
            .with_rating("  ");
        assert_eq!(set.title(), Some("h3"));
        assert_eq!(set.rating(), None);
    }

    #[test]
    fn test_has_content_requires_title_or_body() {
        let empty = RawReview {
            title: Some("  ".into()),
            reviewer: Some("Ann".into()),
            rating: Some(4),
            ..Default::default()
        };
        assert!(!empty.has_content());

        let body_only = RawReview {
            body: Some("Works as described".into()),
            ..Default::default()
        };
        assert!(body_only.has_content());
    }

    #[test]
    fn test_aggregate_json_shape() {
        let result = AggregateResult {
            pages_processed: 1,
            reviews: vec![RawReview {
                title: Some("Solid".into()),
                rating: Some(5),
                ..Default::default()
            }],
            average_rating: None,
            incomplete: false,
        };

        let value: serde_json::Value = serde_json::from_str(&result.to_json()).unwrap();
        assert_eq!(value["pages_processed"], 1);
        assert_eq!(value["reviews"][0]["rating"], 5);
        assert!(value["average_rating"].is_null());
        assert_eq!(value["incomplete"], false);
    }
}
