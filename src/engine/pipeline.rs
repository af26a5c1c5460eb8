// * Extraction Pipeline
// * Drives one request through render -> select -> extract -> paginate -> aggregate

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::PipelineConfig;
use crate::engine::fallback;
use crate::engine::fingerprint::template_fingerprint;
use crate::engine::inference::{SelectorInference, TextCompleter};
use crate::engine::normalization::validate_target_url;
use crate::engine::pagination::{PageState, PaginationController};
use crate::engine::renderer::{AdvanceTarget, PageRenderer, RenderError};
use crate::ops::telemetry;
use crate::refinery::aggregate::Aggregator;
use crate::refinery::extractor::{run_strategies, SelectorStrategy};
use crate::refinery::sample::PageSample;
use crate::refinery::schema::{
    AggregateResult, ExtractionResult, RenderedPage, SelectorSet, SelectorSource,
};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Initial page could not be rendered: {0}")]
    Render(#[from] RenderError),
}

impl PipelineError {
    pub fn label(&self) -> &'static str {
        match self {
            PipelineError::InvalidInput(_) => "invalid_input",
            PipelineError::Render(_) => "render_failure",
        }
    }
}

/// One caller request: a product URL and an optional page bound
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub url: String,
    pub max_pages: Option<u32>,
}

impl ExtractionRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_pages: None,
        }
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    /// Checks the request without touching the network
    pub fn validate(&self, default_max_pages: u32) -> Result<ValidatedRequest, PipelineError> {
        let url = validate_target_url(&self.url)
            .map_err(|e| PipelineError::InvalidInput(e.to_string()))?;

        let max_pages = self.max_pages.unwrap_or(default_max_pages);
        if max_pages == 0 {
            return Err(PipelineError::InvalidInput(
                "max_pages must be a positive integer".to_string(),
            ));
        }

        Ok(ValidatedRequest { url, max_pages })
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub url: Url,
    pub max_pages: u32,
}

// * Template fingerprint -> accepted selectors; None marks a template that defeated inference
type SelectorCache = HashMap<u64, Option<SelectorSet>>;

/// Request-scoped orchestrator owning one renderer session
pub struct ReviewPipeline<R, C> {
    renderer: R,
    inference: SelectorInference<C>,
    config: PipelineConfig,
}

impl<R: PageRenderer, C: TextCompleter> ReviewPipeline<R, C> {
    pub fn new(renderer: R, completer: C, config: PipelineConfig) -> Self {
        let inference = SelectorInference::new(completer, &config);
        Self {
            renderer,
            inference,
            config,
        }
    }

    /// Runs the request to completion
    pub async fn run(self, request: &ExtractionRequest) -> Result<AggregateResult, PipelineError> {
        self.run_until(request, std::future::pending()).await
    }

    /// Runs the request until it finishes or `cancel` resolves
    ///
    /// Cancellation keeps the pages already extracted and flags the result
    /// incomplete. The renderer session is closed on every path.
    pub async fn run_until<F>(
        mut self,
        request: &ExtractionRequest,
        cancel: F,
    ) -> Result<AggregateResult, PipelineError>
    where
        F: Future<Output = ()>,
    {
        let outcome = match request.validate(self.config.default_max_pages) {
            Ok(target) => self.drive(target, cancel).await,
            Err(e) => Err(e),
        };

        self.renderer.close().await;

        match &outcome {
            Ok(result) => {
                let label = if result.incomplete { "partial" } else { "complete" };
                telemetry::record_request(label);
                info!(
                    url = %request.url,
                    pages = result.pages_processed,
                    reviews = result.reviews.len(),
                    incomplete = result.incomplete,
                    "Extraction finished"
                );
            }
            Err(e) => {
                telemetry::record_request(e.label());
                warn!(url = %request.url, error = %e, "Extraction rejected");
            }
        }

        outcome
    }

    async fn drive<F>(
        &mut self,
        target: ValidatedRequest,
        cancel: F,
    ) -> Result<AggregateResult, PipelineError>
    where
        F: Future<Output = ()>,
    {
        let mut cancel = std::pin::pin!(cancel);
        let mut controller = PaginationController::new(target.max_pages);
        let mut aggregator = Aggregator::new();
        let mut cache = SelectorCache::new();
        let start_url = target.url.to_string();

        info!(url = %start_url, max_pages = target.max_pages, "Extraction started");

        let mut page = match until_cancelled(cancel.as_mut(), self.renderer.render(&start_url)).await {
            Some(Ok(page)) => page,
            Some(Err(e)) => {
                error!(url = %start_url, error = %e, "First page failed to render");
                controller.fail();
                return Err(PipelineError::Render(e));
            }
            None => {
                warn!(url = %start_url, "Cancelled before the first page rendered");
                return Ok(aggregator.finish(true));
            }
        };
        controller.page_ready(&page);

        loop {
            let extracted = match until_cancelled(
                cancel.as_mut(),
                Self::extract_page(&self.inference, self.config.sample_char_cap, &page, &mut cache),
            )
            .await
            {
                Some(result) => result,
                None => {
                    warn!(url = %page.url, "Cancelled during extraction");
                    controller.fail();
                    break;
                }
            };

            let page_yield = extracted.as_ref().map_or(0, |r| r.reviews.len());
            let next_selectors = extracted
                .as_ref()
                .filter(|r| r.is_productive())
                .map(|r| r.selectors.clone());

            match extracted {
                Some(result) => {
                    telemetry::record_page(result.source.label(), page_yield);
                    let added = aggregator.absorb(result);
                    info!(
                        url = %page.url,
                        page = controller.pages_ready(),
                        reviews = page_yield,
                        new_reviews = added,
                        "Page extracted"
                    );
                }
                None => aggregator.record_empty_page(),
            }

            if controller.page_extracted() == PageState::Done {
                break;
            }

            let next = match controller.next_target(&page, next_selectors.as_ref(), page_yield) {
                Some(next) => next,
                None => {
                    debug!(url = %page.url, "No next page found");
                    controller.exhausted();
                    break;
                }
            };

            match until_cancelled(cancel.as_mut(), self.renderer.advance(&next)).await {
                Some(Ok(Some(next_page))) => {
                    if !controller.page_ready(&next_page) {
                        break;
                    }
                    page = next_page;
                }
                Some(Ok(None)) => {
                    debug!(target = ?next, "Advance found nothing to follow");
                    controller.exhausted();
                    break;
                }
                // * A guessed page number past the last page is the end of the listing
                Some(Err(e)) if matches!(next, AdvanceTarget::Url(_)) && e.is_missing_page() => {
                    info!(target = ?next, error = %e, "Page-number pattern exhausted");
                    controller.exhausted();
                    break;
                }
                Some(Err(e)) => {
                    warn!(error = %e, target = ?next, "Advance failed, keeping pages so far");
                    controller.fail();
                    break;
                }
                None => {
                    warn!(target = ?next, "Cancelled while advancing");
                    controller.fail();
                    break;
                }
            }
        }

        debug!(
            state = ?controller.state(),
            pages = aggregator.pages_processed(),
            reviews = aggregator.review_count(),
            duplicates = aggregator.duplicates_dropped(),
            "Pagination stopped"
        );
        Ok(aggregator.finish(controller.state() == PageState::Failed))
    }

    /// Selects and applies a selector set for one page
    ///
    /// Inference runs at most once per page template. Its output competes
    /// with the fallback table and is accepted only if it yields records.
    async fn extract_page(
        inference: &SelectorInference<C>,
        sample_cap: usize,
        page: &RenderedPage,
        cache: &mut SelectorCache,
    ) -> Option<ExtractionResult> {
        let fingerprint = template_fingerprint(&page.html);
        let known = cache.get(&fingerprint).cloned();

        let mut strategies = Vec::new();
        match &known {
            Some(Some(set)) => {
                debug!(fingerprint = fingerprint, "Reusing selectors for known template");
                strategies.push(SelectorStrategy::new(SelectorSource::Cached, set.clone()));
            }
            Some(None) => {
                debug!(fingerprint = fingerprint, "Template previously defeated inference");
            }
            None => {
                let sample = PageSample::from_html(&page.url, &page.html, sample_cap);
                match inference.infer(&sample).await {
                    Ok(set) => strategies.push(SelectorStrategy::new(SelectorSource::Inferred, set)),
                    Err(e) => {
                        telemetry::record_inference(e.label());
                        warn!(url = %page.url, error = %e, "Selector inference failed, using fallback table");
                    }
                }
            }
        }
        strategies.extend(fallback::strategies());

        let run = run_strategies(&page.html, &strategies);

        if run.rejected.contains(&SelectorSource::Inferred) {
            telemetry::record_inference("zero_match");
            warn!(url = %page.url, "Inferred selectors matched no reviews, falling back");
        } else if run
            .accepted
            .as_ref()
            .map_or(false, |r| r.source == SelectorSource::Inferred)
        {
            telemetry::record_inference("success");
        }

        match run.accepted {
            Some(result) => {
                if let SelectorSource::Fallback(index) = result.source {
                    info!(url = %page.url, entry = index, "Fallback selectors accepted");
                }
                cache.insert(fingerprint, Some(result.selectors.clone()));
                Some(result)
            }
            None => {
                warn!(url = %page.url, "No selector set produced reviews on this page");
                if known.is_none() {
                    cache.insert(fingerprint, None);
                }
                run.first_attempt
            }
        }
    }
}

/// Polls `work` unless `cancel` resolves first
async fn until_cancelled<F, T>(cancel: Pin<&mut F>, work: impl Future<Output = T>) -> Option<T>
where
    F: Future<Output = ()>,
{
    tokio::select! {
        biased;
        _ = cancel => None,
        output = work => Some(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_page_bound() {
        let validated = ExtractionRequest::new("https://shop.test/p/1").validate(5).unwrap();
        assert_eq!(validated.max_pages, 5);
        assert_eq!(validated.url.host_str(), Some("shop.test"));
    }

    #[test]
    fn test_zero_page_bound_is_invalid() {
        let err = ExtractionRequest::new("https://shop.test/p/1")
            .with_max_pages(0)
            .validate(5)
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert_eq!(err.label(), "invalid_input");
    }

    #[test]
    fn test_malformed_url_is_invalid() {
        for raw in ["", "not a url", "ftp://shop.test/file", "javascript:alert(1)"] {
            let err = ExtractionRequest::new(raw).validate(5).unwrap_err();
            assert!(matches!(err, PipelineError::InvalidInput(_)), "{raw}");
        }
    }
}
