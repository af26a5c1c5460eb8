// * Pagination Controller
// * Page-level state machine plus discovery of the next-page affordance

use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::engine::fallback::GENERIC_NEXT_SELECTOR;
use crate::engine::fingerprint::content_hash;
use crate::engine::normalization::{increment_page_url, normalize_url};
use crate::engine::renderer::AdvanceTarget;
use crate::refinery::extractor::text_of;
use crate::refinery::schema::{RenderedPage, SelectorSet};

const NEXT_MARKERS: &[&str] = &["next", "›", "»", "forward", "→"];
const PREV_MARKERS: &[&str] = &["prev", "‹", "«", "back", "←"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Start,
    PageReady,
    Advancing,
    Done,
    Failed,
}

impl PageState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PageState::Done | PageState::Failed)
    }
}

/// What a next-page selector found on the current page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Affordance {
    /// An enabled next-page control
    Found(AdvanceTarget),
    /// A next-page control marked disabled: this is the last page
    Disabled,
    /// No next-page control matched
    Absent,
}

/// Tracks progress through result pages and enforces the page bound
#[derive(Debug)]
pub struct PaginationController {
    state: PageState,
    max_pages: u32,
    pages_ready: u32,
    visited: HashSet<String>,
    last_content: Option<u64>,
}

impl PaginationController {
    pub fn new(max_pages: u32) -> Self {
        Self {
            state: PageState::Start,
            max_pages,
            pages_ready: 0,
            visited: HashSet::new(),
            last_content: None,
        }
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn pages_ready(&self) -> u32 {
        self.pages_ready
    }

    /// Start/Advancing -> PageReady
    ///
    /// A page identical to the previous one means the advance went nowhere:
    /// the controller moves to Done and returns false.
    pub fn page_ready(&mut self, page: &RenderedPage) -> bool {
        if !matches!(self.state, PageState::Start | PageState::Advancing) {
            warn!(state = ?self.state, "Ignoring page outside of Start/Advancing");
            return false;
        }

        let hash = content_hash(&page.html);
        if self.state == PageState::Advancing && self.last_content == Some(hash) {
            info!(url = %page.url, "Advance produced an unchanged page, stopping");
            self.state = PageState::Done;
            return false;
        }

        if let Some(url) = normalize_url(&page.url, &page.url) {
            self.visited.insert(url);
        }
        self.last_content = Some(hash);
        self.pages_ready += 1;
        self.state = PageState::PageReady;
        true
    }

    /// PageReady -> Advancing, or Done once the page bound is reached
    pub fn page_extracted(&mut self) -> PageState {
        if self.state == PageState::PageReady {
            self.state = if self.pages_ready >= self.max_pages {
                debug!(max_pages = self.max_pages, "Page bound reached");
                PageState::Done
            } else {
                PageState::Advancing
            };
        }
        self.state
    }

    /// Advancing -> Done: no further page exists
    pub fn exhausted(&mut self) {
        if self.state == PageState::Advancing {
            self.state = PageState::Done;
        }
    }

    /// Any state -> Failed
    pub fn fail(&mut self) {
        self.state = PageState::Failed;
    }

    /// Chooses how to reach the next page
    ///
    /// An explicit next-page control wins over the URL page-number pattern.
    /// The pattern is only followed when the current page yielded reviews.
    pub fn next_target(
        &self,
        page: &RenderedPage,
        selectors: Option<&SelectorSet>,
        page_yield: usize,
    ) -> Option<AdvanceTarget> {
        let document = Html::parse_document(&page.html);

        let candidates = selectors
            .and_then(SelectorSet::next_page)
            .into_iter()
            .chain(std::iter::once(GENERIC_NEXT_SELECTOR));

        for selector in candidates {
            match find_next_affordance(&document, selector, &page.url) {
                Affordance::Found(target) if self.is_unvisited(&target) => return Some(target),
                Affordance::Found(_) => {
                    debug!(selector = selector, "Next-page link points at a visited page");
                }
                Affordance::Disabled => {
                    debug!(selector = selector, "Next-page control is disabled, last page reached");
                    return None;
                }
                Affordance::Absent => {}
            }
        }

        if page_yield == 0 {
            return None;
        }

        increment_page_url(&page.url)
            .map(AdvanceTarget::Url)
            .filter(|target| self.is_unvisited(target))
    }

    fn is_unvisited(&self, target: &AdvanceTarget) -> bool {
        match target.url() {
            Some(url) => normalize_url(url, url).map_or(false, |u| !self.visited.contains(&u)),
            None => true,
        }
    }
}

/// Finds the next-page control among the elements matched by `selector`
pub fn find_next_affordance(document: &Html, selector: &str, base_url: &str) -> Affordance {
    let Ok(compiled) = Selector::parse(selector) else {
        return Affordance::Absent;
    };
    let matches: Vec<ElementRef> = document.select(&compiled).collect();

    let position = matches
        .iter()
        .position(is_next_like)
        .or_else(|| (matches.len() == 1 && !is_prev_like(&matches[0])).then_some(0));
    let Some(position) = position else {
        return Affordance::Absent;
    };
    let element = &matches[position];

    if is_disabled(element) {
        return Affordance::Disabled;
    }

    if let Some(url) = element.value().attr("href").and_then(|href| {
        let trimmed = href.trim();
        if trimmed.is_empty() || trimmed == "#" {
            None
        } else {
            normalize_url(trimmed, base_url)
        }
    }) {
        return Affordance::Found(AdvanceTarget::Link(url));
    }

    // * Only the first match of a selector can be clicked reliably
    if position == 0 {
        Affordance::Found(AdvanceTarget::Click(selector.to_string()))
    } else {
        Affordance::Absent
    }
}

fn marker_text(element: &ElementRef) -> String {
    let mut text = text_of(element).unwrap_or_default();
    for attr in ["aria-label", "title", "rel", "class"] {
        if let Some(value) = element.value().attr(attr) {
            text.push(' ');
            text.push_str(value);
        }
    }
    text.to_lowercase()
}

fn is_next_like(element: &ElementRef) -> bool {
    let text = marker_text(element);
    NEXT_MARKERS.iter().any(|m| text.contains(m))
}

fn is_prev_like(element: &ElementRef) -> bool {
    let text = marker_text(element);
    PREV_MARKERS.iter().any(|m| text.contains(m))
}

fn is_disabled(element: &ElementRef) -> bool {
    let value = element.value();
    value.attr("disabled").is_some()
        || value.attr("aria-disabled") == Some("true")
        || value.classes().any(|c| c.eq_ignore_ascii_case("disabled"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, body: &str) -> RenderedPage {
        RenderedPage::new(url, format!("<html><body>{}</body></html>", body))
    }

    #[test]
    fn test_bound_reached_moves_to_done() {
        let mut controller = PaginationController::new(2);
        assert_eq!(controller.state(), PageState::Start);

        assert!(controller.page_ready(&page("https://a.test/r?page=1", "one")));
        assert_eq!(controller.page_extracted(), PageState::Advancing);

        assert!(controller.page_ready(&page("https://a.test/r?page=2", "two")));
        assert_eq!(controller.page_extracted(), PageState::Done);
        assert_eq!(controller.pages_ready(), 2);
    }

    #[test]
    fn test_unchanged_page_after_advance_is_done() {
        let mut controller = PaginationController::new(5);
        let first = page("https://a.test/r", "same");
        controller.page_ready(&first);
        controller.page_extracted();
        assert!(!controller.page_ready(&first));
        assert_eq!(controller.state(), PageState::Done);
    }

    #[test]
    fn test_failure_is_terminal() {
        let mut controller = PaginationController::new(5);
        controller.page_ready(&page("https://a.test/r", "x"));
        controller.page_extracted();
        controller.fail();
        assert!(controller.state().is_terminal());
    }

    #[test]
    fn test_explicit_link_beats_url_pattern() {
        let controller = PaginationController::new(5);
        let current = page(
            "https://a.test/reviews?page=1",
            r#"<ul class="pagination"><a href="/reviews?page=0">Prev</a><a href="/reviews/more">Next ›</a></ul>"#,
        );
        let target = controller.next_target(&current, None, 3);
        assert_eq!(target, Some(AdvanceTarget::Link("https://a.test/reviews/more".into())));
    }

    #[test]
    fn test_inferred_next_selector_is_used_first() {
        let controller = PaginationController::new(5);
        let current = page(
            "https://a.test/p",
            r#"<a class="load-more" href="/p?cursor=abc">More reviews</a>"#,
        );
        let set = SelectorSet::new("div.review").unwrap().with_next_page("a.load-more");
        let target = controller.next_target(&current, Some(&set), 2);
        assert_eq!(target, Some(AdvanceTarget::Link("https://a.test/p?cursor=abc".into())));
    }

    #[test]
    fn test_url_pattern_when_no_control() {
        let controller = PaginationController::new(5);
        let current = page("https://a.test/reviews?page=3", "<p>no links</p>");
        assert_eq!(
            controller.next_target(&current, None, 4),
            Some(AdvanceTarget::Url("https://a.test/reviews?page=4".into()))
        );
        assert_eq!(controller.next_target(&current, None, 0), None);
    }

    #[test]
    fn test_button_without_href_becomes_click() {
        let controller = PaginationController::new(5);
        let current = page("https://a.test/p", r#"<button class="btn-next">Next</button>"#);
        assert_eq!(
            controller.next_target(&current, None, 1),
            Some(AdvanceTarget::Click(GENERIC_NEXT_SELECTOR.to_string()))
        );
    }

    #[test]
    fn test_disabled_next_beats_url_pattern() {
        let controller = PaginationController::new(5);
        let current = page(
            "https://a.test/reviews?page=1",
            r#"<div class="pagination"><a class="next disabled" href="/reviews?page=2">Next</a></div>"#,
        );
        assert_eq!(controller.next_target(&current, None, 4), None);
    }

    #[test]
    fn test_affordance_outcomes() {
        let document = Html::parse_document(
            r#"<nav class="pagination"><a href="/r?page=1">Prev</a><a href="/r?page=3">Next</a></nav>
               <button class="more" aria-disabled="true">Next</button>"#,
        );
        assert_eq!(
            find_next_affordance(&document, "nav.pagination a", "https://a.test/r?page=2"),
            Affordance::Found(AdvanceTarget::Link("https://a.test/r?page=3".into()))
        );
        assert_eq!(
            find_next_affordance(&document, "button.more", "https://a.test/r?page=2"),
            Affordance::Disabled
        );
        assert_eq!(
            find_next_affordance(&document, "a.load-more", "https://a.test/r?page=2"),
            Affordance::Absent
        );
    }

    #[test]
    fn test_visited_link_is_skipped() {
        let mut controller = PaginationController::new(5);
        let current = page(
            "https://a.test/r?page=2",
            r#"<a rel="next" href="/r?page=2">Next</a>"#,
        );
        controller.page_ready(&current);
        assert_eq!(controller.next_target(&current, None, 0), None);
    }
}
