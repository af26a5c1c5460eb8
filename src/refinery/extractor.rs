// * Extraction Engine
// * Applies a selector set to rendered markup and yields validated review records

use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, warn};

use crate::refinery::rating::parse_rating;
use crate::refinery::schema::{ExtractionResult, RawReview, RenderedPage, SelectorSet, SelectorSource};

// * Attributes that carry a rating on text-less star widgets, in lookup order
const RATING_ATTRIBUTES: &[&str] = &["aria-label", "title", "data-rating", "data-score", "content"];

// * Attributes that carry a machine date when the element shows none
const DATE_ATTRIBUTES: &[&str] = &["datetime", "content"];

const WORD_BREAK_TAGS: &[&str] = &[
    "br", "p", "div", "li", "ul", "ol", "tr", "td", "th", "h1", "h2", "h3", "h4", "h5", "h6",
    "section", "article", "blockquote", "header", "footer",
];

/// A candidate selector set together with its origin
#[derive(Debug, Clone)]
pub struct SelectorStrategy {
    pub source: SelectorSource,
    pub selectors: SelectorSet,
}

impl SelectorStrategy {
    pub fn new(source: SelectorSource, selectors: SelectorSet) -> Self {
        Self { source, selectors }
    }
}

/// Outcome of evaluating an ordered list of strategies against one page
#[derive(Debug)]
pub struct StrategyRun {
    /// First strategy that produced at least one record
    pub accepted: Option<ExtractionResult>,
    /// Strategies tried before acceptance that produced nothing
    pub rejected: Vec<SelectorSource>,
    /// Result of the highest-priority strategy, kept for pages without reviews
    pub first_attempt: Option<ExtractionResult>,
}

/// Extracts records from a page using one selector set
pub fn extract(page: &RenderedPage, selectors: &SelectorSet) -> ExtractionResult {
    let document = Html::parse_document(&page.html);
    extract_document(&document, selectors, SelectorSource::Inferred)
}

/// Evaluates one strategy against an already parsed document
pub fn try_strategy(document: &Html, strategy: &SelectorStrategy) -> ExtractionResult {
    extract_document(document, &strategy.selectors, strategy.source)
}

/// Tries strategies in order and accepts the first productive one
///
/// The page is parsed once for the whole run.
pub fn run_strategies(html: &str, strategies: &[SelectorStrategy]) -> StrategyRun {
    let document = Html::parse_document(html);
    let mut rejected = Vec::new();
    let mut first_attempt = None;

    for strategy in strategies {
        let result = try_strategy(&document, strategy);
        if result.is_productive() {
            return StrategyRun {
                accepted: Some(result),
                rejected,
                first_attempt,
            };
        }

        debug!(
            source = strategy.source.label(),
            containers = result.containers_matched,
            "Selector strategy produced no records"
        );
        rejected.push(strategy.source);
        if first_attempt.is_none() {
            first_attempt = Some(result);
        }
    }

    StrategyRun {
        accepted: None,
        rejected,
        first_attempt,
    }
}

/// Core extraction over a parsed document
///
/// Zero container matches is a valid outcome (success = false), never an error.
pub fn extract_document(document: &Html, selectors: &SelectorSet, source: SelectorSource) -> ExtractionResult {
    let container = match compile(selectors.container()) {
        Some(sel) => sel,
        None => return ExtractionResult::empty(selectors.clone(), source),
    };

    let fields = FieldSelectors::compile(selectors);
    let containers: Vec<ElementRef> = document.select(&container).collect();

    let reviews: Vec<RawReview> = containers
        .iter()
        .map(|element| fields.read(element))
        .filter(RawReview::has_content)
        .collect();

    ExtractionResult {
        reviews,
        selectors: selectors.clone(),
        source,
        success: !containers.is_empty(),
        containers_matched: containers.len(),
    }
}

struct FieldSelectors {
    title: Option<Selector>,
    rating: Option<Selector>,
    body: Option<Selector>,
    reviewer: Option<Selector>,
    date: Option<Selector>,
}

impl FieldSelectors {
    fn compile(set: &SelectorSet) -> Self {
        Self {
            title: set.title().and_then(compile),
            rating: set.rating().and_then(compile),
            body: set.body().and_then(compile),
            reviewer: set.reviewer().and_then(compile),
            date: set.date().and_then(compile),
        }
    }

    fn read(&self, container: &ElementRef) -> RawReview {
        let rating = first_match(container, self.rating.as_ref()).and_then(|el| {
            match text_of(&el) {
                Some(text) => parse_rating(&text),
                None => attribute_of(&el, RATING_ATTRIBUTES).and_then(|raw| parse_rating(&raw)),
            }
        });

        let date = first_match(container, self.date.as_ref())
            .and_then(|el| text_of(&el).or_else(|| attribute_of(&el, DATE_ATTRIBUTES)));

        RawReview {
            title: first_match(container, self.title.as_ref()).and_then(|el| text_of(&el)),
            body: first_match(container, self.body.as_ref()).and_then(|el| text_of(&el)),
            rating,
            reviewer: first_match(container, self.reviewer.as_ref()).and_then(|el| text_of(&el)),
            date,
        }
    }
}

fn compile(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(sel) => Some(sel),
        Err(e) => {
            warn!(selector = selector, error = ?e, "Discarding unparseable selector");
            None
        }
    }
}

/// True when the string is a CSS selector the DOM engine accepts
pub fn is_valid_selector(selector: &str) -> bool {
    Selector::parse(selector).is_ok()
}

fn first_match<'a>(container: &ElementRef<'a>, selector: Option<&Selector>) -> Option<ElementRef<'a>> {
    container.select(selector?).next()
}

/// Element text with whitespace trimmed and collapsed; None when blank
pub fn text_of(element: &ElementRef) -> Option<String> {
    // * Inline tags join their text directly; line breaks and blocks separate words
    let mut joined = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(text) => joined.push_str(text),
            Node::Element(el) if WORD_BREAK_TAGS.contains(&el.name()) => joined.push(' '),
            _ => {}
        }
    }
    collapse_whitespace(&joined)
}

fn attribute_of(element: &ElementRef, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| element.value().attr(name))
        .find_map(collapse_whitespace)
}

fn collapse_whitespace(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}
