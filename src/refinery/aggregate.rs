// * Aggregator
// * Merges per-page results in page order, drops duplicates and computes the rating summary

use std::collections::HashSet;

use crate::refinery::schema::{AggregateResult, ExtractionResult, RawReview};

// * (title, reviewer, date) identify a review
type ReviewKey = (Option<String>, Option<String>, Option<String>);

/// Incremental merger fed one page at a time by the pagination loop
#[derive(Debug, Default)]
pub struct Aggregator {
    pages: u32,
    reviews: Vec<RawReview>,
    seen: HashSet<ReviewKey>,
    duplicates: usize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one page worth of records; returns how many were new
    pub fn absorb(&mut self, result: ExtractionResult) -> usize {
        self.pages += 1;
        let before = self.reviews.len();

        for review in result.reviews {
            if !review.has_content() {
                continue;
            }
            if self.seen.insert(review_key(&review)) {
                self.reviews.push(review);
            } else {
                self.duplicates += 1;
            }
        }

        self.reviews.len() - before
    }

    /// Counts a page that contributed no extraction result at all
    pub fn record_empty_page(&mut self) {
        self.pages += 1;
    }

    pub fn pages_processed(&self) -> u32 {
        self.pages
    }

    pub fn review_count(&self) -> usize {
        self.reviews.len()
    }

    pub fn duplicates_dropped(&self) -> usize {
        self.duplicates
    }

    /// Consumes the aggregator into the request output
    pub fn finish(self, incomplete: bool) -> AggregateResult {
        let average_rating = average_rating(&self.reviews);
        AggregateResult {
            pages_processed: self.pages,
            reviews: self.reviews,
            average_rating,
            incomplete,
        }
    }
}

/// Merges complete per-page results into one aggregate
pub fn merge(results: Vec<ExtractionResult>) -> AggregateResult {
    let mut aggregator = Aggregator::new();
    for result in results {
        aggregator.absorb(result);
    }
    aggregator.finish(false)
}

/// Mean of present ratings; None when no review carries one
pub fn average_rating(reviews: &[RawReview]) -> Option<f64> {
    let ratings: Vec<f64> = reviews
        .iter()
        .filter_map(|r| r.rating)
        .map(f64::from)
        .collect();

    if ratings.is_empty() {
        return None;
    }
    Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
}

fn review_key(review: &RawReview) -> ReviewKey {
    (
        review.title.clone(),
        review.reviewer.clone(),
        review.date.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refinery::schema::{SelectorSet, SelectorSource};

    fn review(title: &str, reviewer: &str, date: &str, rating: Option<u8>) -> RawReview {
        RawReview {
            title: Some(title.to_string()),
            body: Some(format!("{} body", title)),
            rating,
            reviewer: Some(reviewer.to_string()),
            date: Some(date.to_string()),
        }
    }

    fn page(reviews: Vec<RawReview>) -> ExtractionResult {
        let mut result = ExtractionResult::empty(
            SelectorSet::new("div.review").unwrap(),
            SelectorSource::Fallback(0),
        );
        result.containers_matched = reviews.len();
        result.success = !reviews.is_empty();
        result.reviews = reviews;
        result
    }

    #[test]
    fn test_duplicates_keep_first_occurrence() {
        let first = review("Great", "Ann", "2024-01-01", Some(5));
        let mut again = first.clone();
        again.body = Some("edited body".to_string());

        let merged = merge(vec![
            page(vec![first.clone(), review("Meh", "Bob", "2024-01-02", Some(2))]),
            page(vec![again]),
        ]);

        assert_eq!(merged.pages_processed, 2);
        assert_eq!(merged.reviews.len(), 2);
        assert_eq!(merged.reviews[0], first);
    }

    #[test]
    fn test_average_ignores_absent_ratings() {
        let merged = merge(vec![page(vec![
            review("A", "x", "d1", Some(5)),
            review("B", "y", "d2", None),
            review("C", "z", "d3", Some(3)),
        ])]);
        assert_eq!(merged.average_rating, Some(4.0));
    }

    #[test]
    fn test_average_absent_when_nothing_rated() {
        let merged = merge(vec![page(vec![review("A", "x", "d1", None)])]);
        assert_eq!(merged.average_rating, None);
    }

    #[test]
    fn test_identity_ignores_body() {
        let anon = |body: &str| RawReview {
            body: Some(body.to_string()),
            ..Default::default()
        };

        let mut aggregator = Aggregator::new();
        aggregator.absorb(page(vec![anon("Loved it"), anon("Hated it")]));
        assert_eq!(aggregator.review_count(), 1);
        assert_eq!(aggregator.duplicates_dropped(), 1);

        let result = aggregator.finish(false);
        assert_eq!(result.reviews[0].body.as_deref(), Some("Loved it"));
    }

    #[test]
    fn test_empty_pages_still_count() {
        let mut aggregator = Aggregator::new();
        aggregator.absorb(page(vec![]));
        aggregator.absorb(page(vec![review("A", "x", "d1", Some(4))]));
        aggregator.record_empty_page();
        assert_eq!(aggregator.pages_processed(), 3);
        let result = aggregator.finish(true);
        assert_eq!(result.pages_processed, 3);
        assert!(result.incomplete);
    }
}
