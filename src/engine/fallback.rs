// * Fallback Selector Table
// * Ordered, known-good review markup conventions used when inference is absent or ineffective

use crate::refinery::extractor::SelectorStrategy;
use crate::refinery::schema::{SelectorSet, SelectorSource};

// * Pagination affordances common across storefront templates
pub const GENERIC_NEXT_SELECTOR: &str =
    "a[rel='next'], ul.pagination a, div[class*='pagination'] a, nav[class*='pagination'] a, button[class*='next']";

// * (container, title, rating, body, reviewer, date, next_page)
const TABLE: &[[&str; 7]] = &[
    // * schema.org microdata
    [
        "[itemprop='review']",
        "[itemprop='name']",
        "[itemprop='ratingValue'], [itemprop='reviewRating']",
        "[itemprop='reviewBody'], [itemprop='description']",
        "[itemprop='author']",
        "[itemprop='datePublished']",
        "a[rel='next']",
    ],
    // * Judge.me widgets
    [
        "div.jdgm-rev",
        ".jdgm-rev__title",
        ".jdgm-rev__rating",
        ".jdgm-rev__body",
        ".jdgm-rev__author",
        ".jdgm-rev__timestamp",
        ".jdgm-paginate__next-page",
    ],
    // * Generic class-name conventions
    [
        "div[class*='review'], div[class*='comment']",
        "h3, h4, strong",
        "span[class*='rating'], div[class*='stars']",
        "div[class*='content'], div[class*='text']",
        "span[class*='author'], span[class*='name']",
        "span[class*='date']",
        "ul.pagination a, div[class*='pagination'] a",
    ],
    // * List and article based templates
    [
        "li[class*='review'], article[class*='review']",
        "h2, h3, h4, [class*='title']",
        "[class*='rating'], [class*='stars'], [class*='score']",
        "p, [class*='body'], [class*='content']",
        "[class*='author'], [class*='user'], [class*='name']",
        "time, [class*='date']",
        "a[rel='next'], [class*='pagination'] a",
    ],
];

/// The fallback table, most specific convention first
pub fn defaults() -> Vec<SelectorSet> {
    TABLE
        .iter()
        .filter_map(|[container, title, rating, body, reviewer, date, next]| {
            SelectorSet::new(*container).ok().map(|set| {
                set.with_title(*title)
                    .with_rating(*rating)
                    .with_body(*body)
                    .with_reviewer(*reviewer)
                    .with_date(*date)
                    .with_next_page(*next)
            })
        })
        .collect()
}

/// The table as an ordered list of strategies
pub fn strategies() -> Vec<SelectorStrategy> {
    defaults()
        .into_iter()
        .enumerate()
        .map(|(idx, set)| SelectorStrategy::new(SelectorSource::Fallback(idx), set))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refinery::extractor::is_valid_selector;

    #[test]
    fn test_table_is_ordered_and_complete() {
        let table = defaults();
        assert_eq!(table.len(), TABLE.len());
        assert_eq!(table[0].container(), "[itemprop='review']");
        assert_eq!(table[1].container(), "div.jdgm-rev");
    }

    #[test]
    fn test_every_selector_compiles() {
        for set in defaults() {
            let fields = [
                Some(set.container()),
                set.title(),
                set.rating(),
                set.body(),
                set.reviewer(),
                set.date(),
                set.next_page(),
            ];
            for selector in fields.into_iter().flatten() {
                assert!(is_valid_selector(selector), "invalid selector {}", selector);
            }
        }
        assert!(is_valid_selector(GENERIC_NEXT_SELECTOR));
    }

    #[test]
    fn test_strategies_carry_table_index() {
        let strategies = strategies();
        assert_eq!(strategies[2].source, SelectorSource::Fallback(2));
    }
}
