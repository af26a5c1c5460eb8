// * Template Fingerprinting
// * Structural hash of a page so consecutive result pages of one template can share a selector set

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use xxhash_rust::xxh64::xxh64;

static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<([a-z][a-z0-9-]*)\b([^>]*)>").unwrap());

static CLASS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\sclass\s*=\s*["']([^"']*)["']"#).unwrap());

static BODY_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<body\b").unwrap());

// * Digits inside class names are usually ids or counters, not structure
static DIGITS_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Computes a fingerprint of the page template
///
/// The distinct set of `tag.class` shapes inside `<body>` is hashed, so the
/// number of repeated review blocks and their text do not affect the result.
pub fn template_fingerprint(html: &str) -> u64 {
    let start = BODY_REGEX.find(html).map(|m| m.start()).unwrap_or(0);

    let shapes: BTreeSet<String> = TAG_REGEX
        .captures_iter(&html[start..])
        .map(|caps| {
            let tag = caps[1].to_lowercase();
            let mut classes: Vec<String> = CLASS_REGEX
                .captures(&caps[2])
                .map(|class_caps| {
                    class_caps[1]
                        .split_whitespace()
                        .map(|c| DIGITS_REGEX.replace_all(c, "#").into_owned())
                        .collect()
                })
                .unwrap_or_default();
            classes.sort();
            classes.dedup();
            format!("{}.{}", tag, classes.join("."))
        })
        .collect();

    let canonical = shapes.into_iter().collect::<Vec<_>>().join("|");
    xxh64(canonical.as_bytes(), 0)
}

/// Hash of the full markup, used to notice that an advance changed nothing
pub fn content_hash(html: &str) -> u64 {
    xxh64(html.as_bytes(), 0)
}
