// * Bounded markup excerpt used as inference input
// * Strips non-structural noise and starts the window near the first review-looking markup

use regex::Regex;
use std::sync::LazyLock;
use unicode_segmentation::UnicodeSegmentation;

static NOISE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|noscript|svg|template|iframe)\b[^>]*>.*?</(?:script|style|noscript|svg|template|iframe)\s*>")
        .unwrap()
});

static COMMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

static WHITESPACE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static BODY_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<body\b").unwrap());

static REVIEW_HINT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)review|rating|testimonial|comment").unwrap());

/// Excerpt of one rendered page, never longer than `cap` characters
#[derive(Debug, Clone)]
pub struct PageSample {
    source_url: String,
    excerpt: String,
    cap: usize,
}

impl PageSample {
    /// Builds a sample from rendered HTML
    pub fn from_html(source_url: &str, html: &str, cap: usize) -> Self {
        let cleaned = clean_markup(html);
        let window = &cleaned[window_start(&cleaned)..];
        Self {
            source_url: source_url.to_string(),
            excerpt: truncate_chars(window, cap),
            cap,
        }
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn excerpt(&self) -> &str {
        &self.excerpt
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn is_empty(&self) -> bool {
        self.excerpt.is_empty()
    }
}

fn clean_markup(html: &str) -> String {
    let without_noise = NOISE_REGEX.replace_all(html, "");
    let without_comments = COMMENT_REGEX.replace_all(&without_noise, "");
    WHITESPACE_REGEX
        .replace_all(&without_comments, " ")
        .trim()
        .to_string()
}

// * Byte offset of the tag enclosing the first review hint inside <body>
fn window_start(cleaned: &str) -> usize {
    let body_start = BODY_REGEX.find(cleaned).map(|m| m.start()).unwrap_or(0);

    match REVIEW_HINT_REGEX.find_at(cleaned, body_start) {
        Some(hit) => cleaned[body_start..hit.start()]
            .rfind('<')
            .map(|offset| body_start + offset)
            .unwrap_or(body_start),
        None => body_start,
    }
}

// * Cuts on grapheme boundaries so the excerpt never splits a character
fn truncate_chars(text: &str, cap: usize) -> String {
    let mut used = 0;
    let mut out = String::new();
    for grapheme in text.graphemes(true) {
        let width = grapheme.chars().count();
        if used + width > cap {
            break;
        }
        used += width;
        out.push_str(grapheme);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_respects_cap() {
        let html = format!("<html><body>{}</body></html>", "<p>é lorem ipsum</p>".repeat(500));
        let sample = PageSample::from_html("https://shop.test/p/1", &html, 2_000);
        assert!(sample.excerpt().chars().count() <= 2_000);
        assert_eq!(sample.cap(), 2_000);
    }

    #[test]
    fn test_scripts_and_styles_are_removed() {
        let html = r#"<html><head><style>.x{color:red}</style></head>
            <body><script>var reviews = [];</script><div class="review">Great</div></body></html>"#;
        let sample = PageSample::from_html("https://shop.test", html, 500);
        assert!(!sample.excerpt().contains("color:red"));
        assert!(!sample.excerpt().contains("var reviews"));
        assert!(sample.excerpt().contains("class=\"review\""));
    }

    #[test]
    fn test_window_starts_near_review_markup() {
        let filler = "<nav><a href=\"/\">Home</a></nav>".repeat(200);
        let html = format!(
            "<html><body>{}<section><div class=\"review-item\"><h3>Nice</h3></div></section></body></html>",
            filler
        );
        let sample = PageSample::from_html("https://shop.test", &html, 120);
        assert!(sample.excerpt().starts_with("<div class=\"review-item\">"));
    }

    #[test]
    fn test_page_without_hints_starts_at_body() {
        let html = "<html><head><title>T</title></head><body><main>Nothing here</main></body></html>";
        let sample = PageSample::from_html("https://shop.test", html, 500);
        assert!(sample.excerpt().starts_with("<body>"));
    }
}
