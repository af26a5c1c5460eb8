// * Tolerant rating normalization
// * Maps free-form rating text onto the 1-5 scale; unreadable text yields None

use regex::Regex;
use std::sync::LazyLock;

const RATING_MIN: f64 = 1.0;
const RATING_MAX: f64 = 5.0;

// * Ten-point scales are common enough to halve instead of clamping
const TEN_POINT_MAX: f64 = 10.0;

static OUT_OF_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*(?:stars?\s*)?out\s+of\s*(\d+(?:[.,]\d+)?)").unwrap()
});

static FRACTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)\s*/\s*(\d+(?:[.,]\d+)?)").unwrap());

static NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:[.,]\d+)?").unwrap());

const FILLED_STARS: &[char] = &['★', '⭐'];

/// Normalizes rating text to an integer in 1-5
///
/// Forms are tried in order and the first that matches wins:
/// "x out of y", star glyphs, "x/y", then the first bare number.
pub fn parse_rating(text: &str) -> Option<u8> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(caps) = OUT_OF_REGEX.captures(text) {
        let value = parse_number(&caps[1])?;
        let scale = parse_number(&caps[2])?;
        return scale_to_five(value, scale);
    }

    let stars = text.chars().filter(|c| FILLED_STARS.contains(c)).count();
    if stars > 0 {
        return Some(stars.min(RATING_MAX as usize) as u8);
    }

    if let Some(caps) = FRACTION_REGEX.captures(text) {
        let value = parse_number(&caps[1])?;
        let scale = parse_number(&caps[2])?;
        return scale_to_five(value, scale);
    }

    let value = parse_number(NUMBER_REGEX.find(text)?.as_str())?;
    if value > TEN_POINT_MAX {
        // * Counts like "123 reviews" are not ratings
        return None;
    }
    if value > RATING_MAX {
        return clamp_round(value / 2.0);
    }
    clamp_round(value)
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse::<f64>().ok().filter(|v| v.is_finite())
}

fn scale_to_five(value: f64, scale: f64) -> Option<u8> {
    if scale <= 0.0 {
        return None;
    }
    clamp_round(value * RATING_MAX / scale)
}

fn clamp_round(value: f64) -> Option<u8> {
    if value <= 0.0 {
        return None;
    }
    Some(value.round().clamp(RATING_MIN, RATING_MAX) as u8)
}
