use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

// * Query keys that carry a page number
const PAGE_PARAMS: &[&str] = &["page", "p", "pg", "pagenum", "page_number", "pagenumber", "pageno"];

// * Path forms like /page/3 or /page-3
static PATH_PAGE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/page[/-](\d+)(/?)$").unwrap());

#[derive(Debug, Error, PartialEq)]
pub enum UrlRejection {
    #[error("Malformed URL: {0}")]
    Malformed(String),

    #[error("Unsupported scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),

    #[error("URL has no host")]
    MissingHost,
}

/// Accepts only absolute http(s) URLs with a host
pub fn validate_target_url(raw: &str) -> Result<Url, UrlRejection> {
    let url = Url::parse(raw.trim()).map_err(|e| UrlRejection::Malformed(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlRejection::UnsupportedScheme(other.to_string())),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlRejection::MissingHost);
    }

    Ok(url)
}

// * Normalizes a URL to a unique, deterministic representation.
// * Used to resolve pagination hrefs and to recognise already-visited pages.
// *
// * 1. Join href with base_url.
// * 2. Strip Fragment (#).
// * 3. Lowercase Hostname.
// * 4. Remove Tracking Parameters (utm_*, gclid, etc.).
// * 5. Sort Query Parameters alphabetically.
pub fn normalize_url(href: &str, base_url: &str) -> Option<String> {
    let base = Url::parse(base_url).ok()?;
    let mut url = base.join(href.trim()).ok()?;

    if !matches!(url.scheme(), "http" | "https") {
        // * javascript:, mailto: and friends are not navigable pages
        return None;
    }

    url.set_fragment(None);

    if let Some(host) = url.host_str() {
        let lower_host = host.to_lowercase();
        if url.set_host(Some(&lower_host)).is_err() {
            return None;
        }
    }

    // * BTreeMap keeps keys sorted
    let mut clean_pairs = BTreeMap::new();

    // ! Add new tracking params here as they are discovered.
    let drop_params: HashSet<&str> = [
        "utm_source", "utm_medium", "utm_campaign", "utm_term", "utm_content",
        "gclid", "fbclid", "ref", "yclid", "_ga",
    ]
    .into();

    for (k, v) in url.query_pairs() {
        let key_lower = k.to_lowercase();
        if !drop_params.contains(key_lower.as_str()) {
            clean_pairs.insert(k.into_owned(), v.into_owned());
        }
    }

    if clean_pairs.is_empty() {
        url.set_query(None);
    } else {
        let mut serializer = url.query_pairs_mut();
        serializer.clear();
        for (k, v) in clean_pairs {
            serializer.append_pair(&k, &v);
        }
    }

    Some(url.to_string())
}

/// Builds the URL of the following results page from a page-number pattern
///
/// Recognises page-number query parameters and `/page/N` path suffixes.
/// Returns None when the URL carries no such pattern.
pub fn increment_page_url(current: &str) -> Option<String> {
    let mut url = Url::parse(current).ok()?;

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let page_param = pairs.iter().position(|(k, v)| {
        PAGE_PARAMS.contains(&k.to_lowercase().as_str()) && v.parse::<u32>().is_ok()
    });

    if let Some(idx) = page_param {
        let mut serializer = url.query_pairs_mut();
        serializer.clear();
        for (i, (k, v)) in pairs.iter().enumerate() {
            if i == idx {
                let next = v.parse::<u32>().ok()?.checked_add(1)?;
                serializer.append_pair(k, &next.to_string());
            } else {
                serializer.append_pair(k, v);
            }
        }
        drop(serializer);
        return Some(url.to_string());
    }

    let path = url.path().to_string();
    let caps = PATH_PAGE_REGEX.captures(&path)?;
    let number = caps.get(1)?;
    let next = number.as_str().parse::<u32>().ok()?.checked_add(1)?;
    let new_path = format!("{}{}{}", &path[..number.start()], next, &caps[2]);
    url.set_path(&new_path);
    Some(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_http_and_https() {
        assert!(validate_target_url("https://shop.test/product/1").is_ok());
        assert!(validate_target_url(" http://shop.test ").is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        assert!(matches!(validate_target_url("shop.test/reviews"), Err(UrlRejection::Malformed(_))));
        assert_eq!(
            validate_target_url("ftp://shop.test/file"),
            Err(UrlRejection::UnsupportedScheme("ftp".to_string()))
        );
    }

    #[test]
    fn test_javascript_href_is_not_navigable() {
        assert_eq!(normalize_url("javascript:void(0)", "https://shop.test/p"), None);
    }

    #[test]
    fn test_increment_query_param() {
        assert_eq!(
            increment_page_url("https://shop.test/reviews?sort=new&page=2").as_deref(),
            Some("https://shop.test/reviews?sort=new&page=3")
        );
    }

    #[test]
    fn test_increment_path_segment() {
        assert_eq!(
            increment_page_url("https://shop.test/reviews/page/4/").as_deref(),
            Some("https://shop.test/reviews/page/5/")
        );
        assert_eq!(
            increment_page_url("https://shop.test/reviews/page-1").as_deref(),
            Some("https://shop.test/reviews/page-2")
        );
    }

    #[test]
    fn test_no_pattern_no_increment() {
        assert_eq!(increment_page_url("https://shop.test/product/42"), None);
        assert_eq!(increment_page_url("https://shop.test/reviews?page=last"), None);
    }
}
