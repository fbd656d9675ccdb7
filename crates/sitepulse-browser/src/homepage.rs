use crate::error::{BrowserError, Result};
use url::Url;

const HOMEPAGE_PATHS: &[&str] = &[
    "/home",
    "/homepage",
    "/index",
    "/index.html",
    "/index.php",
    "/en",
    "/eng",
    "/eng-au/homepage",
    "/en-us/homepage",
];

/// Homepage for a resolved URL.
///
/// Returns the URL itself when its path looks like a homepage (root, `/home`,
/// `/index.*`, locale-prefixed homepages), otherwise `scheme://host`.
pub fn extract_homepage(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| BrowserError::InvalidUrl(format!("{url}: {e}")))?;
    let path = parsed.path().to_lowercase();

    let is_homepage = path == "/"
        || HOMEPAGE_PATHS
            .iter()
            .any(|pattern| path == *pattern || path.ends_with(pattern));

    if is_homepage {
        return Ok(url.to_string());
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| BrowserError::InvalidUrl(format!("{url}: no host")))?;
    Ok(format!("{}://{host}", parsed.scheme()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_homepage() {
        assert_eq!(
            extract_homepage("https://example.com/").unwrap(),
            "https://example.com/"
        );
        assert_eq!(
            extract_homepage("https://example.com").unwrap(),
            "https://example.com"
        );
    }

    #[test]
    fn test_known_homepage_paths() {
        assert_eq!(
            extract_homepage("https://example.com/en-us/homepage").unwrap(),
            "https://example.com/en-us/homepage"
        );
        assert_eq!(
            extract_homepage("https://example.com/INDEX.HTML").unwrap(),
            "https://example.com/INDEX.HTML"
        );
    }

    #[test]
    fn test_deep_path_reduces_to_origin() {
        assert_eq!(
            extract_homepage("https://shop.example.com/products/widget?x=1").unwrap(),
            "https://shop.example.com"
        );
    }

    #[test]
    fn test_invalid_url() {
        assert!(extract_homepage("not-a-url").is_err());
    }
}
