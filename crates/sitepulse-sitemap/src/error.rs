use thiserror::Error;

pub type Result<T> = std::result::Result<T, SitemapError>;

#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("malformed sitemap XML: {0}")]
    Parse(String),

    #[error("Invalid sitemap format: {0}")]
    InvalidFormat(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
}

impl From<quick_xml::Error> for SitemapError {
    fn from(err: quick_xml::Error) -> Self {
        SitemapError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SitemapError::InvalidFormat("root element <html>".to_string());
        assert_eq!(err.to_string(), "Invalid sitemap format: root element <html>");

        let err = SitemapError::Fetch {
            url: "https://a.com/s.xml".to_string(),
            reason: "404".to_string(),
        };
        assert!(err.to_string().contains("https://a.com/s.xml"));
    }
}
