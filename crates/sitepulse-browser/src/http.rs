//! Plain-HTTP probes that need no browser session.

use crate::error::{BrowserError, Result};
use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Client;
use sitepulse_core::HttpConfig;
use tracing::{debug, info};
use url::Url;

/// Outcome of a URL status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlStatus {
    pub status_code: u16,
    pub final_url: String,
    pub redirected: bool,
}

impl UrlStatus {
    pub fn is_error(&self) -> bool {
        self.status_code >= 400
    }
}

/// A fetched sitemap document and where it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapDocument {
    pub url: String,
    pub content: String,
}

/// Lightweight site checks used before any browser work.
#[async_trait]
pub trait SiteProbe: Send + Sync {
    /// GET with redirect following. HTTP error statuses are returned, not raised.
    async fn check_url_status(&self, url: &str) -> Result<UrlStatus>;

    /// `/robots.txt` body, `None` when absent.
    async fn fetch_robots_txt(&self, base_url: &str) -> Result<Option<String>>;

    /// First reachable sitemap, `None` when no candidate answers.
    async fn fetch_sitemap(
        &self,
        base_url: &str,
        robots_txt: Option<&str>,
    ) -> Result<Option<SitemapDocument>>;

    /// Body of an arbitrary document, failing on non-success status.
    async fn fetch_document(&self, url: &str) -> Result<String>;
}

/// [`SiteProbe`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .redirect(Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { client })
    }

    async fn get_text(&self, url: &str) -> Result<Option<String>> {
        let response = self.client.get(url).send().await?;
        if response.status().is_success() {
            Ok(Some(response.text().await?))
        } else {
            debug!("{url} answered {}", response.status());
            Ok(None)
        }
    }
}

/// `Sitemap:` directives from robots.txt, in declared order.
pub fn robots_sitemaps(robots_txt: &str) -> Vec<String> {
    robots_txt
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (key, value) = line.split_once(':')?;
            if key.trim().eq_ignore_ascii_case("sitemap") {
                let value = value.trim();
                (!value.is_empty()).then(|| value.to_string())
            } else {
                None
            }
        })
        .collect()
}

/// Candidate sitemap URLs: robots.txt directives first, then conventional paths.
pub fn sitemap_candidates(base_url: &str, robots_txt: Option<&str>) -> Result<Vec<String>> {
    let base = parse(base_url)?;
    let mut candidates = robots_txt.map(robots_sitemaps).unwrap_or_default();

    for path in ["/sitemap.xml", "/sitemap_index.xml"] {
        let url = base
            .join(path)
            .map_err(|e| BrowserError::InvalidUrl(format!("{base_url}: {e}")))?
            .to_string();
        if !candidates.contains(&url) {
            candidates.push(url);
        }
    }

    Ok(candidates)
}

fn looks_like_sitemap(body: &str) -> bool {
    body.contains("<urlset") || body.contains("<sitemapindex")
}

fn parse(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| BrowserError::InvalidUrl(format!("{url}: {e}")))
}

#[async_trait]
impl SiteProbe for HttpProbe {
    async fn check_url_status(&self, url: &str) -> Result<UrlStatus> {
        parse(url)?;
        let response = self.client.get(url).send().await?;
        let final_url = response.url().to_string();

        Ok(UrlStatus {
            status_code: response.status().as_u16(),
            redirected: parse(&final_url).ok() != parse(url).ok(),
            final_url,
        })
    }

    async fn fetch_robots_txt(&self, base_url: &str) -> Result<Option<String>> {
        let robots_url = parse(base_url)?
            .join("/robots.txt")
            .map_err(|e| BrowserError::InvalidUrl(e.to_string()))?;

        match self.get_text(robots_url.as_str()).await {
            Ok(Some(body)) => {
                info!("found robots.txt at {robots_url} ({} bytes)", body.len());
                Ok(Some(body))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                info!("no robots.txt at {base_url}: {e}");
                Ok(None)
            }
        }
    }

    async fn fetch_sitemap(
        &self,
        base_url: &str,
        robots_txt: Option<&str>,
    ) -> Result<Option<SitemapDocument>> {
        for candidate in sitemap_candidates(base_url, robots_txt)? {
            match self.get_text(&candidate).await {
                Ok(Some(content)) if looks_like_sitemap(&content) => {
                    info!("found sitemap at {candidate} ({} bytes)", content.len());
                    return Ok(Some(SitemapDocument {
                        url: candidate,
                        content,
                    }));
                }
                Ok(Some(_)) => debug!("{candidate} is not a sitemap document"),
                Ok(None) => {}
                Err(e) => info!("sitemap not found at {candidate}: {e}"),
            }
        }

        Ok(None)
    }

    async fn fetch_document(&self, url: &str) -> Result<String> {
        let response = self.client.get(parse(url)?).send().await?;
        Ok(response.error_for_status()?.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe() -> HttpProbe {
        HttpProbe::new(&HttpConfig::default()).expect("client")
    }

    #[test]
    fn test_robots_sitemaps_case_insensitive() {
        let robots = "User-agent: *\nDisallow: /admin\nSITEMAP: https://a.com/s1.xml\nsitemap:https://a.com/s2.xml\n";
        assert_eq!(
            robots_sitemaps(robots),
            vec!["https://a.com/s1.xml", "https://a.com/s2.xml"]
        );
    }

    #[test]
    fn test_sitemap_candidates_order() {
        let candidates =
            sitemap_candidates("https://a.com/en/home", Some("Sitemap: https://a.com/sitemap.xml"))
                .expect("candidates");
        assert_eq!(
            candidates,
            vec!["https://a.com/sitemap.xml", "https://a.com/sitemap_index.xml"]
        );
    }

    #[tokio::test]
    async fn test_check_url_status_follows_redirect() {
        let mut server = mockito::Server::new_async().await;
        let _redirect = server
            .mock("GET", "/old")
            .with_status(301)
            .with_header("location", "/new")
            .create_async()
            .await;
        let _target = server
            .mock("GET", "/new")
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let status = probe()
            .check_url_status(&format!("{}/old", server.url()))
            .await
            .expect("status");

        assert_eq!(status.status_code, 200);
        assert!(status.redirected);
        assert!(status.final_url.ends_with("/new"));
    }

    #[tokio::test]
    async fn test_check_url_status_reports_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/")
            .with_status(404)
            .create_async()
            .await;

        let status = probe()
            .check_url_status(&format!("{}/", server.url()))
            .await
            .expect("status");
        assert!(status.is_error());
    }

    #[tokio::test]
    async fn test_robots_absent_is_none() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/robots.txt")
            .with_status(404)
            .create_async()
            .await;

        let robots = probe().fetch_robots_txt(&server.url()).await.expect("robots");
        assert!(robots.is_none());
    }

    #[tokio::test]
    async fn test_fetch_sitemap_falls_back_to_index_path() {
        let mut server = mockito::Server::new_async().await;
        let _missing = server
            .mock("GET", "/sitemap.xml")
            .with_status(404)
            .create_async()
            .await;
        let _index = server
            .mock("GET", "/sitemap_index.xml")
            .with_status(200)
            .with_body("<sitemapindex><sitemap><loc>https://a.com/s.xml</loc></sitemap></sitemapindex>")
            .create_async()
            .await;

        let doc = probe()
            .fetch_sitemap(&server.url(), None)
            .await
            .expect("sitemap")
            .expect("found");
        assert!(doc.url.ends_with("/sitemap_index.xml"));
        assert!(doc.content.contains("<sitemapindex"));
    }

    #[tokio::test]
    async fn test_fetch_sitemap_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _html = server
            .mock("GET", "/sitemap.xml")
            .with_status(200)
            .with_body("<html>soft 404</html>")
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/sitemap_index.xml")
            .with_status(404)
            .create_async()
            .await;

        let doc = probe().fetch_sitemap(&server.url(), None).await.expect("no error");
        assert!(doc.is_none());
    }
}
