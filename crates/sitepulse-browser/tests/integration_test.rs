use sitepulse_browser::{
    FetchOptions, FetchPolicy, PageFetch, PageFetcher, RemoteSessionFactory, SessionFactory,
};
use sitepulse_core::BrowserConfig;
use std::sync::Arc;

fn live_fetcher() -> PageFetcher {
    let config = BrowserConfig {
        endpoint: std::env::var("SITEPULSE_BROWSER_URL").ok(),
        token: std::env::var("SITEPULSE_BROWSER_TOKEN").ok(),
        ..BrowserConfig::default()
    };
    let factory = RemoteSessionFactory::from_config(&config).expect("browser endpoint configured");
    let sessions: Arc<dyn SessionFactory> = Arc::new(factory);
    PageFetcher::new(sessions, FetchPolicy::from_config(&config))
}

#[tokio::test]
#[ignore] // Requires a remote browser at SITEPULSE_BROWSER_URL
async fn test_fetch_example_com() {
    let page = live_fetcher()
        .fetch("https://example.com", FetchOptions::default())
        .await
        .expect("fetch example.com");

    assert_eq!(page.status_code, 200);
    assert!(page.html.contains("Example Domain"));
}

#[tokio::test]
#[ignore] // Requires a remote browser at SITEPULSE_BROWSER_URL
async fn test_fetch_extracts_links() {
    let page = live_fetcher()
        .fetch("https://example.com", FetchOptions::with_links())
        .await
        .expect("fetch example.com");

    assert!(!page.links.is_empty());
    assert!(page.links.iter().all(|l| !l.href.starts_with("javascript:")));
}
