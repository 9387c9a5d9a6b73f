use reqwest::{header, Client};
use tokio::time::sleep;
use url::Url;

use crate::config::CrawlerConfig;
use crate::crawler::article::extract_article;
use crate::crawler::links::{extract_article_links, ArticleLink};
use crate::error::{Error, Result};
use crate::models::ArticleRecord;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub struct Crawler {
    client: Client,
    config: CrawlerConfig,
}

impl Crawler {
    pub fn new(config: CrawlerConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static(BROWSER_USER_AGENT),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static("en-US,en;q=0.5"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self { client, config })
    }

    /// Crawls every configured homepage. Per-page failures are logged and skipped.
    pub async fn crawl(&self) -> Vec<ArticleRecord> {
        let mut articles = Vec::new();
        let mut links_found = 0;

        for homepage in &self.config.homepages {
            tracing::info!("Processing homepage: {}", homepage);

            let links = match self.discover(homepage).await {
                Ok(links) => links,
                Err(e) => {
                    tracing::warn!(homepage = %homepage, error = %e, "Failed to process homepage");
                    continue;
                }
            };
            links_found += links.len();
            tracing::info!("Found {} article links on {}", links.len(), homepage);

            for (i, link) in links.iter().enumerate() {
                tracing::debug!("[{}/{}] Extracting: {}", i + 1, links.len(), link.title);

                match self.fetch_article(link).await {
                    Ok(Some(article)) => articles.push(article),
                    Ok(None) => tracing::debug!(url = %link.url, "No article content found"),
                    Err(e) => tracing::warn!(url = %link.url, error = %e, "Failed to extract article"),
                }

                sleep(self.config.delay).await;
            }
        }

        tracing::info!(
            links = links_found,
            articles = articles.len(),
            "Crawl finished"
        );
        articles
    }

    pub async fn discover(&self, homepage: &str) -> Result<Vec<ArticleLink>> {
        let homepage_url = Url::parse(homepage)
            .map_err(|e| Error::Crawl(format!("invalid homepage url {}: {}", homepage, e)))?;
        let html = self.fetch(homepage_url.as_str()).await?;
        Ok(extract_article_links(
            &homepage_url,
            &html,
            self.config.limit_per_homepage,
        ))
    }

    async fn fetch_article(&self, link: &ArticleLink) -> Result<Option<ArticleRecord>> {
        let url = Url::parse(&link.url)
            .map_err(|e| Error::Crawl(format!("invalid article url {}: {}", link.url, e)))?;
        let html = self.fetch(url.as_str()).await?;
        Ok(extract_article(&url, &html, Some(&link.homepage)))
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(Error::Crawl(format!(
                "Failed to fetch {}: {}",
                url,
                response.status()
            )));
        }

        Ok(response.text().await?)
    }
}
