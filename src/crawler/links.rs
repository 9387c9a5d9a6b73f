use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use url::Url;

const LINK_SELECTORS: &[&str] = &[
    "article a",
    ".post a",
    ".article a",
    "h2 a",
    "h3 a",
    ".entry-title a",
    ".news-item a",
    "a[href*=\"/article/\"]",
    "a[href*=\"/news/\"]",
    "a[href*=\"/story/\"]",
];

const EXCLUDED_PATHS: &[&str] = &["/category/", "/tag/", "/author/", "/page/", "/archive/"];

const MIN_TITLE_CHARS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct ArticleLink {
    pub url: String,
    pub title: String,
    pub homepage: String,
}

/// Candidate article links on a homepage, in document order per selector.
pub fn extract_article_links(homepage: &Url, html: &str, limit: usize) -> Vec<ArticleLink> {
    let document = Html::parse_document(html);
    let mut found = HashSet::new();
    let mut links = Vec::new();

    for css in LINK_SELECTORS {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        for element in document.select(&selector) {
            if let Some(link) = candidate(homepage, element, &found, false) {
                found.insert(link.url.clone());
                links.push(link);
            }
        }
    }

    // Layouts without any of the usual containers.
    if links.is_empty() {
        if let Ok(selector) = Selector::parse("a[href]") {
            for element in document.select(&selector) {
                if let Some(link) = candidate(homepage, element, &found, true) {
                    found.insert(link.url.clone());
                    links.push(link);
                }
            }
        }
    }

    links.truncate(limit);
    links
}

fn candidate(
    homepage: &Url,
    element: ElementRef<'_>,
    found: &HashSet<String>,
    fallback: bool,
) -> Option<ArticleLink> {
    let href = element.value().attr("href")?;
    let full_url = homepage.join(href).ok()?;

    if full_url.host_str() != homepage.host_str() {
        return None;
    }

    let url = full_url.to_string();
    let lower = url.to_lowercase();
    if url == homepage.as_str()
        || found.contains(&url)
        || EXCLUDED_PATHS.iter().any(|p| lower.contains(p))
    {
        return None;
    }

    if fallback && (url.len() <= homepage.as_str().len() + 10 || url.contains('#')) {
        return None;
    }

    let title = collapse_whitespace(&element.text().collect::<String>());
    if title.chars().count() <= MIN_TITLE_CHARS {
        return None;
    }

    Some(ArticleLink {
        url,
        title,
        homepage: homepage.to_string(),
    })
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn homepage() -> Url {
        Url::parse("https://punchng.com/").unwrap()
    }

    #[test]
    fn test_selector_links_are_filtered() {
        let html = r#"
            <html><body>
              <article><a href="/senate-passes-2025-budget/">Senate passes 2025 budget after debate</a></article>
              <h2><a href="https://punchng.com/senate-passes-2025-budget/">Senate passes 2025 budget after debate</a></h2>
              <h3><a href="https://othersite.com/story">Story on another domain entirely</a></h3>
              <h3><a href="/category/politics/">Politics section front page</a></h3>
              <h3><a href="/short/">Short</a></h3>
              <h3><a href="/">Home page of the newspaper</a></h3>
              <div class="entry-title"><a href="/naira-gains-against-dollar/">  Naira gains
                 against dollar  </a></div>
            </body></html>"#;

        let links = extract_article_links(&homepage(), html, 25);
        let urls: Vec<_> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://punchng.com/senate-passes-2025-budget/",
                "https://punchng.com/naira-gains-against-dollar/",
            ]
        );
        assert_eq!(links[1].title, "Naira gains against dollar");
        assert_eq!(links[0].homepage, "https://punchng.com/");
    }

    #[test]
    fn test_fallback_over_all_anchors() {
        let html = r##"
            <div>
              <a href="/2025/02/03/fuel-price-hike-sparks-protest">Fuel price hike sparks protest</a>
              <a href="/about">About this newspaper site</a>
              <a href="/2025/02/03/long-enough-path#comments">Comments on the fuel story</a>
            </div>"##;

        let links = extract_article_links(&homepage(), html, 25);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://punchng.com/2025/02/03/fuel-price-hike-sparks-protest");
    }

    #[test]
    fn test_limit_applies() {
        let html: String = (0..40)
            .map(|i| format!(r#"<h2><a href="/story-number-{i}/">Headline number {i} of the day</a></h2>"#))
            .collect();
        assert_eq!(extract_article_links(&homepage(), &html, 25).len(), 25);
    }
}
