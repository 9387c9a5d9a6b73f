use scraper::{Html, Selector};
use url::Url;

use crate::crawler::links::collapse_whitespace;
use crate::models::ArticleRecord;

const TITLE_SELECTORS: &[&str] = &["meta[property=\"og:title\"]", "h1", "title"];
const DESCRIPTION_SELECTORS: &[&str] = &[
    "meta[name=\"description\"]",
    "meta[property=\"og:description\"]",
];
const AUTHOR_SELECTORS: &[&str] = &[
    "meta[name=\"author\"]",
    "meta[property=\"article:author\"]",
    "[rel=\"author\"]",
];
const PUBLISHED_SELECTORS: &[&str] = &[
    "meta[property=\"article:published_time\"]",
    "meta[name=\"pubdate\"]",
    "time[datetime]",
];
const BODY_SELECTORS: &[&str] = &["article p", ".entry-content p", ".post-content p", "p"];

/// Article fields from a page; `None` when the page has no title.
pub fn extract_article(url: &Url, html: &str, homepage: Option<&str>) -> Option<ArticleRecord> {
    let document = Html::parse_document(html);

    let title = first_value(&document, TITLE_SELECTORS)?;
    let mut article = ArticleRecord::new(url.as_str(), title, body(&document));
    article.description = first_value(&document, DESCRIPTION_SELECTORS).unwrap_or_default();
    article.authors = authors(&document);
    article.published = first_value(&document, PUBLISHED_SELECTORS);
    article.homepage = homepage.map(str::to_string);
    Some(article)
}

/// Meta `content`, `datetime` attribute, or element text, whichever is present.
fn first_value(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        document.select(&selector).find_map(|element| {
            let raw = element
                .value()
                .attr("content")
                .or_else(|| element.value().attr("datetime"))
                .map(str::to_string)
                .unwrap_or_else(|| element.text().collect());
            let value = collapse_whitespace(&raw);
            (!value.is_empty()).then_some(value)
        })
    })
}

fn authors(document: &Html) -> Vec<String> {
    let mut authors: Vec<String> = Vec::new();
    for css in AUTHOR_SELECTORS {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        for element in document.select(&selector) {
            let raw = element
                .value()
                .attr("content")
                .map(str::to_string)
                .unwrap_or_else(|| element.text().collect());
            let name = collapse_whitespace(&raw);
            if !name.is_empty() && !name.starts_with("http") && !authors.contains(&name) {
                authors.push(name);
            }
        }
    }
    authors
}

fn body(document: &Html) -> String {
    for css in BODY_SELECTORS {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        let paragraphs: Vec<String> = document
            .select(&selector)
            .map(|p| collapse_whitespace(&p.text().collect::<String>()))
            .filter(|p| !p.is_empty())
            .collect();
        if !paragraphs.is_empty() {
            return paragraphs.join("\n\n");
        }
    }
    String::new()
}
