use serde::{Deserialize, Deserializer, Serialize};

/// One crawled article. Accepts news-please style keys on input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, alias = "maintext", deserialize_with = "null_as_default")]
    pub body: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub authors: Vec<String>,
    #[serde(default, alias = "date_publish")]
    pub published: Option<String>,
    #[serde(default, alias = "source_domain", deserialize_with = "null_as_default")]
    pub source: String,
    #[serde(default, alias = "homepage_source")]
    pub homepage: Option<String>,
}

impl ArticleRecord {
    pub fn new(url: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        let url = url.into();
        let source = url::Url::parse(&url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();

        Self {
            url,
            title: title.into(),
            description: String::new(),
            body: body.into(),
            authors: Vec::new(),
            published: None,
            source,
            homepage: None,
        }
    }

    /// Checkpoint key. Falls back to source and title for records without a url.
    pub fn key(&self) -> String {
        if self.url.is_empty() {
            format!("{}#{}", self.source, self.title)
        } else {
            self.url.clone()
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_news_please_keys() {
        let json = r#"{
            "url": "https://punchng.com/story",
            "title": "Senate passes budget",
            "description": null,
            "maintext": "The Senate on Tuesday...",
            "authors": ["Jane Doe"],
            "date_publish": "2025-01-14 08:00:00",
            "source_domain": "punchng.com",
            "homepage_source": "https://punchng.com/",
            "image_url": "https://punchng.com/a.jpg"
        }"#;
        let article: ArticleRecord = serde_json::from_str(json).unwrap();
        assert_eq!(article.body, "The Senate on Tuesday...");
        assert_eq!(article.description, "");
        assert_eq!(article.source, "punchng.com");
        assert_eq!(article.published.as_deref(), Some("2025-01-14 08:00:00"));
        assert_eq!(article.homepage.as_deref(), Some("https://punchng.com/"));
    }

    #[test]
    fn test_key_without_url() {
        let mut article = ArticleRecord::new("", "Headline", "body");
        article.source = "dailypost.ng".to_string();
        assert_eq!(article.key(), "dailypost.ng#Headline");
    }

    #[test]
    fn test_new_derives_source() {
        let article = ArticleRecord::new("https://dailytrust.com/a/b", "t", "b");
        assert_eq!(article.source, "dailytrust.com");
    }
}
