use std::path::Path;

use crate::llm::parser::ResponseFormat;
use crate::models::ArticleRecord;

pub const JSON_TEMPLATE: &str = r#"You are screening news articles for a {language}-language digest.

Title: {title}
Description: {description}
Authors: {authors}
Published: {date_publish}
Source: {source}
URL: {url}

Body:
{maintext_preview}

Tasks:
1. Decide whether this is serious news (politics, economy, security, society, diplomacy, infrastructure, public health policy). Gossip, entertainment, sports, lifestyle and health-tips pieces are not serious news.
2. If it is serious news: pick one category, extract 3-5 key points, translate the title, description and body into {language}, and write a short {language} summary.

Respond with a single JSON object and nothing else:
{
  "is_valid": true or false,
  "category": "category name",
  "key_points": ["point", "point"],
  "title_zh": "translated title",
  "description_zh": "translated description",
  "summary_zh": "summary",
  "maintext_zh": "translated body"
}
If the article is not serious news, return {"is_valid": false} only."#;

pub const LABELED_TEMPLATE: &str = r#"You are screening news articles for a {language}-language digest.

Title: {title}
Description: {description}
Authors: {authors}
Published: {date_publish}
Source: {source}
URL: {url}

Body:
{maintext_preview}

Decide whether this is serious news (politics, economy, security, society). Gossip, entertainment, sports and lifestyle pieces are not.

Answer using exactly these labels, each at the start of a line:
VALID: yes or no
CATEGORY: one category name
TITLE: the title in {language}
DESCRIPTION: the description in {language}
KEY POINTS:
- one key point per line
SUMMARY: a short summary in {language}
TRANSLATION:
the full body in {language}

If the article is not serious news, answer only "VALID: no"."#;

const TRUNCATION_MARKER: &str = "\n\n[article truncated]";

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    language: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            language: language.into(),
        }
    }

    pub fn builtin(format: ResponseFormat, language: impl Into<String>) -> Self {
        let template = match format {
            ResponseFormat::Json => JSON_TEMPLATE,
            ResponseFormat::Labeled => LABELED_TEMPLATE,
        };
        Self::new(template, language)
    }

    /// Inline template, else the template file, else the built-in one.
    pub fn load(
        inline: Option<&str>,
        file: &Path,
        format: ResponseFormat,
        language: &str,
    ) -> Self {
        if let Some(template) = inline {
            tracing::info!("Using prompt template from PROMPT_TEMPLATE");
            return Self::new(template.trim(), language);
        }

        match std::fs::read_to_string(file) {
            Ok(template) if !template.trim().is_empty() => {
                tracing::info!(path = %file.display(), "Using prompt template file");
                Self::new(template.trim(), language)
            }
            Ok(_) => {
                tracing::warn!(path = %file.display(), "Prompt template file is empty, using built-in template");
                Self::builtin(format, language)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %file.display(), "No prompt template file, using built-in template");
                Self::builtin(format, language)
            }
            Err(e) => {
                tracing::warn!(path = %file.display(), error = %e, "Failed to read prompt template, using built-in template");
                Self::builtin(format, language)
            }
        }
    }

    /// Fills `{name}` placeholders in one pass over the template.
    ///
    /// Substituted article text is never rescanned, and braces that do not
    /// name a known placeholder are copied as they are.
    pub fn render(&self, article: &ArticleRecord, max_body_chars: usize) -> String {
        let mut output = String::with_capacity(self.template.len() + article.body.len());
        let mut rest = self.template.as_str();

        while let Some(open) = rest.find('{') {
            output.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let token = after
                .find(|c: char| c == '}' || c == '{')
                .filter(|&end| after[end..].starts_with('}'))
                .map(|end| &after[..end]);

            let filled = token.and_then(|name| {
                self.placeholder(name, article, max_body_chars)
                    .map(|value| (name.len(), value))
            });
            match filled {
                Some((len, value)) => {
                    output.push_str(&value);
                    rest = &after[len + 1..];
                }
                None => {
                    output.push('{');
                    rest = after;
                }
            }
        }
        output.push_str(rest);
        output
    }

    fn placeholder(&self, name: &str, article: &ArticleRecord, max_body_chars: usize) -> Option<String> {
        let value = match name {
            "language" => self.language.clone(),
            "title" => article.title.clone(),
            "description" => article.description.clone(),
            "authors" if article.authors.is_empty() => "unknown".to_string(),
            "authors" => article.authors.join(", "),
            "date_publish" => article.published.clone().unwrap_or_default(),
            "source" => article.source.clone(),
            "url" => article.url.clone(),
            "maintext_preview" => body_preview(&article.body, max_body_chars),
            _ => return None,
        };
        Some(value)
    }
}

pub fn body_preview(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}{}", &body[..idx], TRUNCATION_MARKER),
        None => body.to_string(),
    }
}
