use std::collections::HashMap;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::ArticleAnalysis;

const DEFAULT_CATEGORY: &str = "Other";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Json,
    Labeled,
}

impl FromStr for ResponseFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ResponseFormat::Json),
            "labeled" | "labelled" | "text" => Ok(ResponseFormat::Labeled),
            other => Err(Error::Config(format!(
                "unknown RESPONSE_FORMAT '{}' (expected json or labeled)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseFormat::Json => write!(f, "json"),
            ResponseFormat::Labeled => write!(f, "labeled"),
        }
    }
}

/// JSON keys or line labels the reply is read by.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldNames {
    pub valid: String,
    pub category: String,
    pub key_points: String,
    pub title: String,
    pub description: String,
    pub summary: String,
    pub translation: String,
}

impl FieldNames {
    pub fn defaults(format: ResponseFormat) -> Self {
        let names = match format {
            ResponseFormat::Json => [
                "is_valid",
                "category",
                "key_points",
                "title_zh",
                "description_zh",
                "summary_zh",
                "maintext_zh",
            ],
            ResponseFormat::Labeled => [
                "VALID",
                "CATEGORY",
                "KEY POINTS",
                "TITLE",
                "DESCRIPTION",
                "SUMMARY",
                "TRANSLATION",
            ],
        };
        let [valid, category, key_points, title, description, summary, translation] =
            names.map(str::to_string);
        Self {
            valid,
            category,
            key_points,
            title,
            description,
            summary,
            translation,
        }
    }

    /// Applies a JSON object such as `{"category": "topic"}` over the defaults.
    pub fn with_overrides(mut self, json: &str) -> Result<Self> {
        let overrides: HashMap<String, String> = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid RESPONSE_FIELDS: {}", e)))?;

        for (field, name) in overrides {
            let slot = match field.as_str() {
                "valid" | "is_valid" => &mut self.valid,
                "category" => &mut self.category,
                "key_points" => &mut self.key_points,
                "title" => &mut self.title,
                "description" => &mut self.description,
                "summary" => &mut self.summary,
                "translation" | "maintext" => &mut self.translation,
                other => {
                    return Err(Error::Config(format!(
                        "unknown field '{}' in RESPONSE_FIELDS",
                        other
                    )))
                }
            };
            *slot = name;
        }
        Ok(self)
    }

    fn labels(&self) -> [&str; 7] {
        [
            self.valid.as_str(),
            self.category.as_str(),
            self.key_points.as_str(),
            self.title.as_str(),
            self.description.as_str(),
            self.summary.as_str(),
            self.translation.as_str(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct ResponseParser {
    format: ResponseFormat,
    fields: FieldNames,
}

impl ResponseParser {
    pub fn new(format: ResponseFormat, fields_json: Option<&str>) -> Result<Self> {
        let fields = FieldNames::defaults(format);
        let fields = match fields_json {
            Some(json) => fields.with_overrides(json)?,
            None => fields,
        };
        Ok(Self { format, fields })
    }

    pub fn parse(&self, text: &str) -> Result<ArticleAnalysis> {
        match self.format {
            ResponseFormat::Json => self.parse_json(text),
            ResponseFormat::Labeled => self.parse_labeled(text),
        }
    }

    fn parse_json(&self, text: &str) -> Result<ArticleAnalysis> {
        let json_str = extract_json(text)?;
        let value: Value = serde_json::from_str(&json_str)
            .map_err(|e| Error::OutputParse(format!("Failed to parse model reply: {}", e)))?;
        let object = value
            .as_object()
            .ok_or_else(|| Error::OutputParse("model reply is not a JSON object".to_string()))?;

        let is_valid = object.get(&self.fields.valid).map(truthy_value).unwrap_or(false);
        if !is_valid {
            return Ok(ArticleAnalysis::filtered());
        }

        let text_field = |name: &str| -> String {
            match object.get(name) {
                Some(Value::String(s)) => s.trim().to_string(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            }
        };

        let key_points = match object.get(&self.fields.key_points) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .filter(|s| !s.is_empty())
                .collect(),
            Some(Value::String(s)) => bullet_lines(s),
            _ => Vec::new(),
        };

        Ok(valid_analysis(
            text_field(&self.fields.category),
            text_field(&self.fields.title),
            text_field(&self.fields.description),
            text_field(&self.fields.translation),
            key_points,
            text_field(&self.fields.summary),
        ))
    }

    fn parse_labeled(&self, text: &str) -> Result<ArticleAnalysis> {
        // Longest first, so "KEY POINTS" wins over a shorter label it starts with.
        let mut labels = self.fields.labels();
        labels.sort_by_key(|l| std::cmp::Reverse(l.len()));

        let mut sections: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut current: Option<&str> = None;

        // The translation runs to the end of the reply; body text quoted in
        // it may start with a label word.
        let translation = self.fields.translation.as_str();

        for line in text.lines() {
            let stripped = line.trim().trim_start_matches(['*', '#']).trim_start();
            let matched = match current {
                Some(label) if label == translation => None,
                _ => match_label(stripped, &labels),
            };
            if let Some((label, rest)) = matched {
                current = Some(label);
                let entry = sections.entry(label).or_default();
                let rest = rest.trim();
                if !rest.is_empty() {
                    entry.push(rest);
                }
            } else if let Some(label) = current {
                sections.entry(label).or_default().push(line.trim_end());
            }
        }

        if sections.is_empty() {
            return Err(Error::OutputParse(
                "no labeled fields found in model reply".to_string(),
            ));
        }

        let section = |name: &str| -> String {
            sections
                .get(name)
                .map(|lines| lines.join("\n").trim().to_string())
                .unwrap_or_default()
        };

        let is_valid = truthy_text(&section(&self.fields.valid));
        if !is_valid {
            return Ok(ArticleAnalysis::filtered());
        }

        Ok(valid_analysis(
            section(&self.fields.category),
            section(&self.fields.title),
            section(&self.fields.description),
            section(&self.fields.translation),
            bullet_lines(&section(&self.fields.key_points)),
            section(&self.fields.summary),
        ))
    }
}

fn valid_analysis(
    category: String,
    title: String,
    description: String,
    translation: String,
    key_points: Vec<String>,
    summary: String,
) -> ArticleAnalysis {
    ArticleAnalysis {
        is_valid: true,
        classification: if category.is_empty() {
            DEFAULT_CATEGORY.to_string()
        } else {
            category
        },
        title_translation: title,
        description_translation: description,
        translation,
        key_points,
        summary,
    }
}

fn match_label<'a, 'l>(line: &'a str, labels: &[&'l str]) -> Option<(&'l str, &'a str)> {
    labels.iter().find_map(|label| {
        let head = line.get(..label.len())?;
        if !head.eq_ignore_ascii_case(label) {
            return None;
        }
        let rest = line[label.len()..].trim_start_matches('*').trim_start();
        rest.strip_prefix(':')
            .or_else(|| rest.strip_prefix('：'))
            .map(|rest| (*label, rest))
    })
}

fn truthy_value(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => truthy_text(s),
        Value::Number(n) => n.as_i64() == Some(1),
        _ => false,
    }
}

fn truthy_text(text: &str) -> bool {
    let word = text
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    matches!(word.as_str(), "yes" | "true" | "y" | "valid" | "1" | "是")
}

fn bullet_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            let line = line.trim();
            let line = line.trim_start_matches(['-', '*', '•']);
            let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
            let line = if digits > 0 {
                line[digits..]
                    .strip_prefix('.')
                    .or_else(|| line[digits..].strip_prefix(')'))
                    .unwrap_or(line)
            } else {
                line
            };
            line.trim().to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

fn extract_json(text: &str) -> Result<String> {
    // Fenced ```json block
    if let Some(start) = text.find("```json") {
        let start = start + 7;
        if let Some(end) = text[start..].find("```") {
            return Ok(text[start..start + end].trim().to_string());
        }
    }

    // Plain fenced block
    if let Some(start) = text.find("```") {
        let start = start + 3;
        let start = text[start..]
            .find('\n')
            .map(|i| start + i + 1)
            .unwrap_or(start);
        if let Some(end) = text[start..].find("```") {
            let content = text[start..start + end].trim();
            if content.starts_with('{') {
                return Ok(content.to_string());
            }
        }
    }

    // First balanced object
    if let Some(start) = text.find('{') {
        let mut depth = 0;
        let mut end = start;
        let mut in_string = false;
        let mut escape_next = false;

        for (i, c) in text[start..].char_indices() {
            if escape_next {
                escape_next = false;
                continue;
            }

            match c {
                '\\' if in_string => escape_next = true,
                '"' => in_string = !in_string,
                '{' if !in_string => depth += 1,
                '}' if !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        end = start + i + 1;
                        break;
                    }
                }
                _ => {}
            }
        }

        if depth == 0 && end > start {
            return Ok(text[start..end].to_string());
        }
    }

    Err(Error::OutputParse("No JSON object found in model reply".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_parser() -> ResponseParser {
        ResponseParser::new(ResponseFormat::Json, None).unwrap()
    }

    fn labeled_parser() -> ResponseParser {
        ResponseParser::new(ResponseFormat::Labeled, None).unwrap()
    }

    #[test]
    fn test_extract_json_from_markdown() {
        let input = "Here you go:\n```json\n{\"is_valid\": false}\n```\n";
        assert_eq!(extract_json(input).unwrap(), r#"{"is_valid": false}"#);
    }

    #[test]
    fn test_extract_raw_json_with_multibyte_text() {
        let input = r#"结果 {"title_zh": "燃油价格{上涨}", "is_valid": true} 完"#;
        assert_eq!(
            extract_json(input).unwrap(),
            r#"{"title_zh": "燃油价格{上涨}", "is_valid": true}"#
        );
    }

    #[test]
    fn test_json_valid_article() {
        let reply = r#"```json
{
  "is_valid": true,
  "category": "Economy",
  "key_points": ["Fuel up 10%", "Unions protest"],
  "title_zh": "燃油价格上涨",
  "description_zh": "周一油价再涨",
  "summary_zh": "油价上涨引发抗议",
  "maintext_zh": "正文"
}
```"#;
        let analysis = json_parser().parse(reply).unwrap();
        assert!(analysis.is_valid);
        assert_eq!(analysis.classification, "Economy");
        assert_eq!(analysis.key_points, vec!["Fuel up 10%", "Unions protest"]);
        assert_eq!(analysis.title_translation, "燃油价格上涨");
        assert_eq!(analysis.translation, "正文");
    }

    #[test]
    fn test_json_invalid_clears_fields() {
        let reply = r#"{"is_valid": false, "category": "Sports", "summary_zh": "x"}"#;
        assert_eq!(json_parser().parse(reply).unwrap(), ArticleAnalysis::filtered());
    }

    #[test]
    fn test_json_missing_validity_is_filtered() {
        let reply = r#"{"category": "Politics"}"#;
        assert!(!json_parser().parse(reply).unwrap().is_valid);
    }

    #[test]
    fn test_json_missing_category_defaults() {
        let reply = r#"{"is_valid": "yes", "key_points": "- one\n- two"}"#;
        let analysis = json_parser().parse(reply).unwrap();
        assert_eq!(analysis.classification, "Other");
        assert_eq!(analysis.key_points, vec!["one", "two"]);
    }

    #[test]
    fn test_unstructured_reply_is_parse_error() {
        let err = json_parser().parse("I cannot help with that.").unwrap_err();
        assert!(matches!(err, Error::OutputParse(_)));
        let err = labeled_parser().parse("I cannot help with that.").unwrap_err();
        assert!(matches!(err, Error::OutputParse(_)));
    }

    #[test]
    fn test_labeled_reply() {
        let reply = "VALID: yes\nCATEGORY: Security\nTITLE: 标题\nDESCRIPTION: 描述\nKEY POINTS:\n1. First point\n2) Second point\n- Third point\nSUMMARY: 摘要\nTRANSLATION:\n第一段\n\n第二段\n";
        let analysis = labeled_parser().parse(reply).unwrap();
        assert!(analysis.is_valid);
        assert_eq!(analysis.classification, "Security");
        assert_eq!(analysis.title_translation, "标题");
        assert_eq!(analysis.key_points, vec!["First point", "Second point", "Third point"]);
        assert_eq!(analysis.summary, "摘要");
        assert_eq!(analysis.translation, "第一段\n\n第二段");
    }

    #[test]
    fn test_translation_keeps_label_like_lines() {
        let reply = "VALID: yes\nSUMMARY: s\nTRANSLATION:\nline one\nSummary: quoted line from body\nline three";
        let analysis = labeled_parser().parse(reply).unwrap();
        assert_eq!(analysis.summary, "s");
        assert_eq!(
            analysis.translation,
            "line one\nSummary: quoted line from body\nline three"
        );
    }

    #[test]
    fn test_labeled_markdown_and_invalid() {
        let analysis = labeled_parser().parse("**VALID:** No\nCATEGORY: Gossip").unwrap();
        assert_eq!(analysis, ArticleAnalysis::filtered());
    }

    #[test]
    fn test_field_overrides() {
        let parser = ResponseParser::new(
            ResponseFormat::Json,
            Some(r#"{"valid": "serious", "category": "topic"}"#),
        )
        .unwrap();
        let analysis = parser.parse(r#"{"serious": true, "topic": "Diplomacy"}"#).unwrap();
        assert_eq!(analysis.classification, "Diplomacy");

        let err = ResponseParser::new(ResponseFormat::Json, Some(r#"{"colour": "x"}"#)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("JSON".parse::<ResponseFormat>().unwrap(), ResponseFormat::Json);
        assert_eq!("labeled".parse::<ResponseFormat>().unwrap(), ResponseFormat::Labeled);
        assert!("yaml".parse::<ResponseFormat>().is_err());
    }
}
