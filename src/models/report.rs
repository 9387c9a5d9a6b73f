use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::article::ArticleRecord;
use super::record::ArticleAnalysis;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub summary: ReportSummary,
    pub statistics: ReportStatistics,
    pub articles: Vec<ReportArticle>,
    pub failed: Vec<FailedArticle>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_articles: usize,
    pub valid_articles: usize,
    pub filtered_articles: usize,
    pub failed_articles: usize,
    pub pending_articles: usize,
    pub processing_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportStatistics {
    pub by_category: BTreeMap<String, usize>,
    pub by_source: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportArticle {
    pub original: ArticleRecord,
    pub processed: ArticleAnalysis,
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedArticle {
    pub url: String,
    pub title: String,
    pub source: String,
    pub error: String,
}
