use serde::{Deserialize, Serialize};

use super::article::ArticleRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Done,
    Failed,
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStatus::Pending => write!(f, "pending"),
            ProcessingStatus::Done => write!(f, "done"),
            ProcessingStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Fields derived from the model's reply.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleAnalysis {
    #[serde(default)]
    pub is_valid: bool,
    #[serde(default)]
    pub classification: String,
    #[serde(default)]
    pub title_translation: String,
    #[serde(default)]
    pub description_translation: String,
    #[serde(default)]
    pub translation: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

impl ArticleAnalysis {
    /// Filtered article: every derived field left empty.
    pub fn filtered() -> Self {
        Self::default()
    }
}

/// Checkpoint representation of a record, keyed by article url.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointEntry {
    pub status: ProcessingStatus,
    #[serde(flatten)]
    pub analysis: ArticleAnalysis,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub article: ArticleRecord,
    pub status: ProcessingStatus,
    pub analysis: ArticleAnalysis,
    pub provider: Option<String>,
    pub error: Option<String>,
}

impl ProcessedRecord {
    pub fn pending(article: ArticleRecord) -> Self {
        Self {
            article,
            status: ProcessingStatus::Pending,
            analysis: ArticleAnalysis::default(),
            provider: None,
            error: None,
        }
    }

    pub fn from_entry(article: ArticleRecord, entry: CheckpointEntry) -> Self {
        Self {
            article,
            status: entry.status,
            analysis: entry.analysis,
            provider: entry.provider,
            error: entry.error,
        }
    }

    pub fn to_entry(&self) -> CheckpointEntry {
        CheckpointEntry {
            status: self.status,
            analysis: self.analysis.clone(),
            provider: self.provider.clone(),
            error: self.error.clone(),
        }
    }

    pub fn mark_done(&mut self, analysis: ArticleAnalysis, provider: Option<String>) {
        self.status = ProcessingStatus::Done;
        self.analysis = analysis;
        self.provider = provider;
        self.error = None;
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = ProcessingStatus::Failed;
        self.analysis = ArticleAnalysis::default();
        self.error = Some(error.into());
    }

    pub fn is_done(&self) -> bool {
        self.status == ProcessingStatus::Done
    }

    pub fn is_failed(&self) -> bool {
        self.status == ProcessingStatus::Failed
    }

    pub fn key(&self) -> String {
        self.article.key()
    }
}
