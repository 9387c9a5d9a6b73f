use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    FailedArticle, ProcessedRecord, ProcessingStatus, Report, ReportArticle, ReportStatistics,
    ReportSummary,
};

pub fn generate_report(records: &[ProcessedRecord], processing_date: DateTime<Utc>) -> Report {
    let mut statistics = ReportStatistics::default();
    let mut articles = Vec::new();
    let mut failed = Vec::new();
    let mut filtered = 0;
    let mut pending = 0;

    for record in records {
        match record.status {
            ProcessingStatus::Done if record.analysis.is_valid => {
                *statistics
                    .by_category
                    .entry(record.analysis.classification.clone())
                    .or_default() += 1;
                let source = if record.article.source.is_empty() {
                    "unknown".to_string()
                } else {
                    record.article.source.clone()
                };
                *statistics.by_source.entry(source).or_default() += 1;

                articles.push(ReportArticle {
                    original: record.article.clone(),
                    processed: record.analysis.clone(),
                    provider: record.provider.clone(),
                });
            }
            ProcessingStatus::Done => filtered += 1,
            ProcessingStatus::Failed => failed.push(FailedArticle {
                url: record.article.url.clone(),
                title: record.article.title.clone(),
                source: record.article.source.clone(),
                error: record.error.clone().unwrap_or_default(),
            }),
            ProcessingStatus::Pending => pending += 1,
        }
    }

    Report {
        summary: ReportSummary {
            total_articles: records.len(),
            valid_articles: articles.len(),
            filtered_articles: filtered,
            failed_articles: failed.len(),
            pending_articles: pending,
            processing_date,
        },
        statistics,
        articles,
        failed,
    }
}

/// Writes `report.json` and `report.md` into `dir`, returning the JSON path.
pub async fn write_report(report: &Report, dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;

    let json_path = dir.join("report.json");
    tokio::fs::write(&json_path, serde_json::to_string_pretty(report)?).await?;
    tokio::fs::write(dir.join("report.md"), render_markdown(report)).await?;

    tracing::info!(path = %json_path.display(), "Report written");
    Ok(json_path)
}

fn sorted_counts(counts: &std::collections::BTreeMap<String, usize>) -> Vec<(&str, usize)> {
    let mut rows: Vec<_> = counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    rows
}

pub fn render_text(report: &Report) -> String {
    let summary = &report.summary;
    let mut output = String::new();

    output.push_str("\n=== News Digest ===\n\n");
    output.push_str(&format!("Total articles: {}\n", summary.total_articles));
    output.push_str(&format!("Valid: {}\n", summary.valid_articles));
    output.push_str(&format!("Filtered: {}\n", summary.filtered_articles));
    output.push_str(&format!("Failed: {}\n", summary.failed_articles));
    if summary.pending_articles > 0 {
        output.push_str(&format!("Pending: {}\n", summary.pending_articles));
    }

    if !report.statistics.by_category.is_empty() {
        output.push_str("\nBy category:\n");
        for (category, count) in sorted_counts(&report.statistics.by_category) {
            output.push_str(&format!("  - {}: {}\n", category, count));
        }
    }

    if !report.statistics.by_source.is_empty() {
        output.push_str("\nBy source:\n");
        for (source, count) in sorted_counts(&report.statistics.by_source) {
            output.push_str(&format!("  - {}: {}\n", source, count));
        }
    }

    if !report.failed.is_empty() {
        output.push_str("\nFailed articles:\n");
        for failed in &report.failed {
            output.push_str(&format!("  ! {} ({}): {}\n", failed.title, failed.url, failed.error));
        }
    }

    output.push_str(&format!(
        "\nProcessed on: {}\n",
        summary.processing_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    output
}

pub fn render_markdown(report: &Report) -> String {
    let summary = &report.summary;
    let mut output = String::new();

    output.push_str("# News Digest\n\n");
    output.push_str("## Summary\n\n");
    output.push_str("| Metric | Value |\n|--------|-------|\n");
    output.push_str(&format!("| Total Articles | {} |\n", summary.total_articles));
    output.push_str(&format!("| Valid | {} |\n", summary.valid_articles));
    output.push_str(&format!("| Filtered | {} |\n", summary.filtered_articles));
    output.push_str(&format!("| Failed | {} |\n", summary.failed_articles));

    if !report.statistics.by_category.is_empty() {
        output.push_str("\n## Categories\n\n");
        for (category, count) in sorted_counts(&report.statistics.by_category) {
            output.push_str(&format!("- **{}**: {}\n", category, count));
        }
    }

    if !report.statistics.by_source.is_empty() {
        output.push_str("\n## Sources\n\n");
        for (source, count) in sorted_counts(&report.statistics.by_source) {
            output.push_str(&format!("- **{}**: {}\n", source, count));
        }
    }

    output.push_str("\n## Articles\n");
    for (i, article) in report.articles.iter().enumerate() {
        let original = &article.original;
        let processed = &article.processed;
        let heading = if processed.title_translation.is_empty() {
            &original.title
        } else {
            &processed.title_translation
        };

        output.push_str(&format!("\n### {}. {}\n\n", i + 1, heading));
        output.push_str(&format!("**Original title:** {}\n\n", original.title));
        output.push_str(&format!("**Category:** {}\n\n", processed.classification));
        output.push_str(&format!("**Source:** {}\n\n", original.source));
        if !original.authors.is_empty() {
            output.push_str(&format!("**Authors:** {}\n\n", original.authors.join(", ")));
        }
        if let Some(ref published) = original.published {
            output.push_str(&format!("**Published:** {}\n\n", published));
        }
        output.push_str(&format!("**Link:** {}\n\n", original.url));

        if !processed.description_translation.is_empty() {
            output.push_str(&format!("{}\n\n", processed.description_translation));
        }
        if !processed.key_points.is_empty() {
            output.push_str("**Key points:**\n\n");
            for point in &processed.key_points {
                output.push_str(&format!("- {}\n", point));
            }
            output.push('\n');
        }
        if !processed.summary.is_empty() {
            output.push_str(&format!("**Summary:** {}\n\n", processed.summary));
        }
        if !processed.translation.is_empty() {
            output.push_str(&format!("{}\n\n", processed.translation));
        }
        output.push_str("---\n");
    }

    if !report.failed.is_empty() {
        output.push_str("\n## Failed\n\n");
        for failed in &report.failed {
            output.push_str(&format!("- [{}]({}): {}\n", failed.title, failed.url, failed.error));
        }
    }

    output.push_str(&format!(
        "\n*Processed on {}*\n",
        summary.processing_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    output
}
