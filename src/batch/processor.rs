use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};

use crate::batch::checkpoint::Checkpoint;
use crate::batch::throttle::Throttle;
use crate::config::BatchConfig;
use crate::error::Result;
use crate::llm::{Completer, CompletionRequest, PromptTemplate, ResponseParser};
use crate::models::{ArticleAnalysis, ArticleRecord, ProcessedRecord};

/// Sequential, throttled, checkpointed article processing.
pub struct BatchProcessor {
    completer: Arc<dyn Completer>,
    template: PromptTemplate,
    parser: ResponseParser,
    config: BatchConfig,
    throttle: Throttle,
}

impl BatchProcessor {
    pub fn new(
        completer: Arc<dyn Completer>,
        template: PromptTemplate,
        parser: ResponseParser,
        config: BatchConfig,
    ) -> Self {
        let throttle = Throttle::new(config.request_interval);
        Self {
            completer,
            template,
            parser,
            config,
            throttle,
        }
    }

    /// Processes every article not already `done` in the checkpoint.
    pub async fn run(
        &self,
        articles: &[ArticleRecord],
        checkpoint_path: &Path,
    ) -> Result<Vec<ProcessedRecord>> {
        let mut checkpoint = Checkpoint::load(checkpoint_path).await?;
        let mut records = restore(articles, &checkpoint);

        let todo: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.is_done())
            .map(|(i, _)| i)
            .collect();

        tracing::info!(
            total = records.len(),
            resumed = records.len() - todo.len(),
            to_process = todo.len(),
            "Starting batch"
        );

        self.process_pass(&mut records, &todo, &mut checkpoint, "articles")
            .await?;

        if self.config.retry_failed {
            let failed: Vec<usize> = todo
                .iter()
                .copied()
                .filter(|&i| records[i].is_failed())
                .collect();
            if !failed.is_empty() {
                tracing::info!(count = failed.len(), "Retrying failed articles");
                self.process_pass(&mut records, &failed, &mut checkpoint, "retries")
                    .await?;
            }
        }

        log_totals(&records);
        Ok(records)
    }

    /// Re-processes only records the checkpoint holds as `failed`.
    pub async fn retry_failed(
        &self,
        articles: &[ArticleRecord],
        checkpoint_path: &Path,
    ) -> Result<Vec<ProcessedRecord>> {
        let mut checkpoint = Checkpoint::load(checkpoint_path).await?;
        let mut records = restore(articles, &checkpoint);

        let failed: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_failed())
            .map(|(i, _)| i)
            .collect();

        tracing::info!(count = failed.len(), "Retrying failed articles");
        self.process_pass(&mut records, &failed, &mut checkpoint, "retries")
            .await?;

        log_totals(&records);
        Ok(records)
    }

    async fn process_pass(
        &self,
        records: &mut [ProcessedRecord],
        indices: &[usize],
        checkpoint: &mut Checkpoint,
        unit: &str,
    ) -> Result<()> {
        if indices.is_empty() {
            return Ok(());
        }

        let pb = progress_bar(indices.len(), unit);

        for &i in indices {
            let record = &mut records[i];
            self.process_one(record).await;

            checkpoint.insert(record.key(), record.to_entry());
            checkpoint.save().await?;

            pb.inc(1);
        }

        pb.finish_with_message("done");
        Ok(())
    }

    async fn process_one(&self, record: &mut ProcessedRecord) {
        let article = &record.article;
        let body_chars = article.body.trim().chars().count();

        if body_chars < self.config.min_body_chars {
            tracing::info!(url = %article.url, chars = body_chars, "Body too short, filtered without a provider call");
            record.mark_done(ArticleAnalysis::filtered(), None);
            return;
        }

        let prompt = self.template.render(article, self.config.max_body_chars);
        let request = CompletionRequest::new(prompt).with_provider(self.config.provider.clone());

        self.throttle.wait().await;

        let outcome = match self.completer.complete(&request).await {
            Ok(result) => self
                .parser
                .parse(&result.text)
                .map(|analysis| (analysis, result.source_label())),
            Err(e) => Err(e),
        };

        match outcome {
            Ok((analysis, label)) => {
                tracing::info!(
                    url = %record.article.url,
                    provider = %label,
                    valid = analysis.is_valid,
                    category = %analysis.classification,
                    "Article processed"
                );
                record.mark_done(analysis, Some(label));
            }
            Err(e) => {
                if e.is_recoverable() {
                    tracing::warn!(url = %record.article.url, error = %e, "Article failed");
                } else {
                    tracing::error!(url = %record.article.url, error = %e, "Article failed");
                }
                record.mark_failed(e.to_string());
            }
        }
    }
}

/// One record per distinct url, restored from the checkpoint when present.
fn restore(articles: &[ArticleRecord], checkpoint: &Checkpoint) -> Vec<ProcessedRecord> {
    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(articles.len());

    for article in articles {
        let key = article.key();
        if !seen.insert(key.clone()) {
            tracing::debug!(url = %key, "Skipping duplicate article");
            continue;
        }

        let record = match checkpoint.get(&key) {
            Some(entry) => ProcessedRecord::from_entry(article.clone(), entry.clone()),
            None => ProcessedRecord::pending(article.clone()),
        };
        records.push(record);
    }

    records
}

fn progress_bar(len: usize, unit: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let template = format!(
        "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {}",
        unit
    );
    if let Ok(style) = ProgressStyle::default_bar().template(&template) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

fn log_totals(records: &[ProcessedRecord]) {
    let done = records.iter().filter(|r| r.is_done()).count();
    let failed = records.iter().filter(|r| r.is_failed()).count();
    let valid = records.iter().filter(|r| r.analysis.is_valid).count();
    tracing::info!(
        total = records.len(),
        done,
        valid,
        failed,
        pending = records.len() - done - failed,
        "Batch finished"
    );
}
