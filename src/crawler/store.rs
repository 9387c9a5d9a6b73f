use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::models::ArticleRecord;

pub fn articles_file_name(date: NaiveDate) -> String {
    format!("news_{}.json", date.format("%Y-%m-%d"))
}

pub async fn save_articles(
    dir: &Path,
    date: NaiveDate,
    articles: &[ArticleRecord],
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(articles_file_name(date));
    let json = serde_json::to_string_pretty(articles)?;
    tokio::fs::write(&path, json).await?;
    tracing::info!(path = %path.display(), count = articles.len(), "Saved articles");
    Ok(path)
}

pub async fn load_articles(path: &Path) -> Result<Vec<ArticleRecord>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
    let articles: Vec<ArticleRecord> = serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("{} is not an article list: {}", path.display(), e)))?;
    tracing::info!(path = %path.display(), count = articles.len(), "Loaded articles");
    Ok(articles)
}

/// Most recently modified `.json` file directly under `dir`.
pub fn latest_articles_file(dir: &Path) -> Result<Option<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        let is_newer = newest.as_ref().map_or(true, |(t, p)| (modified, &path) > (*t, p));
        if is_newer {
            newest = Some((modified, path));
        }
    }

    Ok(newest.map(|(_, path)| path))
}

/// `ARTICLES_FILE` when given, else the newest file in the data directory.
pub async fn resolve_and_load(
    articles_file: Option<&Path>,
    data_dir: &Path,
) -> Result<(PathBuf, Vec<ArticleRecord>)> {
    let path = match articles_file {
        Some(path) => path.to_path_buf(),
        None => latest_articles_file(data_dir)?.ok_or_else(|| {
            Error::Config(format!("no article files found in {}", data_dir.display()))
        })?,
    };
    let articles = load_articles(&path).await?;
    Ok((path, articles))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_then_resolve_latest() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 2, 3).unwrap();
        let articles = vec![ArticleRecord::new("https://punchng.com/a", "A", "Body")];

        let path = save_articles(dir.path(), date, &articles).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "news_2025-02-03.json");
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let (resolved, loaded) = resolve_and_load(None, dir.path()).await.unwrap();
        assert_eq!(resolved, path);
        assert_eq!(loaded, articles);
    }

    #[tokio::test]
    async fn test_explicit_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("picked.json");
        std::fs::write(&explicit, r#"[{"url": "https://x.example/1", "title": "T", "maintext": "B"}]"#).unwrap();

        let (resolved, loaded) = resolve_and_load(Some(explicit.as_path()), Path::new("/nonexistent")).await.unwrap();
        assert_eq!(resolved, explicit);
        assert_eq!(loaded[0].body, "B");
    }

    #[tokio::test]
    async fn test_empty_data_dir_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_and_load(None, dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(latest_articles_file(&dir.path().join("missing")).unwrap().is_none());
    }
}
