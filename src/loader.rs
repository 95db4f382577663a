//! Document loading: filesystem scan and URL fetch.
//!
//! Loading is skip-on-error: a document that cannot be read is recorded as
//! a [`LoadFailure`] and excluded, never aborting the batch. Documents come
//! back in a deterministic order (sorted paths for the filesystem, input
//! order for URLs) regardless of how the bounded worker pool interleaves.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::models::{Document, LoadFailure};

/// Outcome of loading a batch of sources.
#[derive(Debug)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub failures: Vec<LoadFailure>,
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).with_context(|| format!("Invalid glob pattern: {}", pattern))?;
        builder.add(glob);
    }
    builder.build().context("Failed to build glob set")
}

/// Enumerate corpus files under the configured root, matching the include
/// globs and skipping the exclude globs, in sorted path order.
pub fn scan_corpus(config: &CorpusConfig) -> Result<Vec<PathBuf>> {
    if !config.root.is_dir() {
        anyhow::bail!("corpus root is not a directory: {}", config.root.display());
    }

    let include = build_globset(&config.include_globs)?;
    let exclude = build_globset(&config.exclude_globs)?;

    let mut paths = Vec::new();
    for entry in WalkDir::new(&config.root).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("skipping unreadable directory entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(&config.root)
            .unwrap_or(entry.path());
        if include.is_match(rel) && !exclude.is_match(rel) {
            paths.push(entry.path().to_path_buf());
        }
    }

    paths.sort();
    debug!(files = paths.len(), "corpus scan complete");
    Ok(paths)
}

fn read_file(path: &Path) -> Result<Document, String> {
    let raw_text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    Ok(Document {
        id: Uuid::new_v4().to_string(),
        source_uri: path.display().to_string(),
        raw_text,
    })
}

/// Load corpus files through a bounded worker pool.
pub async fn load_files(paths: Vec<PathBuf>, workers: usize) -> LoadReport {
    run_pool(
        paths,
        workers,
        |path| path.display().to_string(),
        |path: PathBuf| async move {
            tokio::task::spawn_blocking(move || read_file(&path))
                .await
                .unwrap_or_else(|e| Err(e.to_string()))
        },
    )
    .await
}

/// Fetch URLs through a bounded worker pool, reducing HTML pages to their
/// visible text.
pub async fn load_urls(urls: Vec<String>, workers: usize) -> LoadReport {
    let client = reqwest::Client::new();
    run_pool(
        urls,
        workers,
        |url| url.clone(),
        move |url: String| {
            let client = client.clone();
            async move { fetch_url(&client, &url).await }
        },
    )
    .await
}

async fn fetch_url(client: &reqwest::Client, url: &str) -> Result<Document, String> {
    let response = client.get(url).send().await.map_err(|e| e.to_string())?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("HTTP {}", status));
    }
    let is_html = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(true);
    let body = response.text().await.map_err(|e| e.to_string())?;

    let raw_text = if is_html { html_to_text(&body) } else { body };

    Ok(Document {
        id: Uuid::new_v4().to_string(),
        source_uri: url.to_string(),
        raw_text,
    })
}

/// Strip markup from an HTML page, keeping the body's visible text with
/// paragraph-ish spacing.
fn html_to_text(html: &str) -> String {
    let document = scraper::Html::parse_document(html);
    let selector = scraper::Selector::parse("body").unwrap();

    let root_text: Vec<String> = match document.select(&selector).next() {
        Some(body) => body.text().map(|t| t.to_string()).collect(),
        None => document.root_element().text().map(|t| t.to_string()).collect(),
    };

    root_text
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run `load` over `inputs` with at most `workers` concurrent tasks,
/// reassembling results in input order. `describe` names each input for
/// the failure report. Every input ends up in exactly one of the two
/// output lists: a worker that panics is recorded as a failure for its
/// source, never silently dropped.
async fn run_pool<I, F, Fut>(
    inputs: Vec<I>,
    workers: usize,
    describe: impl Fn(&I) -> String,
    load: F,
) -> LoadReport
where
    I: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: std::future::Future<Output = Result<Document, String>> + Send + 'static,
{
    let uris: Vec<String> = inputs.iter().map(|i| describe(i)).collect();
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut set = JoinSet::new();

    for (position, input) in inputs.into_iter().enumerate() {
        let permit = semaphore.clone();
        let fut = load(input);
        set.spawn(async move {
            // Permit acquisition bounds concurrency; failure means the
            // semaphore was closed, which never happens here.
            let _permit = permit.acquire_owned().await;
            (position, fut.await)
        });
    }

    let mut slots: Vec<Option<Result<Document, String>>> = Vec::new();
    slots.resize_with(uris.len(), || None);
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((position, outcome)) => slots[position] = Some(outcome),
            Err(e) => warn!(error = %e, "load worker did not complete"),
        }
    }

    let mut documents = Vec::new();
    let mut failures = Vec::new();
    for (uri, slot) in uris.into_iter().zip(slots) {
        match slot {
            Some(Ok(doc)) => documents.push(doc),
            Some(Err(error)) => {
                warn!(source = %uri, error = %error, "skipping document");
                failures.push(LoadFailure {
                    source_uri: uri,
                    error,
                });
            }
            // The worker for this slot never reported back (panic or
            // cancellation); its join error was logged above.
            None => failures.push(LoadFailure {
                source_uri: uri,
                error: "load worker did not complete".to_string(),
            }),
        }
    }

    LoadReport {
        documents,
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus_config(root: &Path) -> CorpusConfig {
        CorpusConfig {
            root: root.to_path_buf(),
            include_globs: vec!["**/*.txt".to_string(), "**/*.md".to_string()],
            exclude_globs: vec!["**/skip/**".to_string()],
        }
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.md"), "a").unwrap();
        std::fs::write(dir.path().join("c.rs"), "ignored").unwrap();
        std::fs::create_dir(dir.path().join("skip")).unwrap();
        std::fs::write(dir.path().join("skip/d.txt"), "excluded").unwrap();

        let paths = scan_corpus(&corpus_config(dir.path())).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.md", "b.txt"]);
    }

    #[test]
    fn test_scan_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = corpus_config(&dir.path().join("nope"));
        assert!(scan_corpus(&config).is_err());
    }

    #[tokio::test]
    async fn test_load_files_skips_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.txt"), "content here").unwrap();
        let missing = dir.path().join("missing.txt");

        let report = load_files(vec![dir.path().join("good.txt"), missing.clone()], 4).await;
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].raw_text, "content here");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].source_uri, missing.display().to_string());
    }

    #[tokio::test]
    async fn test_load_files_preserves_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 0..20 {
            let p = dir.path().join(format!("{:02}.txt", i));
            std::fs::write(&p, format!("doc {}", i)).unwrap();
            paths.push(p);
        }

        let report = load_files(paths.clone(), 4).await;
        assert_eq!(report.documents.len(), 20);
        for (doc, path) in report.documents.iter().zip(paths.iter()) {
            assert_eq!(doc.source_uri, path.display().to_string());
        }
    }

    #[tokio::test]
    async fn test_panicked_worker_recorded_as_failure() {
        let report = run_pool(
            vec!["ok", "boom"],
            2,
            |s| s.to_string(),
            |s: &'static str| async move {
                if s == "boom" {
                    panic!("worker blew up");
                }
                Ok(Document {
                    id: "d1".to_string(),
                    source_uri: s.to_string(),
                    raw_text: "content".to_string(),
                })
            },
        )
        .await;

        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].source_uri, "ok");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].source_uri, "boom");
    }

    #[test]
    fn test_html_to_text_strips_markup() {
        let html = "<html><head><title>t</title></head>\
                    <body><h1>Heading</h1><p>First <b>bold</b> para.</p></body></html>";
        let text = html_to_text(html);
        assert!(text.contains("Heading"));
        assert!(text.contains("bold"));
        assert!(!text.contains('<'));
    }
}
