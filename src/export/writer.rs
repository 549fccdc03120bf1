use crate::api::ApiClient;
use crate::discover::{DiscoverResult, DocumentItem};
use crate::export::planner::plan_export;
use crate::progress::{ExportEvent, ExportStatus, ProgressObserver};
use crate::render::{has_markdown_body_content, render};
use crate::resource::ResourceKind;
use crate::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Outcome of an export run
#[derive(Debug, Clone)]
pub struct ExportSummary {
    /// Entries in the export plan
    pub total: usize,
    /// Files written
    pub written: usize,
    /// Entries skipped (unsupported kinds, empty documents)
    pub skipped: usize,
    pub warnings: Vec<String>,
}

/// What the service is asked for to produce an item's body
enum Source {
    Document(String),
    File(String),
}

/// Exports every planned item of a discovery manifest under `output_root`
///
/// Per-item fetch failures are recorded as warnings and never abort the run;
/// I/O failures on the output root do. Documents reachable through several
/// manifest entries are fetched once and reused. An item whose body renders
/// without content beyond headings is skipped, and a stale file from an
/// earlier run at its target path is removed.
pub async fn run_export(
    client: &mut ApiClient,
    result: &DiscoverResult,
    output_root: &Path,
    observer: &mut dyn ProgressObserver,
) -> Result<ExportSummary> {
    let plan = plan_export(result);
    let total = plan.len();
    tracing::info!("Exporting {} items to {}", total, output_root.display());

    let mut summary = ExportSummary {
        total,
        written: 0,
        skipped: 0,
        warnings: Vec::new(),
    };
    let mut bodies: HashMap<(&'static str, String), String> = HashMap::new();
    let mut sequence = 0u64;

    for entry in &plan {
        sequence += 1;
        let target = output_root.join(entry.relative_path());
        emit(
            observer,
            ExportStatus::Processing,
            sequence,
            &entry.item.id,
            "fetching",
            Some(target.clone()),
            &summary,
        );

        let source = match resolve_source(client, &entry.item).await {
            Resolved::Source(source) => source,
            Resolved::Unsupported(reason) => {
                summary.skipped += 1;
                summary
                    .warnings
                    .push(format!("{}: {}", entry.item.id, reason));
                emit(
                    observer,
                    ExportStatus::Skip,
                    sequence,
                    &entry.item.id,
                    &reason,
                    None,
                    &summary,
                );
                continue;
            }
            Resolved::Failed(message) => {
                summary
                    .warnings
                    .push(format!("{}: {}", entry.item.id, message));
                emit(
                    observer,
                    ExportStatus::Error,
                    sequence,
                    &entry.item.id,
                    &message,
                    None,
                    &summary,
                );
                continue;
            }
        };

        let title = entry.item.title.as_deref();
        let (body, note) = match fetch_body(client, &source, title, &mut bodies).await {
            Ok(body) => body,
            Err(message) => {
                summary
                    .warnings
                    .push(format!("{}: {}", entry.item.id, message));
                emit(
                    observer,
                    ExportStatus::Error,
                    sequence,
                    &entry.item.id,
                    &message,
                    None,
                    &summary,
                );
                continue;
            }
        };

        // Heading-only output counts as no content, same rule as the
        // raw-content fallback decision
        if !has_markdown_body_content(&body) {
            remove_stale(&target).await?;
            summary.skipped += 1;
            emit(
                observer,
                ExportStatus::Skip,
                sequence,
                &entry.item.id,
                "no body content",
                Some(target),
                &summary,
            );
            continue;
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut body = body;
        if !body.ends_with('\n') {
            body.push('\n');
        }
        tokio::fs::write(&target, body).await?;
        summary.written += 1;
        emit(
            observer,
            ExportStatus::Success,
            sequence,
            &entry.item.id,
            &note,
            Some(target),
            &summary,
        );
    }

    tracing::info!(
        "Export finished: {} written, {} skipped, {} warnings",
        summary.written,
        summary.skipped,
        summary.warnings.len()
    );
    Ok(summary)
}

enum Resolved {
    Source(Source),
    Unsupported(String),
    Failed(String),
}

/// Maps a discovered item to a fetchable source
///
/// Wiki nodes resolve through their recorded underlying object, falling back
/// to a live node lookup when the crawl did not record one. Spreadsheet,
/// base and slide objects have no Markdown rendition and are skipped.
async fn resolve_source(client: &mut ApiClient, item: &DocumentItem) -> Resolved {
    match item.kind {
        ResourceKind::DocPage => Resolved::Source(Source::Document(item.token.clone())),
        ResourceKind::WikiNode => {
            let (obj_kind, obj_token) = match (&item.obj_kind, &item.obj_token) {
                (Some(kind), Some(token)) => (kind.clone(), token.clone()),
                _ => match client.get_wiki_node(&item.token).await {
                    Ok(node) => match (node.obj_type, node.obj_token) {
                        (Some(kind), Some(token)) => (kind, token),
                        _ => {
                            return Resolved::Unsupported(
                                "wiki node has no underlying object".to_string(),
                            )
                        }
                    },
                    Err(e) => return Resolved::Failed(format!("node lookup failed: {}", e)),
                },
            };
            match obj_kind.as_str() {
                "doc" | "docx" => Resolved::Source(Source::Document(obj_token)),
                "file" => Resolved::Source(Source::File(obj_token)),
                other => Resolved::Unsupported(format!("unsupported wiki object kind: {}", other)),
            }
        }
        ResourceKind::Sheet | ResourceKind::Base | ResourceKind::Slides | ResourceKind::Unknown => {
            Resolved::Unsupported(format!("no Markdown rendition for {}", item.kind))
        }
    }
}

/// Fetches (or reuses) the Markdown body for a source
///
/// Documents whose block list renders without body content are re-rendered
/// with the raw-content text as fallback. Drive files are taken as UTF-8
/// text, lossily.
async fn fetch_body(
    client: &mut ApiClient,
    source: &Source,
    title: Option<&str>,
    cache: &mut HashMap<(&'static str, String), String>,
) -> std::result::Result<(String, String), String> {
    match source {
        Source::Document(token) => {
            let key = ("document", token.clone());
            if let Some(body) = cache.get(&key) {
                return Ok((body.clone(), "reused".to_string()));
            }

            let blocks = client
                .get_document_blocks(token)
                .await
                .map_err(|e| format!("blocks fetch failed: {}", e))?;
            let mut body = render(title, &blocks, None);

            if !has_markdown_body_content(&body) {
                match client.get_raw_content(token).await {
                    Ok(raw) => body = render(title, &blocks, Some(&raw)),
                    Err(e) => {
                        tracing::debug!("Raw content fallback failed for {}: {}", token, e);
                    }
                }
            }

            cache.insert(key, body.clone());
            Ok((body, "exported".to_string()))
        }
        Source::File(token) => {
            let key = ("file", token.clone());
            if let Some(body) = cache.get(&key) {
                return Ok((body.clone(), "reused".to_string()));
            }

            let file = client
                .download_file(token)
                .await
                .map_err(|e| format!("download failed: {}", e))?;
            let body = String::from_utf8_lossy(&file.bytes).into_owned();
            let note = match file.file_name {
                Some(name) => format!("exported file {}", name),
                None => "exported file".to_string(),
            };

            cache.insert(key, body.clone());
            Ok((body, note))
        }
    }
}

/// Removes a file left by an earlier run when its item now renders empty
async fn remove_stale(target: &Path) -> Result<()> {
    match tokio::fs::remove_file(target).await {
        Ok(()) => {
            tracing::debug!("Removed stale export {}", target.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[allow(clippy::too_many_arguments)]
fn emit(
    observer: &mut dyn ProgressObserver,
    status: ExportStatus,
    sequence: u64,
    id: &str,
    message: &str,
    target_path: Option<PathBuf>,
    summary: &ExportSummary,
) {
    observer.on_export(&ExportEvent {
        status,
        sequence,
        id: id.to_string(),
        message: message.to_string(),
        target_path,
        written: summary.written,
        skipped: summary.skipped,
        warnings: summary.warnings.len(),
    });
}
