use std::sync::Arc;

use anyhow::{Context, bail};
use docupload_remote::{ClientOptions, HttpUploadService};
use docupload_uploader::{
    FileChunkSource, SessionId, UploadEngine, UploadEvent, UploadOutcome, UploadRequest,
};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{mpsc, oneshot};

use crate::cli::Args;
use crate::config::Config;

/// Uploads a single file and waits for its outcome.
pub async fn run(config: Config, args: Args) -> anyhow::Result<()> {
    let service = HttpUploadService::new(ClientOptions {
        access_token: config.remote.access_token.clone(),
        timeout: Some(config.remote.timeout()),
    })?;

    let mut engine = UploadEngine::with_config(
        Arc::new(service),
        Arc::new(FileChunkSource::new()),
        config.engine.clone(),
    )?;
    let events = engine.take_events().context("event receiver already taken")?;

    // A missing file is reported by the engine itself, so the length only
    // needs to be right when the file is there.
    let content_length = std::fs::metadata(&args.file).map(|m| m.len()).unwrap_or(0);
    let remote_path = args.remote_path();
    let content_type = args.content_type();

    let request = match &args.title {
        Some(title) => UploadRequest::new_file(
            args.destination.clone(),
            remote_path,
            args.file.clone(),
            title.clone(),
            content_type,
            content_length,
            content_length,
        ),
        None => UploadRequest::existing_file(
            args.destination.clone(),
            remote_path,
            args.file.clone(),
            content_type,
            content_length,
        ),
    };

    let bar = progress_bar(content_length);
    let reporter = tokio::spawn(report_events(events, bar.clone()));

    let (done_tx, mut done_rx) = oneshot::channel::<UploadOutcome>();
    let on_ready = Box::new(|id: SessionId| {
        tracing::debug!(session = %id, "upload session ready");
    });
    let session = engine.upload(
        request,
        Box::new(move |outcome| {
            let _ = done_tx.send(outcome);
        }),
        Some(on_ready),
    );

    let outcome = match session {
        None => done_rx.await?,
        Some(id) => {
            tokio::select! {
                outcome = &mut done_rx => outcome?,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!(session = %id, "SIGINT received, cancelling upload");
                    engine.cancel(id);
                    done_rx.await?
                }
            }
        }
    };

    // A cancelled session may still hold an event sender until its in-flight
    // request returns.
    reporter.abort();

    match (outcome.error, outcome.document) {
        (None, Some(document)) => {
            bar.finish_with_message("done");
            println!(
                "{} -> {} ({})",
                outcome.local_file_path.display(),
                outcome.remote_destination_path.display(),
                document.id
            );
            Ok(())
        }
        (Some(error), _) => {
            bar.abandon_with_message(error.to_string());
            bail!(
                "upload of {} failed: {error}",
                outcome.local_file_path.display()
            )
        }
        (None, None) => bail!("upload finished without a document entry"),
    }
}

fn progress_bar(len: u64) -> ProgressBar {
    let style = ProgressStyle::with_template(
        "{spinner:.dim} [{bar:30}] {bytes}/{total_bytes} ({elapsed}/{eta}) {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ");
    ProgressBar::new(len).with_style(style)
}

/// Drives the progress bar until the engine drops its event sender.
async fn report_events(mut events: mpsc::Receiver<UploadEvent>, bar: ProgressBar) {
    while let Some(event) = events.recv().await {
        match event {
            UploadEvent::Ready { .. } => bar.set_message("transferring"),
            UploadEvent::Progress { bytes_sent, .. } => bar.set_position(bytes_sent),
            UploadEvent::Completed { document_id, .. } => {
                bar.set_position(bar.length().unwrap_or(0));
                bar.set_message(format!("done: {document_id}"));
            }
            UploadEvent::Failed { error, .. } => bar.set_message(format!("failed: {error}")),
            UploadEvent::Cancelled { .. } => bar.set_message("cancelled"),
        }
    }
}
