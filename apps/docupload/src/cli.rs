use std::path::{Path, PathBuf};

use clap::Parser;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Local file to upload.
    pub file: PathBuf,

    /// Upload location: the edit-media URL of an existing document, or the
    /// resumable-create URL of the parent collection when `--title` is given.
    pub destination: String,

    /// Create a new document with this title instead of overwriting.
    #[arg(long)]
    pub title: Option<String>,

    /// Remote path reported back in the outcome. Defaults to the file name.
    #[arg(long)]
    pub remote_path: Option<PathBuf>,

    /// MIME type of the content. Guessed from the extension when omitted.
    #[arg(long)]
    pub content_type: Option<String>,

    /// Configuration file.
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

impl Args {
    pub fn remote_path(&self) -> PathBuf {
        match &self.remote_path {
            Some(p) => p.clone(),
            None => self
                .file
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_default(),
        }
    }

    pub fn content_type(&self) -> String {
        self.content_type
            .clone()
            .unwrap_or_else(|| guess_content_type(&self.file).to_string())
    }
}

fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("txt") => "text/plain",
        Some("html") | Some("htm") => "text/html",
        Some("csv") => "text/csv",
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("xls") => "application/vnd.ms-excel",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("ppt") => "application/vnd.ms-powerpoint",
        Some("odt") => "application/vnd.oasis.opendocument.text",
        _ => "application/octet-stream",
    }
}
