//! Resumable upload HTTP client.
//!
//! Async HTTP client using `reqwest` with optional Bearer token authentication.

use std::time::Duration;

use docupload_uploader::{
    DocumentEntry, InitiateUploadParams, RemoteUploadService, ResumeUploadParams,
    ResumeUploadResponse, ServiceError, ServiceFuture, UploadMode,
};
use reqwest::StatusCode;
use reqwest::header::{
    AUTHORIZATION, CONTENT_RANGE, CONTENT_TYPE, HeaderMap, HeaderValue, IF_MATCH, LOCATION, RANGE,
};
use serde::Deserialize;
use tracing::debug;

/// Status the service uses to ask for the next chunk.
const RESUME_INCOMPLETE: StatusCode = StatusCode::PERMANENT_REDIRECT;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors building the client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid access token")]
    InvalidToken,
}

/// Options for [`HttpUploadService::new`].
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Sent as `Authorization: Bearer <token>` when set.
    pub access_token: Option<String>,
    /// Per-request timeout; 60 s when `None`.
    pub timeout: Option<Duration>,
}

/// [`RemoteUploadService`] speaking the resumable upload protocol over HTTP.
pub struct HttpUploadService {
    http: reqwest::Client,
}

impl HttpUploadService {
    pub fn new(options: ClientOptions) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &options.access_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|_| Error::InvalidToken)?,
            );
        }

        // 308 is a protocol answer here, never a redirect to follow.
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(options.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;

        Ok(Self { http })
    }

    async fn initiate(&self, params: InitiateUploadParams) -> Result<String, ServiceError> {
        let builder = match params.mode {
            UploadMode::NewFile => {
                let body = serde_json::json!({ "title": params.title.unwrap_or_default() });
                self.http
                    .post(&params.upload_location)
                    .header(CONTENT_TYPE, "application/json")
                    .body(body.to_string())
            }
            UploadMode::ExistingFile => self
                .http
                .put(&params.upload_location)
                .header(IF_MATCH, "*")
                .body(Vec::<u8>::new()),
        };

        let resp = builder
            .header("X-Upload-Content-Type", &params.content_type)
            .header("X-Upload-Content-Length", params.content_length)
            .send()
            .await
            .map_err(no_connection)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(http_error(resp).await);
        }

        let location = resp
            .headers()
            .get(LOCATION)
            .ok_or_else(|| ServiceError::MalformedResponse("missing Location header".into()))?;
        let location = location
            .to_str()
            .map_err(|e| ServiceError::MalformedResponse(format!("bad Location header: {e}")))?;

        debug!(status = status.as_u16(), location, "initiate upload accepted");
        Ok(location.to_string())
    }

    async fn resume(
        &self,
        params: ResumeUploadParams,
    ) -> Result<ResumeUploadResponse, ServiceError> {
        let content_range = content_range(&params);
        let resp = self
            .http
            .put(&params.upload_location)
            .header(CONTENT_TYPE, &params.content_type)
            .header(CONTENT_RANGE, &content_range)
            .body(params.data)
            .send()
            .await
            .map_err(no_connection)?;

        let status = resp.status();
        if status == RESUME_INCOMPLETE {
            // No Range header means nothing was persisted yet.
            let next_offset = match resp.headers().get(RANGE) {
                None => 0,
                Some(value) => value
                    .to_str()
                    .ok()
                    .and_then(parse_range_header)
                    .ok_or_else(|| {
                        ServiceError::MalformedResponse(format!("bad Range header: {value:?}"))
                    })?,
            };
            debug!(content_range = %content_range, next_offset, "resume incomplete");
            return Ok(ResumeUploadResponse::Incomplete { next_offset });
        }

        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(http_error(resp).await);
        }

        let body = resp.bytes().await.map_err(no_connection)?;
        let entry = parse_entry(&body)?;
        debug!(status = status.as_u16(), document = %entry.id, "upload finalized");
        Ok(ResumeUploadResponse::Complete(entry))
    }
}

impl RemoteUploadService for HttpUploadService {
    fn initiate_upload(&self, params: InitiateUploadParams) -> ServiceFuture<'_, String> {
        Box::pin(self.initiate(params))
    }

    fn resume_upload(
        &self,
        params: ResumeUploadParams,
    ) -> ServiceFuture<'_, ResumeUploadResponse> {
        Box::pin(self.resume(params))
    }
}

/// `bytes start-last/total`, or `bytes */0` for the empty terminal chunk.
fn content_range(params: &ResumeUploadParams) -> String {
    match params.range.last() {
        Some(last) => format!(
            "bytes {}-{}/{}",
            params.range.start(), last, params.content_length
        ),
        None => format!("bytes */{}", params.content_length),
    }
}

/// Parses `bytes=0-N` into the next expected offset `N + 1`.
fn parse_range_header(value: &str) -> Option<u64> {
    let range = value.trim().strip_prefix("bytes=")?;
    let (start, end) = range.split_once('-')?;
    if start.trim() != "0" {
        return None;
    }
    end.trim().parse::<u64>().ok()?.checked_add(1)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EntryBody {
    Wrapped { entry: DocumentEntry },
    Bare(DocumentEntry),
}

fn parse_entry(body: &[u8]) -> Result<DocumentEntry, ServiceError> {
    let parsed: EntryBody = serde_json::from_slice(body)
        .map_err(|e| ServiceError::MalformedResponse(format!("document entry: {e}")))?;
    Ok(match parsed {
        EntryBody::Wrapped { entry } => entry,
        EntryBody::Bare(entry) => entry,
    })
}

fn no_connection(e: reqwest::Error) -> ServiceError {
    ServiceError::NoConnection(e.to_string())
}

async fn http_error(resp: reqwest::Response) -> ServiceError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    ServiceError::Http { status, body }
}
