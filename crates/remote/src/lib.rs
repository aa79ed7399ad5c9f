//! HTTP adapter for GData-style resumable document uploads.
//!
//! Implements [`RemoteUploadService`](docupload_uploader::RemoteUploadService)
//! on top of `reqwest`: the initiate call returns the session URL in a
//! `Location` header, chunks are `PUT` with `Content-Range`, and the service
//! answers `308 Resume Incomplete` until the final chunk.

pub mod client;

pub use client::{ClientOptions, Error, HttpUploadService};
