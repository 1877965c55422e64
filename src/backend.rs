use crate::chat::StreamDecoder;
use crate::event::AppEvent;
use futures_util::StreamExt;
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";

const CONNECTIVITY_ERROR: &str = "could not reach the backend";

/// Base address for every endpoint, from `PAGEMARK_API` when set.
pub fn api_base_from_env() -> String {
    let base = std::env::var("PAGEMARK_API").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
    normalize_base(&base)
}

fn normalize_base(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_API_BASE.to_string()
    } else {
        trimmed.to_string()
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    filename: Option<String>,
    original_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    detail: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

/// HTTP client for the document-chat backend. All requests run on the
/// tokio runtime; results cross back to the egui thread as `AppEvent`s.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base: String,
    tx: mpsc::Sender<AppEvent>,
    runtime_handle: Handle,
}

impl BackendClient {
    pub fn new(
        base: String,
        tx: mpsc::Sender<AppEvent>,
        runtime_handle: Handle,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base,
            tx,
            runtime_handle,
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn file_url(&self, stored_name: &str) -> String {
        format!("{}/files/{stored_name}", self.base)
    }

    /// Posts the file as multipart field `file`. The request races the
    /// session's cancellation token; once the token fires no event is
    /// emitted for this transfer, and any result that slipped through is
    /// dropped by the upload controller.
    pub fn upload(&self, path: PathBuf, upload_id: u64, token: CancellationToken) {
        let http = self.http.clone();
        let base = self.base.clone();
        let tx = self.tx.clone();

        self.runtime_handle.spawn(async move {
            let outcome = tokio::select! {
                outcome = Self::run_upload(&http, &base, &path) => outcome,
                _ = token.cancelled() => return,
            };

            let event = match outcome {
                Ok((stored_name, original_name)) => AppEvent::UploadSucceeded {
                    upload_id,
                    stored_name,
                    original_name,
                },
                Err(message) => AppEvent::UploadFailed { upload_id, message },
            };
            let _ = tx.send(event);
        });
    }

    async fn run_upload(
        http: &reqwest::Client,
        base: &str,
        path: &Path,
    ) -> Result<(String, String), String> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| format!("could not read {}: {err}", path.display()))?;

        let part = multipart::Part::bytes(bytes).file_name(file_name.clone());
        let form = multipart::Form::new().part("file", part);

        let response = http
            .post(format!("{base}/upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|_| CONNECTIVITY_ERROR.to_string())?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|_| CONNECTIVITY_ERROR.to_string())?;
        if !status.is_success() {
            return Err(error_detail(&body).unwrap_or_else(|| CONNECTIVITY_ERROR.to_string()));
        }

        parse_upload_payload(&body, &file_name)
    }

    /// Streams the assistant reply, forwarding each decoded chunk in
    /// arrival order.
    pub fn send_chat(&self, message: String) {
        let http = self.http.clone();
        let base = self.base.clone();
        let tx = self.tx.clone();

        self.runtime_handle.spawn(async move {
            match Self::run_chat_stream(&http, &base, &message, &tx).await {
                Ok(()) => {
                    let _ = tx.send(AppEvent::StreamEnd);
                }
                Err(message) => {
                    let _ = tx.send(AppEvent::StreamFailed(message));
                }
            }
        });
    }

    async fn run_chat_stream(
        http: &reqwest::Client,
        base: &str,
        message: &str,
        tx: &mpsc::Sender<AppEvent>,
    ) -> Result<(), String> {
        let response = http
            .post(format!("{base}/chat"))
            .json(&ChatRequest { message })
            .send()
            .await
            .map_err(|_| CONNECTIVITY_ERROR.to_string())?;
        if !response.status().is_success() {
            return Err(format!("chat returned {}", response.status()));
        }

        let mut stream = response.bytes_stream();
        let mut decoder = StreamDecoder::new();
        while let Some(item) = stream.next().await {
            let chunk = item.map_err(|err| format!("stream read failed: {err}"))?;
            let text = decoder.push(&chunk);
            if !text.is_empty() {
                let _ = tx.send(AppEvent::StreamDelta(text));
            }
        }

        let tail = decoder.finish();
        if !tail.is_empty() {
            let _ = tx.send(AppEvent::StreamDelta(tail));
        }
        Ok(())
    }

    /// Fetches the stored document and extracts per-page text off the
    /// async threads.
    pub fn fetch_document_pages(&self, url: String) {
        let http = self.http.clone();
        let tx = self.tx.clone();

        self.runtime_handle.spawn(async move {
            match Self::run_page_extraction(&http, &url).await {
                Ok(pages) => {
                    let _ = tx.send(AppEvent::DocumentPagesLoaded { url, pages });
                }
                Err(message) => {
                    let _ = tx.send(AppEvent::DocumentPagesFailed { url, message });
                }
            }
        });
    }

    async fn run_page_extraction(
        http: &reqwest::Client,
        url: &str,
    ) -> Result<Vec<String>, String> {
        let response = http
            .get(url)
            .send()
            .await
            .map_err(|_| CONNECTIVITY_ERROR.to_string())?;
        if !response.status().is_success() {
            return Err(format!("document fetch returned {}", response.status()));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|_| CONNECTIVITY_ERROR.to_string())?;

        let pages = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem_by_pages(&bytes)
        })
        .await
        .map_err(|err| format!("page extraction task failed: {err}"))?
        .map_err(|err| format!("could not extract page text: {err}"))?;

        if pages.is_empty() {
            return Err("document has no extractable pages".to_string());
        }
        Ok(pages)
    }
}

fn error_detail(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorResponse>(body).ok()?.detail
}

/// A 2xx body must carry the server-assigned `filename`; a success
/// response without it is reported like a transport failure.
fn parse_upload_payload(body: &str, fallback_name: &str) -> Result<(String, String), String> {
    let payload: UploadResponse = serde_json::from_str(body)
        .map_err(|_| "upload response was not valid JSON".to_string())?;
    let stored_name = payload
        .filename
        .filter(|name| !name.is_empty())
        .ok_or_else(|| "upload response missing filename".to_string())?;
    let original_name = payload
        .original_name
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| fallback_name.to_string());
    Ok((stored_name, original_name))
}
