use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use automation_model::WorkspaceVariable;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::StreamApiConfig;
use crate::error::{parse_error_message, StreamApiError};
use crate::frames::StreamFrame;
use crate::headers::{build_headers, ACCEPT_JSON, ACCEPT_NDJSON};
use crate::ndjson::FrameDecoder;
use crate::payload::{ChatRequest, CommitPayload, CommitReceipt, CommitResponse};
use crate::url::{chat_endpoint, commit_endpoint, normalize_base_url, workspace_variables_endpoint};

/// Optional cancellation signal shared across request and stream loops.
pub type CancellationSignal = Arc<AtomicBool>;

/// Raw response body chunks of an open chat stream.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, StreamApiError>>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub struct AutomationApiClient {
    http: Client,
    config: StreamApiConfig,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VariablesBody {
    List(Vec<WorkspaceVariable>),
    Wrapped { variables: Vec<WorkspaceVariable> },
}

impl AutomationApiClient {
    pub fn new(config: StreamApiConfig) -> Result<Self, StreamApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(StreamApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &StreamApiConfig {
        &self.config
    }

    pub fn base_url(&self) -> String {
        normalize_base_url(&self.config.base_url)
    }

    pub fn header_map(&self, accept: &str) -> Result<HeaderMap, StreamApiError> {
        let mut out = HeaderMap::new();
        for (key, value) in build_headers(&self.config, accept) {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| StreamApiError::InvalidHeader(format!("key {key}")))?,
                HeaderValue::from_str(&value)
                    .map_err(|_| StreamApiError::InvalidHeader(format!("value for {key}")))?,
            );
        }
        Ok(out)
    }

    /// Builds the chat request; attachments switch the body to multipart.
    pub fn build_chat_request(&self, request: &ChatRequest) -> Result<RequestBuilder, StreamApiError> {
        let builder = self
            .http
            .post(chat_endpoint(&self.config.base_url))
            .headers(self.header_map(ACCEPT_NDJSON)?);

        if !request.has_attachments() {
            return Ok(builder.json(request));
        }

        let mut form = Form::new();
        for (name, value) in request.form_fields() {
            form = form.text(name, value);
        }
        for image in &request.images {
            let part = Part::bytes(image.bytes.clone())
                .file_name(image.file_name.clone())
                .mime_str(&image.mime_type)?;
            form = form.part("images[]", part);
        }
        Ok(builder.multipart(form))
    }

    /// Opens the chat stream, polling while the backend answers `429`.
    pub async fn open_chat_stream(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, StreamApiError> {
        let limit = self.config.busy_retry_limit.max(1);

        for attempt in 1..=limit {
            if is_cancelled(cancellation) {
                return Err(StreamApiError::Cancelled);
            }

            let response = self.build_chat_request(request)?.send();
            let response = await_or_cancel(response, cancellation).await??;
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            let body = await_or_cancel(response.text(), cancellation)
                .await?
                .unwrap_or_default();

            match status {
                StatusCode::TOO_MANY_REQUESTS => {
                    debug!(attempt, limit, "chat endpoint busy, polling again");
                    if attempt < limit {
                        await_or_cancel(
                            tokio::time::sleep(self.config.busy_retry_interval),
                            cancellation,
                        )
                        .await?;
                    }
                }
                StatusCode::BAD_REQUEST => {
                    return Err(StreamApiError::BadRequest {
                        message: parse_error_message(status, &body),
                    });
                }
                StatusCode::FORBIDDEN => {
                    let payload = serde_json::from_str::<Value>(&body).unwrap_or(Value::Null);
                    return Err(StreamApiError::QuotaExceeded {
                        message: parse_error_message(status, &body),
                        payload,
                    });
                }
                _ => {
                    return Err(StreamApiError::Status {
                        status,
                        message: parse_error_message(status, &body),
                    });
                }
            }
        }

        warn!(attempts = limit, "chat endpoint stayed busy");
        Err(StreamApiError::ServerBusy { attempts: limit })
    }

    /// Opens the chat stream and exposes the body as owned byte chunks.
    pub async fn open_byte_stream(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<ByteStream, StreamApiError> {
        let response = self.open_chat_stream(request, cancellation).await?;
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(StreamApiError::from))
            .boxed())
    }

    /// Decodes the chat stream and hands every frame to `on_frame`.
    ///
    /// An `error` frame ends the stream with [`StreamApiError::StreamFailed`].
    pub async fn stream_frames<F>(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
        mut on_frame: F,
    ) -> Result<(), StreamApiError>
    where
        F: FnMut(StreamFrame),
    {
        let mut bytes = self.open_byte_stream(request, cancellation).await?;
        let mut decoder = FrameDecoder::default();

        loop {
            let Some(chunk) = await_or_cancel(bytes.next(), cancellation).await? else {
                break;
            };
            if is_cancelled(cancellation) {
                return Err(StreamApiError::Cancelled);
            }
            for frame in decoder.feed(&chunk?) {
                process_frame(frame, &mut on_frame)?;
            }
        }

        for frame in decoder.finish() {
            process_frame(frame, &mut on_frame)?;
        }

        if is_cancelled(cancellation) {
            return Err(StreamApiError::Cancelled);
        }
        Ok(())
    }

    /// Single commit attempt; retry policy belongs to the caller.
    pub async fn commit(&self, payload: &CommitPayload) -> Result<CommitReceipt, StreamApiError> {
        let response = self
            .http
            .post(commit_endpoint(&self.config.base_url, &payload.automation_id))
            .headers(self.header_map(ACCEPT_JSON)?)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(StreamApiError::Status {
                status,
                message: parse_error_message(status, &body),
            });
        }

        let parsed = if body.trim().is_empty() {
            CommitResponse::default()
        } else {
            serde_json::from_str::<CommitResponse>(&body)?
        };

        if let Some(message) = parsed.error.filter(|message| !message.trim().is_empty()) {
            return Err(StreamApiError::CommitRejected { message });
        }
        if parsed.success == Some(false) {
            return Err(StreamApiError::CommitRejected {
                message: "commit was not accepted".to_owned(),
            });
        }

        Ok(CommitReceipt {
            version: parsed.version,
        })
    }

    pub async fn fetch_workspace_variables(&self) -> Result<Vec<WorkspaceVariable>, StreamApiError> {
        let response = self
            .http
            .get(workspace_variables_endpoint(&self.config.base_url))
            .headers(self.header_map(ACCEPT_JSON)?)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(StreamApiError::Status {
                status,
                message: parse_error_message(status, &body),
            });
        }

        Ok(match serde_json::from_str::<VariablesBody>(&body)? {
            VariablesBody::List(variables) | VariablesBody::Wrapped { variables } => variables,
        })
    }
}

fn process_frame<F>(frame: StreamFrame, on_frame: &mut F) -> Result<(), StreamApiError>
where
    F: FnMut(StreamFrame),
{
    if let StreamFrame::Error { message } = &frame {
        return Err(StreamApiError::StreamFailed {
            message: message.clone(),
        });
    }
    on_frame(frame);
    Ok(())
}

pub fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

/// Races `future` against the cancellation flag, polling the flag every 25 ms.
pub async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, StreamApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(StreamApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(StreamApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}
