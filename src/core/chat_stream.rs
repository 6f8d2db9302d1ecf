use std::time::Duration;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::error::GatewayError;
use crate::core::frame::FrameDecoder;
use crate::core::message::Message;
use crate::core::protocol::{BackendConfig, HttpRequest};

/// What a caller sees for one turn, tagged with the session id on the channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamMessage {
    Chunk(String),
    Error(String),
    End,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Cancelled,
}

/// Sends one shaped request, turning a non-2xx status into [`GatewayError::Http`].
pub(crate) async fn send_request(
    client: &reqwest::Client,
    request: HttpRequest,
) -> Result<reqwest::Response, GatewayError> {
    // the gemini URL carries the key, so only the path is logged
    debug!(
        path = request.url.split('?').next().unwrap_or_default(),
        "Dispatching request"
    );
    let response = request.into_builder(client).send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());
    Err(GatewayError::Http {
        status: status.as_u16(),
        body,
    })
}

pub struct StreamParams<'a> {
    pub client: &'a reqwest::Client,
    pub backend: &'a BackendConfig,
    pub messages: &'a [Message],
    pub cancel_token: &'a CancellationToken,
    pub idle_timeout: Option<Duration>,
}

/// Streams one completion, handing every non-empty text delta to `on_delta` in
/// arrival order.
///
/// Cancellation is checked before the request and before each body read and is
/// reported as [`StreamOutcome::Cancelled`], never as an error. Frames that do not
/// parse are dropped.
pub async fn stream_completion(
    params: StreamParams<'_>,
    mut on_delta: impl FnMut(&str),
) -> Result<StreamOutcome, GatewayError> {
    let StreamParams {
        client,
        backend,
        messages,
        cancel_token,
        idle_timeout,
    } = params;

    let request = backend.protocol.build_stream_request(backend, messages)?;
    let response = tokio::select! {
        biased;
        _ = cancel_token.cancelled() => return Ok(StreamOutcome::Cancelled),
        response = send_request(client, request) => response?,
    };

    let mut stream = response.bytes_stream();
    let mut decoder = FrameDecoder::new();
    let mut received_bytes = false;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                debug!(protocol = %backend.protocol, "Stream cancelled");
                return Ok(StreamOutcome::Cancelled);
            }
            next = next_chunk(&mut stream, idle_timeout) => next?,
        };
        let Some(chunk) = next else {
            break;
        };
        let chunk = chunk?;
        received_bytes |= !chunk.is_empty();

        for frame in decoder.push(&chunk) {
            emit_delta(backend, &frame, &mut on_delta);
        }
        if decoder.is_done() {
            return Ok(StreamOutcome::Completed);
        }
    }

    if !received_bytes {
        return Err(GatewayError::MissingBody);
    }
    if let Some(frame) = decoder.finish() {
        emit_delta(backend, &frame, &mut on_delta);
    }
    Ok(StreamOutcome::Completed)
}

async fn next_chunk<S>(
    stream: &mut S,
    idle_timeout: Option<Duration>,
) -> Result<Option<S::Item>, GatewayError>
where
    S: futures_util::Stream + Unpin,
{
    match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, stream.next())
            .await
            .map_err(|_| GatewayError::IdleTimeout(limit)),
        None => Ok(stream.next().await),
    }
}

fn emit_delta(backend: &BackendConfig, frame: &str, on_delta: &mut impl FnMut(&str)) {
    match backend.protocol.extract_delta(frame) {
        Some(delta) => on_delta(&delta),
        None => debug!(protocol = %backend.protocol, "Frame carried no text"),
    }
}
