//! HTTP transport built on `reqwest`.

use futures_util::StreamExt;
use tracing::{debug, trace};

use crate::{
    decode::Utf8Decoder,
    error::EventSourceResult,
    transport::{AbortHandle, ResponseHead, Transport, TransportRequest, TransportSink},
};

/// Streams the event source over HTTP.
///
/// Holds two clients: one with a cookie store for requests made with
/// credentials and one without for everything else. Each attempt runs on its
/// own tokio task; aborting the attempt cancels that task and drops the
/// connection.
///
/// The body is read no faster than the engine takes decoded chunks, so a
/// slow listener slows the socket instead of growing a buffer.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    credentialed: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with default clients.
    ///
    /// # Errors
    ///
    /// Returns an error if a client cannot be built (e.g. no TLS backend).
    pub fn new() -> EventSourceResult<Self> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            credentialed: reqwest::Client::builder().cookie_store(true).build()?,
        })
    }

    /// Use caller-supplied clients, e.g. with proxies or custom TLS.
    pub fn with_clients(client: reqwest::Client, credentialed: reqwest::Client) -> Self {
        Self {
            client,
            credentialed,
        }
    }
}

impl Transport for HttpTransport {
    fn open(&self, request: TransportRequest, sink: TransportSink) -> Box<dyn AbortHandle> {
        let client = if request.with_credentials {
            self.credentialed.clone()
        } else {
            self.client.clone()
        };
        let task = tokio::spawn(stream_response(client, request, sink));
        Box::new(task.abort_handle())
    }
}

async fn stream_response(client: reqwest::Client, request: TransportRequest, sink: TransportSink) {
    let generation = sink.generation();
    let mut builder = client.get(&request.url);
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    debug!(url = %request.url, generation, "Sending event stream request");
    let response = match builder.send().await {
        Ok(response) => response,
        Err(e) => {
            sink.finish(Some(e.into())).await;
            return;
        }
    };

    sink.start(ResponseHead::new(response.status(), response.headers().clone()))
        .await;

    let mut decoder = Utf8Decoder::new();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => {
                trace!(generation, len = bytes.len(), "Received body chunk");
                // Waits while the engine's queue is full.
                sink.progress(decoder.decode(&bytes)).await;
            }
            Err(e) => {
                sink.finish(Some(e.into())).await;
                return;
            }
        }
        if sink.is_closed() {
            return;
        }
    }

    sink.progress(decoder.flush()).await;
    debug!(url = %request.url, generation, "Event stream body ended");
    sink.finish(None).await;
}
