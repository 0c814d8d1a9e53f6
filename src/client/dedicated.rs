//! Dedicated (non-pipelined) request execution.
//!
//! # Responsibilities
//! - Serve requests that must not share a connection: non-safe methods,
//!   `Connection: close`, `Upgrade`, or `pipelining = false`
//! - Open a connection, run the single exchange, close the socket
//!
//! Dedicated connections consume a global connection slot like pooled
//! ones, but live outside the per-route pool and its ceiling.

use std::sync::Arc;

use bytes::BytesMut;

use crate::client::endpoint::Endpoint;
use crate::client::task::RequestTask;
use crate::codec;
use crate::error::Error;
use crate::net::connect_with_retries;
use crate::observability::metrics;
use crate::request::Request;
use crate::response::Response;

/// Run `task` on its own one-shot connection.
pub(crate) fn spawn(endpoint: Arc<Endpoint>, task: RequestTask) {
    tokio::spawn(async move {
        let slot = endpoint.limiter.acquire().await;

        match exchange(&endpoint, &task.request).await {
            Ok(response) => {
                metrics::request_completed(&endpoint.authority);
                task.complete(response);
            }
            Err(error) => {
                tracing::debug!(
                    authority = %endpoint.authority,
                    error = %error,
                    "dedicated request failed"
                );
                metrics::request_failed(&endpoint.authority);
                task.fail(error);
            }
        }

        drop(slot);
    });
}

async fn exchange(endpoint: &Endpoint, request: &Request) -> Result<Response, Error> {
    let ep_config = &endpoint.config.endpoint;
    let mut stream = connect_with_retries(
        &endpoint.destination.host,
        endpoint.destination.port,
        ep_config.connect_timeout(),
        ep_config.connect_attempts,
    )
    .await?;

    metrics::connection_opened(&endpoint.authority);
    tracing::debug!(authority = %endpoint.authority, "dedicated connection opened");

    let result = async {
        codec::write_request(&mut stream, request, &endpoint.authority).await?;
        let mut buf = BytesMut::with_capacity(8 * 1024);
        let (response, _must_close) =
            codec::read_response(&mut stream, &mut buf, &request.method).await?;
        Ok(response)
    }
    .await;

    // The socket closes on drop regardless of outcome.
    metrics::connection_closed(&endpoint.authority);
    result
}
