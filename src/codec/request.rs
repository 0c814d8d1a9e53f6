//! Request serialization.
//!
//! # Responsibilities
//! - Build the request head (request line + headers) as bytes
//! - Synthesize a `Host` header from the destination when absent
//! - Frame the body with `Content-Length` or chunked transfer-coding
//!
//! The head and body are serialized into one buffer and written with a
//! single `write_all`, then flushed, so a pipelined peer observes whole
//! requests in write order.

use bytes::{BufMut, BytesMut};
use http::header::{CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::Error;
use crate::request::{Request, RequestBody};

/// Whether the caller explicitly asked for chunked transfer-coding.
fn wants_chunked(request: &Request) -> bool {
    request
        .headers
        .get_all(TRANSFER_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("chunked"))
}

/// Write a header name in canonical `Title-Case` form. `HeaderName`
/// stores names lowercased; the synthesized headers are emitted in the
/// same form, so the whole head is cased consistently.
fn put_header_name(buf: &mut BytesMut, name: &str) {
    let mut at_word_start = true;
    for &byte in name.as_bytes() {
        buf.put_u8(if at_word_start {
            byte.to_ascii_uppercase()
        } else {
            byte
        });
        at_word_start = byte == b'-';
    }
}

/// Serialize `request` onto `io` and flush.
///
/// `authority` is the destination in `host` or `host:port` form, used
/// for the synthesized `Host` header.
pub async fn write_request<W>(io: &mut W, request: &Request, authority: &str) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    let chunked = wants_chunked(request);
    let mut buf = BytesMut::with_capacity(256);

    let target = if request.target.is_empty() {
        "/"
    } else {
        request.target.as_str()
    };
    buf.put_slice(request.method.as_str().as_bytes());
    buf.put_u8(b' ');
    buf.put_slice(target.as_bytes());
    buf.put_slice(b" HTTP/1.1\r\n");

    if !request.headers.contains_key(HOST) {
        buf.put_slice(b"Host: ");
        buf.put_slice(authority.as_bytes());
        buf.put_slice(b"\r\n");
    }

    // Framing headers are emitted below from the body itself.
    for (name, value) in request.headers.iter() {
        if name == CONTENT_LENGTH {
            continue;
        }
        put_header_name(&mut buf, name.as_str());
        buf.put_slice(b": ");
        buf.put_slice(value.as_bytes());
        buf.put_slice(b"\r\n");
    }

    if !chunked {
        if let RequestBody::Full(bytes) = &request.body {
            buf.put_slice(b"Content-Length: ");
            buf.put_slice(bytes.len().to_string().as_bytes());
            buf.put_slice(b"\r\n");
        }
    }

    buf.put_slice(b"\r\n");

    match &request.body {
        RequestBody::Empty => {}
        RequestBody::Full(bytes) => {
            if chunked {
                if !bytes.is_empty() {
                    buf.put_slice(format!("{:x}\r\n", bytes.len()).as_bytes());
                    buf.put_slice(bytes);
                    buf.put_slice(b"\r\n");
                }
                buf.put_slice(b"0\r\n\r\n");
            } else {
                buf.put_slice(bytes);
            }
        }
    }

    io.write_all(&buf).await.map_err(Error::Write)?;
    io.flush().await.map_err(Error::Write)?;
    Ok(())
}
