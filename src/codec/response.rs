//! Response parsing and body framing.
//!
//! # Responsibilities
//! - Incrementally parse the response head from a retained read buffer
//! - Select body framing: none, `Content-Length`, chunked, or read-to-EOF
//! - Fully drain the body before returning, so the byte stream stays
//!   synchronized for the next pipelined response
//!
//! The read buffer outlives a single call: leftover bytes after one
//! response are the first bytes of the next one on the same connection.

use bytes::{Buf, Bytes, BytesMut};
use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, Method, StatusCode, Version};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::codec::options::ConnectionOptions;
use crate::error::Error;
use crate::response::Response;

/// Upper bound on the response head (status line + headers).
const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Maximum number of headers accepted in one response.
const MAX_HEADERS: usize = 64;

/// Read one complete response from `io`.
///
/// `request_method` decides HEAD semantics for body framing. Returns the
/// response and whether the connection must be retired after it (peer
/// sent `Connection: close`, the body ran to end-of-stream, a protocol
/// switch started, or the peer speaks HTTP/1.0 without keep-alive).
pub async fn read_response<R>(
    io: &mut R,
    buf: &mut BytesMut,
    request_method: &Method,
) -> Result<(Response, bool), Error>
where
    R: AsyncRead + Unpin,
{
    let (head_len, status, version, headers) = parse_head(io, buf).await?;
    buf.advance(head_len);

    let options = ConnectionOptions::parse(&headers);

    let no_body = *request_method == Method::HEAD
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED;

    let (body, eof_delimited) = if no_body {
        (Bytes::new(), false)
    } else if is_chunked(&headers) {
        (read_chunked_body(io, buf).await?, false)
    } else if let Some(length) = content_length(&headers)? {
        (read_sized_body(io, buf, length).await?, false)
    } else {
        // No framing headers at all: the body runs until the peer
        // closes, which also retires the connection.
        (read_body_to_eof(io, buf).await?, true)
    };

    let must_close = options.close
        || eof_delimited
        || status == StatusCode::SWITCHING_PROTOCOLS
        || (version == Version::HTTP_10 && !options.keep_alive);

    let response = Response {
        status,
        version,
        headers,
        body,
    };
    Ok((response, must_close))
}

/// Parse the head, reading more bytes until it is complete.
async fn parse_head<R>(
    io: &mut R,
    buf: &mut BytesMut,
) -> Result<(usize, StatusCode, Version, HeaderMap), Error>
where
    R: AsyncRead + Unpin,
{
    loop {
        let mut header_storage = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Response::new(&mut header_storage);

        match parsed.parse(&buf[..]) {
            Ok(httparse::Status::Complete(head_len)) => {
                let status = StatusCode::from_u16(parsed.code.unwrap_or(0))
                    .map_err(|_| Error::Protocol("invalid status code".into()))?;
                let version = match parsed.version {
                    Some(0) => Version::HTTP_10,
                    _ => Version::HTTP_11,
                };

                let mut headers = HeaderMap::with_capacity(parsed.headers.len());
                for header in parsed.headers.iter() {
                    let name = HeaderName::from_bytes(header.name.as_bytes())
                        .map_err(|_| Error::Protocol(format!("bad header name {:?}", header.name)))?;
                    let value = HeaderValue::from_bytes(header.value)
                        .map_err(|_| Error::Protocol("bad header value".into()))?;
                    headers.append(name, value);
                }

                return Ok((head_len, status, version, headers));
            }
            Ok(httparse::Status::Partial) => {
                if buf.len() > MAX_HEAD_SIZE {
                    return Err(Error::Protocol("response head too large".into()));
                }
                let empty_before = buf.is_empty();
                if fill(io, buf).await? == 0 {
                    // Clean close between responses vs. truncated head.
                    return if empty_before {
                        Err(Error::ConnectionClosed)
                    } else {
                        Err(Error::Protocol("unexpected EOF in response head".into()))
                    };
                }
            }
            Err(e) => return Err(Error::Protocol(format!("malformed response head: {}", e))),
        }
    }
}

fn is_chunked(headers: &HeaderMap) -> bool {
    headers
        .get_all(TRANSFER_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("chunked"))
}

fn content_length(headers: &HeaderMap) -> Result<Option<u64>, Error> {
    let Some(value) = headers.get(CONTENT_LENGTH) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Some)
        .ok_or_else(|| Error::Protocol("invalid Content-Length".into()))
}

/// Read more bytes into the buffer. Returns 0 on end-of-stream.
async fn fill<R>(io: &mut R, buf: &mut BytesMut) -> Result<usize, Error>
where
    R: AsyncRead + Unpin,
{
    io.read_buf(buf).await.map_err(Error::Read)
}

async fn read_sized_body<R>(io: &mut R, buf: &mut BytesMut, length: u64) -> Result<Bytes, Error>
where
    R: AsyncRead + Unpin,
{
    let length = usize::try_from(length)
        .map_err(|_| Error::Protocol("Content-Length too large".into()))?;

    while buf.len() < length {
        if fill(io, buf).await? == 0 {
            return Err(Error::Protocol("unexpected EOF in response body".into()));
        }
    }
    Ok(buf.split_to(length).freeze())
}

async fn read_body_to_eof<R>(io: &mut R, buf: &mut BytesMut) -> Result<Bytes, Error>
where
    R: AsyncRead + Unpin,
{
    while fill(io, buf).await? > 0 {}
    Ok(buf.split().freeze())
}

/// Read one CRLF-terminated line, returned without the terminator.
async fn read_line<R>(io: &mut R, buf: &mut BytesMut) -> Result<Bytes, Error>
where
    R: AsyncRead + Unpin,
{
    let mut searched = 0;
    loop {
        if let Some(pos) = buf[searched..].iter().position(|&b| b == b'\n') {
            let mut line = buf.split_to(searched + pos + 1);
            line.truncate(line.len() - 1);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            return Ok(line.freeze());
        }
        searched = buf.len();
        if searched > MAX_HEAD_SIZE {
            return Err(Error::Protocol("chunk size line too long".into()));
        }
        if fill(io, buf).await? == 0 {
            return Err(Error::Protocol("unexpected EOF in chunked body".into()));
        }
    }
}

async fn read_chunked_body<R>(io: &mut R, buf: &mut BytesMut) -> Result<Bytes, Error>
where
    R: AsyncRead + Unpin,
{
    let mut body = BytesMut::new();

    loop {
        let line = read_line(io, buf).await?;
        let size_text = line
            .split(|&b| b == b';')
            .next()
            .unwrap_or(&[]);
        let size_text = std::str::from_utf8(size_text)
            .map_err(|_| Error::Protocol("invalid chunk size".into()))?
            .trim();
        let size = usize::from_str_radix(size_text, 16)
            .map_err(|_| Error::Protocol("invalid chunk size".into()))?;

        if size == 0 {
            // Trailer section: discard header lines up to the blank one.
            loop {
                let trailer = read_line(io, buf).await?;
                if trailer.is_empty() {
                    return Ok(body.freeze());
                }
            }
        }

        let chunk = read_sized_body(io, buf, size as u64).await?;
        body.extend_from_slice(&chunk);

        let delimiter = read_line(io, buf).await?;
        if !delimiter.is_empty() {
            return Err(Error::Protocol("missing CRLF after chunk".into()));
        }
    }
}
