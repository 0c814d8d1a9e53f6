//! `Connection` header semantics.
//!
//! # Responsibilities
//! - Extract keep-alive / close / upgrade intent from response and
//!   request headers
//!
//! The header value is a comma-separated, case-insensitive token list
//! (`Connection: keep-alive, Upgrade`). Unknown tokens are ignored.

use http::header::{HeaderMap, CONNECTION};

/// Parsed `Connection` header options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Peer asked for the connection to close after this message.
    pub close: bool,
    /// Peer explicitly asked to keep the connection open.
    pub keep_alive: bool,
    /// The message participates in a protocol upgrade.
    pub upgrade: bool,
}

impl ConnectionOptions {
    /// Parse every `Connection` header value in `headers`.
    pub fn parse(headers: &HeaderMap) -> Self {
        let mut options = Self::default();

        for value in headers.get_all(CONNECTION) {
            let Ok(value) = value.to_str() else { continue };
            for token in value.split(',') {
                let token = token.trim();
                if token.eq_ignore_ascii_case("close") {
                    options.close = true;
                } else if token.eq_ignore_ascii_case("keep-alive") {
                    options.keep_alive = true;
                } else if token.eq_ignore_ascii_case("upgrade") {
                    options.upgrade = true;
                }
            }
        }

        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(CONNECTION, HeaderValue::from_str(value).unwrap());
        map
    }

    #[test]
    fn parses_close() {
        assert!(ConnectionOptions::parse(&headers("close")).close);
        assert!(ConnectionOptions::parse(&headers("Close")).close);
    }

    #[test]
    fn parses_token_list() {
        let options = ConnectionOptions::parse(&headers("keep-alive, Upgrade"));
        assert!(options.keep_alive);
        assert!(options.upgrade);
        assert!(!options.close);
    }

    #[test]
    fn absent_header_is_default() {
        let options = ConnectionOptions::parse(&HeaderMap::new());
        assert_eq!(options, ConnectionOptions::default());
    }

    #[test]
    fn unknown_tokens_ignored() {
        let options = ConnectionOptions::parse(&headers("TE, trailers"));
        assert_eq!(options, ConnectionOptions::default());
    }
}
