//! Pipelining HTTP/1.1 client engine.
//!
//! A per-destination pool of TCP connections that multiplexes many
//! logical requests onto a bounded set of sockets, pipelines multiple
//! requests per socket, enforces strict FIFO response ordering, applies
//! backpressure when capacity is exhausted, and reclaims idle
//! connections.
//!
//! ```rust,ignore
//! use pipeliner::{Client, Config, Destination, Request};
//!
//! async fn example() -> Result<(), pipeliner::Error> {
//!     let client = Client::new(Config::default())?;
//!     let response = client
//!         .execute(Destination::new("example.com", 80), Request::get("/"))
//!         .await?;
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod net;
pub mod observability;
pub mod request;
pub mod response;

pub use client::{Client, Destination};
pub use config::{Config, EndpointConfig};
pub use error::Error;
pub use request::{Request, RequestBody};
pub use response::Response;
