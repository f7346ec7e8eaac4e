//! I/O layer for the todo client: HTTP transport, request client and the
//! typed backend API.
//!
//! Enable the `testing` feature for [`testing::ContractBackend`], an
//! in-memory server that speaks the same wire contract.

pub mod api;
pub mod client;
#[cfg(feature = "testing")]
pub mod testing;
pub mod transport;

pub use api::TodoApi;
pub use client::{RequestClient, RequestOptions};
pub use reqwest::Method;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};
