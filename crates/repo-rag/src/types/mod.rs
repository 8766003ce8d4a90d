//! API request and response types

pub mod request;
pub mod response;

pub use request::{QueryRequest, RepoInput, TokenRequest};
pub use response::{DocumentListResponse, MessageResponse, QueryResponse, SyncResponse};
