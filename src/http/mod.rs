//! HTTP surface for the protected exercise operations.

mod extract;
mod routes;
mod server;

pub use routes::{router, AppState, BodyPartsResponse, ListsResponse, BODY_PARTS, LISTS};
pub use server::HttpServer;
