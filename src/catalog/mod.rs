//! Exercise catalog upstream.
//!
//! The catalog is the external API behind the protected operations. It is
//! consumed through [`ExerciseCatalog`] so handlers can be exercised against
//! an in-memory fake.

mod client;

pub use client::HttpCatalog;

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised while talking to the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Catalog returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Read access to the exercise catalog.
#[async_trait]
pub trait ExerciseCatalog: Send + Sync {
    async fn body_parts(&self) -> Result<Vec<String>, CatalogError>;

    async fn targets(&self) -> Result<Vec<String>, CatalogError>;

    async fn equipment(&self) -> Result<Vec<String>, CatalogError>;
}
