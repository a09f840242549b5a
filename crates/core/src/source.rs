//! Origin seam for the catalog cache.

use async_trait::async_trait;

use crate::{Error, Product};

/// Produces the full current catalog from the origin.
///
/// Implementations are slow and may fail transiently; the cache never calls
/// more than one `fetch` in the background at a time.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch every product currently published in the origin.
    async fn fetch(&self) -> Result<Vec<Product>, Error>;
}
