//! Catalog records served by `/products`.

use serde::{Deserialize, Serialize};

/// A single catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Price in whole currency units.
    pub price: i64,
    pub media: Vec<Photo>,
}

/// Reference to a photo stored next to the product in the origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub id: String,
    pub name: String,
}
