//! Core types and shared functionality for vitrine.
//!
//! This crate provides:
//! - Product catalog model and the origin seam (`CatalogSource`)
//! - Stale-while-revalidate catalog cache
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod product;
pub mod source;

pub use cache::{CachePolicy, CacheSnapshot, CacheStore, Freshness, RefreshCoordinator, Served};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use product::{Photo, Product};
pub use source::CatalogSource;
