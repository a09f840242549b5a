//! In-process catalog cache with stale-while-revalidate refresh.
//!
//! This module provides the single-slot snapshot store and the coordinator
//! that sits between request handlers and the slow origin. It supports:
//!
//! - Content-addressed validators (SHA-256 of the serialized catalog)
//! - A configurable TTL with a pre-emptive refresh window
//! - Single-flight background refresh
//! - Stale fallback whenever any snapshot exists

pub mod coordinator;
pub mod hash;
pub mod policy;
pub mod snapshot;
pub mod store;

pub use crate::Error;

pub use coordinator::{RefreshCoordinator, Served};
pub use policy::{CachePolicy, Freshness, Window};
pub use snapshot::CacheSnapshot;
pub use store::CacheStore;
