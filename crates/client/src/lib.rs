//! Origin client code for vitrine.
//!
//! This crate provides the Drive-backed `CatalogSource`: service-account
//! authentication, rate-limited Drive API calls, and product assembly from
//! the catalog folder tree.

pub mod catalog;
pub mod drive;

pub use catalog::{DriveCatalog, parse_price, split_description};

pub use drive::{DriveClient, DriveConfig, DriveFile};
