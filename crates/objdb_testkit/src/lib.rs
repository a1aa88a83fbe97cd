//! # ObjDB Testkit
//!
//! Test utilities for ObjDB.
//!
//! This crate provides:
//! - Test fixtures: temporary stores and the sample Person/Dog/Cat schema
//! - Property-based test generators using proptest
//! - Cross-thread stress helpers
//!
//! ## Usage
//!
//! ```rust
//! use objdb_testkit::prelude::*;
//!
//! with_temp_store(|store| {
//!     let h = store.handle();
//!     populate_people(&h, &[30, 40]).unwrap();
//!     assert_eq!(h.count("Person").unwrap(), 2);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
