//! Shared test utilities for leadfill integration tests.
//!
//! This module provides:
//! - `TestHarness` for temporary CSV/XLSX/config fixtures
//! - Builders for configs, records and batches

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{Cell, TestHarness};
