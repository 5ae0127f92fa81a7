//! Module for core business logic services.
//!
//! This module encapsulates the reducer that groups process events and the
//! per-channel tables that own a subscription and feed that reducer.

pub mod data_aggregator;
pub mod process_table;

pub use data_aggregator::GroupedEntry;
pub use process_table::{ProcessTable, TableConfig, TableError, TableSnapshot, TableStatus};
