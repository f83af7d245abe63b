//! Duplicate detection and column inspection for large delimited tables.
//!
//! A [`LogicalTable`](table::LogicalTable) records select / normalize /
//! group / filter / sort / limit operations as a plan; rows are only read when
//! the plan is counted, streamed or collected.

pub mod config;
pub mod domain;
pub mod error;
pub mod exec;
pub mod output;
pub mod plan;
pub mod report;
pub mod schema;
pub mod source;
pub mod table;
pub mod value;
