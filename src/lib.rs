//! Sheet Dashboard Library
//!
//! Client for a spreadsheet used as a tabular database: gviz reads, Apps
//! Script writes, client-side search and CSV export, and the reports built on
//! top of them. The `sheet_dashboard` binary is a thin CLI over this crate.

pub mod config;
pub mod gsheets;
pub mod reports;
