//! Google Sheets client module
//!
//! Reads go through the public gviz query endpoint, writes through a deployed
//! Apps Script web app.
//!
//! Structure:
//! - `client.rs`: spreadsheet client and the HTTP transport seam
//! - `gviz.rs`: wrapped-JSON extraction and the gviz payload types
//! - `reader.rs` / `writer.rs`: row projection and form-POST writes
//! - `filter.rs`, `export.rs`, `values.rs`: client-side helpers
//! - `columns.rs`, `layouts.rs`: named column maps and per-view layouts
//! - `view.rs`, `notify.rs`: per-view state and notifications
//! - `auth.rs`, `session.rs`: users-sheet sign-in and the persisted session
//! - `error.rs`: error types

pub mod error;

pub mod client;
pub mod gviz;
pub mod reader;
pub mod row;
pub mod writer;

pub mod export;
pub mod filter;
pub mod validation;
pub mod values;

pub mod columns;
pub mod layouts;

pub mod notify;
pub mod view;

pub mod auth;
pub mod session;

// Re-exports for convenience
pub use client::{SheetRef, SheetsClient};
pub use error::{Result, SheetError};
pub use layouts::{LayoutRegistry, SheetLayout};
pub use view::{RefreshPolicy, SheetView};
pub use writer::{WriteMode, WriteOutcome, WriteRequest};
