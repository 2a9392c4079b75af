//! Output generation for JSON exports and the Markdown digest.
//!
//! # Submodules
//!
//! - [`json`]: Writes the [`CollectionReport`](crate::models::CollectionReport)
//!   and a flat list of item records
//! - [`markdown`]: Renders the per-category digest consumed by the briefing writer
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! └── 2025-05-06/
//!     ├── results.json
//!     ├── items.json
//!     └── digest.md      # only with --markdown
//! ```

pub mod json;
pub mod markdown;
