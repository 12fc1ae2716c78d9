//! Markdown side of the pipeline: editing the index table and rendering
//! per-dataset pages.
//!
//! [`MarkdownTable`] keeps the whole document and rewrites only the lines it
//! touches. [`render_table`] and [`render_dataset_page`] produce fresh output.

mod render;
mod table;

pub use render::{DatasetPage, render_dataset_page, render_table};
pub use table::{MarkdownTable, TableRegion, find_tables};
