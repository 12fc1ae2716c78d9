//! Orchestration for csv2md.
//!
//! Ties decoding, index editing, page rendering and GitHub access together
//! into end-to-end runs (`run_local`, `run_issue`).

pub mod pipeline;
pub mod publish;
