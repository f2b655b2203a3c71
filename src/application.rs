//! Application layer
//!
//! Runs a whole harvest and exports what it produced.

pub mod export;
pub mod harvester;

pub use export::{export_to_file, write_json_lines};
pub use harvester::{HarvestError, HarvestSummary, Harvester};
