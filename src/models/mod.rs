//! Data models for the binary garbage collector.

mod ids;
mod report;
mod versions;

pub use ids::*;
pub use report::*;
pub use versions::*;
