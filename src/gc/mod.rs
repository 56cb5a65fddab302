//! Binary garbage collection.
//!
//! A cycle fetches the pinned set once and runs one pass per tenant. A pass
//! fetches the tenant's used versions, scans the versions stored on disk and
//! removes every version that is neither used nor pinned.

mod collector;
mod executor;
mod lease;
pub mod policy;
mod scanner;
mod shutdown;

pub use collector::*;
pub use executor::*;
pub use lease::*;
pub use policy::{decide, KeepReason, Verdict};
pub use scanner::*;
pub use shutdown::*;
