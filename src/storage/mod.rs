//! Storage and external collaborator ports.

mod fs;
mod layout;
mod pinned;
mod usage;

pub use fs::*;
pub use layout::*;
pub use pinned::*;
pub use usage::*;
