pub mod interactions;
pub mod search;

pub use interactions::*;
pub use search::*;
