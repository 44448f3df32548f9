pub mod catalog;
pub mod contract;
pub mod holdings;
pub mod instrument;
pub mod recommendation;
pub mod signal;
