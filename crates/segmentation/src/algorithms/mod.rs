pub mod preprocessing;
pub mod extraction;
pub mod splitting;
pub mod reconciliation;
pub mod normalization;

pub use preprocessing::*;
pub use extraction::*;
pub use splitting::*;
pub use reconciliation::*;
pub use normalization::*;
