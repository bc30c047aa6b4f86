//! Route handlers grouped by resource.

pub mod actions;
pub mod goals;
pub mod google;
