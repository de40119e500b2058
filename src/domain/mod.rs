//! Domain logic and core data structures
//!
//! Pure types and conversions, independent of any host or map SDK.

pub mod coords;
pub mod core;
pub mod event;
pub mod marker;
