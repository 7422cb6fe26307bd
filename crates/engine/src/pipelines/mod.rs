//! Application-owned workflow definitions.

pub mod lead_qualification;

pub use lead_qualification::lead_qualification;
