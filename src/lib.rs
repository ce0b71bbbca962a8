#![allow(
    clippy::upper_case_acronyms,
    non_camel_case_types,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]

pub mod cache;
pub mod config;
pub mod tag_array;

#[cfg(test)]
pub mod testing;

pub use cache::{Access, Cache, Command, RequestStatus};

/// Simulated byte address.
pub type address = u64;
