#![allow(non_camel_case_types, clippy::upper_case_acronyms)]

pub mod cache;

pub use cache::{Cache, Counter, PerCache};
