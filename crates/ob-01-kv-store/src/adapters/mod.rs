//! Concrete storage adapters.

pub mod memory;
