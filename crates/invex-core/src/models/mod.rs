//! Data models: configuration, canonical records, and raw backend output.

pub mod config;
pub mod invoice;
pub mod raw;
