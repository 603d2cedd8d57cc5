//! Core data model: supported targets and security profiles.

pub mod profile;
pub mod target;
