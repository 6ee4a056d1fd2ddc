//! Remote code-forge integration (C3): client + domain models.

pub mod client;
pub mod models;

pub use client::{ForgeClient, ForgeClientConfig, FileEntry};
