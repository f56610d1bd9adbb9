//! # Durable Storage
//!
//! Disk-backed storage for the update stream. See [`archive`].

pub mod archive;
