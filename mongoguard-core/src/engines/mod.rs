// mongoguard-core/src/engines/mod.rs
//! This module contains the sanitization engine implementations.
//!
//! Each engine is a separate file within this directory and implements the
//! `ValueSanitizer` trait, so it can stand in anywhere a custom sanitizer can.
//!
//! # License
//! MIT OR Apache-2.0

pub mod default_engine;
