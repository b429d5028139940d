//! Core types for smartbuild.
//!
//! This crate holds everything the orchestrating binary needs that does not
//! touch a terminal: the logical command vocabulary, the two-scope settings
//! store, serial device discovery, and the C/C++ include-path descriptor.

pub mod command;
pub mod cpp_properties;
pub mod devices;
pub mod settings;
