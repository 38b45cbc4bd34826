//! Provides abstractions over the system components controlling the displays

pub mod backend;
