//! Observability subsystem
//!
//! Structured JSON logging only. Logging never affects store behavior:
//! write failures on stdout/stderr are ignored.
//!
//! # Usage
//!
//! ```ignore
//! use recordstore::observability::Logger;
//!
//! Logger::info("STORE_INSERT", &[("entity", "tasks"), ("id", "3")]);
//! ```

mod logger;

pub use logger::{Logger, Severity};
