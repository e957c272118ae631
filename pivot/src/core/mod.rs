//! Deterministic, pure logic shared by the pivot engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod commit;
pub mod origin;
pub mod reference;
pub mod tuning;
pub mod types;
