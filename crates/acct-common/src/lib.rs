//! Shared infrastructure for the account platform.
//!
//! Currently this is just structured logging setup; anything that more
//! than one binary or crate needs and that carries no domain meaning
//! belongs here.

pub mod logging;
