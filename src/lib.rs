//! Declarative jail flavour builder and runner.
//!
//! A `Jailfile` manifest describes how to materialize a base
//! filesystem image (a "flavour") and how to bootstrap, run, and tear
//! down live jail instances created from it. The architecture keeps a
//! strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (directive model, parser,
//!   manifest queries). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (backend process control,
//!   filesystem copies, script rendering, configuration). Isolated to
//!   enable scripted doubles in tests.
//! - **[`engine`]**: The four-phase state machine driving directives
//!   against a jail backend within a scoped execution session.
//!
//! Orchestration modules ([`build`], [`create`], [`run`]) coordinate
//! the engine with I/O to implement CLI commands.

pub mod build;
pub mod core;
pub mod create;
pub mod engine;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::{Error, Result};
