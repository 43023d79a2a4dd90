//! Side-effecting operations: backend process control, child process
//! execution, filesystem copies, script rendering, and configuration.

pub mod backend;
pub mod config;
pub mod fsops;
pub mod process;
pub mod script;
