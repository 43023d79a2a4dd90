//! Pure, deterministic manifest logic: directive model, parser, and
//! manifest queries. No I/O; fully testable in isolation.

pub mod directive;
pub mod manifest;
pub mod parser;
