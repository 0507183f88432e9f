//! Small helpers shared across core and transport: URI/template matching,
//! cursor-based pagination, and optional logging setup.

pub mod logging;
pub mod pagination;
pub mod uri;
