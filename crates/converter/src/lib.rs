//! OpenAPI -> MCP conversion and invocation.
//!
//! This crate turns every operation of an OpenAPI v3 document into an MCP
//! tool with a flat, location-namespaced argument bag, and executes tool
//! calls as plain HTTP requests against the documented server.
//!
//! It intentionally contains **no** MCP transport logic; serving the tools
//! over stdio or HTTP is the binary's job.

pub mod args;
pub mod document;
pub mod error;
pub mod invoke;
pub mod tool;
pub mod walker;

pub use args::{ArgKey, CallArgs};
pub use document::ApiDocument;
pub use error::{ConvertError, Result};
pub use invoke::{InvokeOutcome, Invoker};
pub use tool::{ConvertOptions, Converter, ToolDefinition};
