//! MCP tool surface over the metadata cache.

pub mod definitions;
pub mod format;
pub mod handler;
pub mod request;

pub use definitions::{tool_definitions, TOOL_NAMES};
pub use handler::YapiToolServer;
pub use request::ToolRequest;
