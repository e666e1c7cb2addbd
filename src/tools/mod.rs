//! Tool system for bubble
//!
//! Tools are named, schema-described async handlers. The registry is the
//! single place the UI goes through to list and run them.

mod builtin;
mod registry;
mod schema;
mod types;

pub use builtin::BuiltinTools;
pub use registry::{CollisionPolicy, ToolOwner, ToolRegistry};
pub use schema::{ParameterSchema, ParameterType, ToolSchema};
pub use types::{Params, Tool, ToolDefinition, ToolHandler, ToolResult};
