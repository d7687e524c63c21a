//! MCP server exposing workflow run inspection as tools.
//!
//! Works with any configured backend through the `FlowClient` seam. Each
//! tool is a stateless pass-through: validate arguments, issue one or two
//! client calls, return pretty-printed JSON. Failures come back as a
//! structured error payload instead of crashing the session.

pub mod server;

pub use server::FlowTools;
