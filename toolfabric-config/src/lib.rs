//! Config Loader and Meta Writer for the agent-side tool fabric.
//!
//! Parses the `mcp.json`-shaped configuration file into an ordered mapping
//! of [`ServerSpec`] rows, and provides a format-preserving read-modify-write
//! for the per-server `_meta` sub-object.

pub mod error;
pub mod loader;
pub mod meta;
pub mod server;

pub use error::ConfigError;
pub use loader::{OrderedServerMap, load_config};
pub use meta::update_server_meta;
pub use server::{Lifecycle, ServerSpec, Transport};
