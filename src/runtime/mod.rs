//! Dynamic plugin runtime: agent-authored source in, rendered mount target out.
//!
//! `ingest` validates, `construct` turns text into a [`construct::RenderableUnit`]
//! inside a [`sandbox::Sandbox`], [`host::PluginHost`] owns the mount target and
//! its error boundary, and [`lifecycle::PluginLifecycle`] decides when to remount.

pub mod construct;
pub mod dom;
pub mod error;
pub mod host;
pub mod ingest;
pub mod lifecycle;
pub mod render;
pub mod sandbox;
pub mod style;

pub use dom::DomEvent;
pub use host::{HostNotice, PluginHost};
pub use ingest::ConventionPolicy;
pub use lifecycle::PluginLifecycle;
pub use sandbox::SandboxLimits;
