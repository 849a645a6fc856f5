//! Server-side reconciliation for server-driven UIs.
//!
//! App code describes each render slot of a page as a component tree (or a
//! producer of one). The engine transmits trees in order, re-runs
//! producers when session state changes, and sends only the difference
//! from what the browser already holds. Browser events come back as
//! [`protocol::ClientEvent`]s and are routed to the hooks attached to the
//! component they name.

pub mod compress;
pub mod config;
pub mod debounce;
pub mod error;
pub mod files;
pub mod model;
pub mod protocol;
pub mod render;
pub mod session;
pub mod state;
pub mod table;
pub mod telemetry;
pub mod transport;

pub use config::EngineConfig;
pub use error::{AuditLogError, ProtocolError, Severity, TransportError, ValidationError};
pub use model::{Node, ui};
pub use protocol::{ClientEvent, Envelope, ServerMessage};
pub use session::{
    AppContext, AppDefinition, LinkOptions, LogOptions, ModalOptions, Page, Producer,
    RenderHandle, Resolver, SessionRunner,
};
pub use state::SessionState;
pub use transport::{ChannelSink, Outbound, OutboundSink};
