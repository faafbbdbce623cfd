//! The agent's network surface: the SNMP codec, MIB registry and UDP responder, the
//! HTTP/JSON responder, and the SNMP client the HTTP side uses to read its own agent.

pub mod auth;
pub mod client;
pub mod context;
pub mod middleware;
pub mod mib;
pub mod protocol;
pub mod server;

pub use context::AgentContext;
pub use server::start_server;
