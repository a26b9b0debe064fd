//! MCP transport
//!
//! Only the stateless streamable-HTTP flavour is provided: every POST is
//! answered with plain JSON and no session is kept between requests, so any
//! number of replicas can sit behind a load balancer.

pub mod http;

pub use http::{HttpTransport, MCP_PATH};
