//! Upstream backend API adapters.

mod http_transport;

pub use http_transport::ReqwestUpstreamTransport;
