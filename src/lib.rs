//! ddnsbridge
//!
//! Bridges [RFC-2136] dynamic DNS updates to [ExternalDNS].
//!
//! Routers and other edge devices that only speak TSIG signed dynamic updates (e.g. OPNsense,
//! pfSense, `nsupdate`) send their address changes to the bridge, which writes them as
//! `DNSEndpoint` resources for ExternalDNS to publish to the real DNS provider. Updates are
//! idempotent, so retransmitted messages never cause churn on the cluster.
//!
//! [RFC-2136]: https://www.rfc-editor.org/rfc/rfc2136
//! [ExternalDNS]: https://github.com/kubernetes-sigs/external-dns
//!
#![warn(clippy::pedantic)]

pub mod api;
pub mod config;
pub mod crd;
pub mod dns;
pub mod endpoint_store;
pub mod error;
pub mod reconciler;

pub use api::serve as serve_http;
pub use config::Config;
pub use crd::DNSEndpoint;
pub use dns::new as new_dns;
pub use dns::Handler;
pub use endpoint_store::{InMemoryEndpointStore, KubeEndpointStore};
pub use reconciler::Reconciler;
