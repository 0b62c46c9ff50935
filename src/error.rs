//! Error types.

use hickory_proto::error::ProtoError;

/// Error enumerates the startup and plumbing failures of the bridge.
///
/// Per-message failures (authentication, parsing, authorization, store writes) have their own
/// error types and are always answered with a DNS status code instead of reaching this enum.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Returned by [`Config::validate`][`crate::config::Config::validate`] when a required
    /// setting is absent or empty, e.g. the TSIG key name or the allowed zone list.
    #[error("missing required configuration: {0}")]
    MissingConfig(&'static str),

    /// Returned by [`Config::validate`][`crate::config::Config::validate`] when a setting is
    /// present but unusable, e.g. a port outside `1..=65535` or a custom label without `=`.
    #[error("invalid configuration for {setting}: {reason}")]
    InvalidConfig {
        setting: &'static str,
        reason: String,
    },

    /// Returned when the TSIG secret is not valid base64. The secret itself is never included.
    #[error("TSIG secret is not valid base64")]
    InvalidSecret,

    /// Returned when the Kubernetes client can't be built from in-cluster credentials or a
    /// kubeconfig, or when an API call fails outside of request processing.
    #[error("kubernetes client error")]
    Kube(#[from] kube::Error),

    /// Returned when a generic IO error occurs, e.g. binding a listener.
    #[error("an IO error occurred")]
    IO(#[from] std::io::Error),

    /// Returned when a DNS message can't be encoded or decoded.
    #[error("DNS error")]
    DNSError(#[from] ProtoError),
}
