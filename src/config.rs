use crate::dns::tsig::KeyAlgorithm;
use crate::error::Error;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use clap::{Parser, ValueEnum};
use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Output format for log lines.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Runtime configuration. Every setting can be given as a flag or as an environment variable.
#[derive(Parser, Clone)]
#[command(
    name = "ddnsbridge",
    version,
    about = "RFC 2136 dynamic DNS update bridge for ExternalDNS DNSEndpoint resources"
)]
pub struct Config {
    /// Address the UDP and TCP DNS listeners bind to.
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0")]
    pub listen_addr: IpAddr,

    /// Port shared by the UDP and TCP DNS listeners.
    #[arg(long, env = "PORT", default_value_t = 53)]
    pub port: u32,

    /// TSIG key name clients sign their updates with.
    #[arg(long, env = "TSIG_KEY", default_value = "")]
    pub tsig_key: String,

    /// Base64 encoded TSIG shared secret.
    #[arg(long, env = "TSIG_SECRET", default_value = "", hide_env_values = true)]
    pub tsig_secret: String,

    #[arg(long, env = "TSIG_ALGORITHM", value_enum, default_value_t = KeyAlgorithm::HmacSha256)]
    pub tsig_algorithm: KeyAlgorithm,

    /// Allowed clock skew for signed messages, in seconds.
    #[arg(long, env = "TSIG_FUDGE", default_value_t = 300)]
    pub tsig_fudge: u16,

    /// Namespace the DNSEndpoint resources are written to.
    #[arg(long, env = "NAMESPACE", default_value = "default")]
    pub namespace: String,

    /// Comma separated zones clients may update. Subdomains of a listed zone are allowed too.
    #[arg(long, env = "ALLOWED_ZONES", value_delimiter = ',')]
    pub allowed_zones: Vec<String>,

    /// Comma separated `key=value` labels added to every DNSEndpoint.
    #[arg(long, env = "CUSTOM_LABELS", value_delimiter = ',')]
    pub custom_labels: Vec<String>,

    /// Timeout for each call to the Kubernetes API, in seconds.
    #[arg(long, env = "STORE_TIMEOUT", default_value = "10", value_parser = parse_seconds)]
    pub store_timeout: Duration,

    /// Idle timeout for DNS over TCP connections, in seconds.
    #[arg(long, env = "TCP_TIMEOUT", default_value = "10", value_parser = parse_seconds)]
    pub tcp_timeout: Duration,

    /// Optional address for the HTTP health check endpoint.
    #[arg(long, env = "HEALTH_BIND_ADDR")]
    pub health_bind_addr: Option<SocketAddr>,

    /// Log verbosity, used when `RUST_LOG` is unset.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

fn parse_seconds(s: &str) -> Result<Duration, std::num::ParseIntError> {
    Ok(Duration::from_secs(s.trim().parse()?))
}

impl Config {
    /// Check the settings the bridge can't run without.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingConfig`] when the key name, secret or allowed zone list is empty,
    /// [`Error::InvalidSecret`] when the secret isn't base64, and [`Error::InvalidConfig`] for an
    /// out of range port or a malformed custom label.
    pub fn validate(&self) -> Result<(), Error> {
        if self.tsig_key.trim().is_empty() {
            return Err(Error::MissingConfig("TSIG_KEY"));
        }
        if self.tsig_secret.trim().is_empty() {
            return Err(Error::MissingConfig("TSIG_SECRET"));
        }
        self.secret_bytes()?;
        if self.zones().next().is_none() {
            return Err(Error::MissingConfig("ALLOWED_ZONES"));
        }
        self.dns_bind_addr()?;
        self.labels()?;
        Ok(())
    }

    /// The decoded TSIG secret.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSecret`] if the configured secret isn't valid base64.
    pub fn secret_bytes(&self) -> Result<Vec<u8>, Error> {
        BASE64
            .decode(self.tsig_secret.trim())
            .map_err(|_| Error::InvalidSecret)
    }

    /// The socket address shared by the UDP and TCP listeners.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the port is outside `1..=65535`.
    pub fn dns_bind_addr(&self) -> Result<SocketAddr, Error> {
        match u16::try_from(self.port) {
            Ok(port) if port > 0 => Ok(SocketAddr::new(self.listen_addr, port)),
            _ => Err(Error::InvalidConfig {
                setting: "PORT",
                reason: format!("{} is not between 1 and 65535", self.port),
            }),
        }
    }

    /// Configured zones with blank entries dropped.
    pub fn zones(&self) -> impl Iterator<Item = &str> {
        self.allowed_zones
            .iter()
            .map(|z| z.trim())
            .filter(|z| !z.is_empty())
    }

    /// Operator supplied labels, parsed from the `key=value` list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an entry without `=` or with an empty key.
    pub fn labels(&self) -> Result<BTreeMap<String, String>, Error> {
        let mut labels = BTreeMap::new();
        let entries = self.custom_labels.iter().map(|e| e.trim());
        for entry in entries.filter(|e| !e.is_empty()) {
            match entry.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    labels.insert(key.trim().to_string(), value.trim().to_string());
                }
                _ => {
                    return Err(Error::InvalidConfig {
                        setting: "CUSTOM_LABELS",
                        reason: format!("\"{entry}\" is not a key=value pair"),
                    })
                }
            }
        }
        Ok(labels)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("listen_addr", &self.listen_addr)
            .field("port", &self.port)
            .field("tsig_key", &self.tsig_key)
            .field("tsig_secret", &"<redacted>")
            .field("tsig_algorithm", &self.tsig_algorithm)
            .field("tsig_fudge", &self.tsig_fudge)
            .field("namespace", &self.namespace)
            .field("allowed_zones", &self.allowed_zones)
            .field("custom_labels", &self.custom_labels)
            .field("store_timeout", &self.store_timeout)
            .field("tcp_timeout", &self.tcp_timeout)
            .field("health_bind_addr", &self.health_bind_addr)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .finish()
    }
}

/// Lower-case `name` and make it end in exactly one dot.
pub(crate) fn fully_qualified(name: &str) -> String {
    let mut name = name.trim().trim_end_matches('.').to_ascii_lowercase();
    name.push('.');
    name
}

/// Whether `zone` is one of `allowed`, or a subdomain of one of them.
///
/// Matching is done on whole labels: `sub.example.com` is inside `example.com` while
/// `evilexample.com` is not.
pub fn is_zone_allowed<S: AsRef<str>>(zone: &str, allowed: &[S]) -> bool {
    let zone = fully_qualified(zone);
    allowed.iter().any(|allowed_zone| {
        let allowed_zone = fully_qualified(allowed_zone.as_ref());
        zone == allowed_zone || zone.ends_with(&format!(".{allowed_zone}"))
    })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
