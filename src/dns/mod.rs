//! RFC 2136 dynamic update server.
//!
//! # Dynamic Updates
//!
//! The bridge listens for DNS UPDATE messages on UDP and TCP. Every update must be signed with
//! the configured [TSIG][tsig] key, and must name an allowed zone (or a subdomain of one) in its
//! zone section. The update section is translated into record changes by [`update::parse`]
//! and written to `DNSEndpoint` resources by the [`Reconciler`][crate::reconciler::Reconciler].
//!
//! E.g. with `ALLOWED_ZONES=example.com` and a key called `opnsense-ddns`:
//!
//! ```bash
//! ❯ nsupdate -y hmac-sha256:opnsense-ddns:c2VjcmV0LXNlY3JldC1zZWNyZXQ= <<EOF
//! server 127.0.0.1 5353
//! zone example.com
//! update add router.example.com 300 A 192.168.1.1
//! send
//! EOF
//! ```
//!
//! results in a `DNSEndpoint` called `router-example-com`:
//!
//! ```yaml
//! apiVersion: externaldns.k8s.io/v1alpha1
//! kind: DNSEndpoint
//! metadata:
//!   name: router-example-com
//!   labels:
//!     app.kubernetes.io/managed-by: ddnsbridge
//!     ddnsbridge/zone: example-com
//! spec:
//!   endpoints:
//!   - dnsName: router.example.com.
//!     recordType: A
//!     recordTTL: 300
//!     targets: ["192.168.1.1"]
//! ```
//!
//! Deleting either record type of a name (`update delete router.example.com AAAA`) removes the
//! whole resource.
//!
//! # Responses
//!
//! | condition                               | RCODE      | signed             |
//! |-----------------------------------------|------------|--------------------|
//! | `QR` bit set                            | no reply   |                    |
//! | opcode other than query, notify, update | `NOTIMP`   | no                 |
//! | query or notify                         | `NOTIMP`   | no                 |
//! | undecodable message                     | `FORMERR`  | no                 |
//! | unsigned update                         | `NOTAUTH`  | no                 |
//! | bad key name, algorithm, MAC or time    | `NOTAUTH`  | yes, not chained   |
//! | no zone section, no address records     | `FORMERR`  | yes                |
//! | zone not allowed                        | `REFUSED`  | yes                |
//! | store failure                           | `SERVFAIL` | yes                |
//! | applied                                 | `NOERROR`  | yes                |

pub mod handlers;
pub mod server;
pub mod tsig;
pub mod update;

pub use handlers::{Handler, Protocol, ResponseStatus};
pub use server::{new, DnsServer};
