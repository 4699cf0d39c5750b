#![deny(warnings)]
//! Network collaborators for the node
//!
//! - **`config`**: Configuration structs with `Default` implementations
//! - **`error`**: Simple error enum for network operations
//! - **`manager`**: DHCP bring-up, DNS, and the Ethernet [`Link`](airnode_hal::Link)
//! - **`sntp`**: background SNTP loop behind `NetworkTime`
//! - **`socket`**: Async TCP socket wrapper for embedded-io-async
//! - **`tls`**: TLS 1.3 `SecureTransport`
//! - **`upload`**: HTTPS `UploadSink`
//!
//! The W5500 driver (`embassy-net-wiznet`) provides the embassy-net device
//! and runner; everything here uses `embassy-net`'s socket APIs directly.

pub mod config;
pub mod error;
pub mod manager;
pub mod sntp;
pub mod socket;
pub mod tls;
pub mod upload;

pub use config::{BoardConfig, NetworkConfig, SntpConfig};
pub use error::NetworkError;
pub use manager::EthernetLink;
pub use sntp::SntpService;
pub use tls::{SharedRng, SharedRngCell, TcpBuffers, TlsTransport};
pub use upload::HttpsUploader;
