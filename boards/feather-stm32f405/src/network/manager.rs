#![deny(unsafe_code)]
#![deny(warnings)]
//! Network stack manager
//!
//! DHCP bring-up logging, DNS resolution and the [`Link`] collaborator.

use airnode_hal::Link;
use defmt::{error, info, warn, Debug2Format};
use embassy_net::dns::DnsQueryType;
use embassy_net::{IpEndpoint, Stack};

use super::error::NetworkError;

/// Wait for network configuration (DHCP) and log IP address
pub async fn wait_for_config(stack: &Stack<'_>) {
    info!("Waiting for DHCP...");
    stack.wait_config_up().await;
    info!("Network is UP!");

    if let Some(config) = stack.config_v4() {
        let ip = config.address.address();
        let octets = ip.octets();
        info!(
            "IP: {}.{}.{}.{}",
            octets[0], octets[1], octets[2], octets[3]
        );

        if let Some(gateway) = config.gateway {
            let gw_octets = gateway.octets();
            info!(
                "Gateway: {}.{}.{}.{}",
                gw_octets[0], gw_octets[1], gw_octets[2], gw_octets[3]
            );
        }
    }
}

/// Resolve `host` to its first A record
pub async fn resolve(stack: Stack<'_>, host: &str, port: u16) -> Result<IpEndpoint, NetworkError> {
    let address = stack
        .dns_query(host, DnsQueryType::A)
        .await
        .map_err(|e| {
            error!("DNS query for {} failed: {:?}", host, Debug2Format(&e));
            NetworkError::DnsError
        })?
        .first()
        .copied()
        .ok_or_else(|| {
            error!("DNS returned no results for {}", host);
            NetworkError::DnsError
        })?;

    let endpoint = IpEndpoint::new(address, port);
    info!("Resolved {} to {}", host, Debug2Format(&endpoint));
    Ok(endpoint)
}

/// Ethernet uplink: "connected" means DHCP has configured the stack
#[derive(Clone, Copy)]
pub struct EthernetLink {
    stack: Stack<'static>,
}

impl EthernetLink {
    pub fn new(stack: Stack<'static>) -> Self {
        Self { stack }
    }
}

impl Link for EthernetLink {
    async fn ensure_connected(&mut self) {
        if self.stack.is_config_up() {
            return;
        }
        warn!("Link down, waiting for DHCP lease");
        wait_for_config(&self.stack).await;
    }
}
