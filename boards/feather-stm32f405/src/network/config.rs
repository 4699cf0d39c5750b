#![deny(unsafe_code)]
#![deny(warnings)]
//! Board network and peripheral configuration

/// SNTP client configuration
///
/// The server list comes from `NetworkTime::configure`; this only bounds
/// each attempt.
#[derive(Debug, Clone)]
pub struct SntpConfig {
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// Number of retry attempts per server
    pub retry_count: usize,
    /// Maximum accepted stratum level (1-15)
    pub max_stratum: u8,
    /// Pause between failed attempts
    pub retry_delay_ms: u64,
    /// Resync period once synchronized
    pub resync_interval_secs: u64,
}

impl Default for SntpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            retry_count: 3,
            max_stratum: 3,
            retry_delay_ms: 2000,
            resync_interval_secs: 15 * 60,
        }
    }
}

/// Network stack configuration
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// MAC address for Ethernet
    pub mac_addr: [u8; 6],
    /// Random seed for network stack
    pub seed: u64,
    /// TCP connect plus TLS handshake bound
    pub connect_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mac_addr: [0x02, 0x00, 0x00, 0x12, 0x34, 0x56],
            seed: 0x1234_5678_u64,
            connect_timeout_ms: 15_000,
        }
    }
}

/// Upload endpoint and board identity
#[derive(Debug, Clone)]
pub struct BoardConfig {
    /// Record store host
    pub upload_host: &'static str,
    pub upload_port: u16,
    /// Prefix of the board id; the chip UID is appended
    pub board_id_prefix: &'static str,
    /// PM sensor UART baud rate
    pub pms_baud: u32,
    /// SCD4x I2C bus frequency
    pub i2c_frequency_hz: u32,
    pub scd4x_address: u8,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            upload_host: "airnode-default-rtdb.firebaseio.com",
            upload_port: 443,
            board_id_prefix: "feather",
            pms_baud: 9600,
            i2c_frequency_hz: 100_000,
            scd4x_address: airnode_hal::scd4x::DEFAULT_ADDRESS,
        }
    }
}
