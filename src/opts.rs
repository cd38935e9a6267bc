use smart_default::SmartDefault;

use crate::error::{Error, Result};

/// A configuration for connection
///
/// ```
/// let mut opts = zero_stmt::Opts::default();
/// opts.max_payload_length = 1 << 20;
/// assert!(opts.validate().is_ok());
/// ```
#[derive(Debug, Clone, SmartDefault)]
pub struct Opts {
    /// Enable TCP_NODELAY socket option to disable Nagle's algorithm
    #[default = true]
    pub tcp_nodelay: bool,

    /// Largest inbound payload accepted after reassembling 16MB continuation packets
    #[default(64 * 1024 * 1024)]
    pub max_payload_length: usize,

    /// Capacity of the command queue of [`crate::tokio::Client`]
    #[default = 32]
    pub command_channel_size: usize,
}

impl Opts {
    pub fn validate(&self) -> Result<()> {
        if self.max_payload_length == 0 {
            return Err(Error::BadConfigError(
                "max_payload_length must be positive".to_string(),
            ));
        }
        if self.command_channel_size == 0 {
            return Err(Error::BadConfigError(
                "command_channel_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
