//! Command validation run before any routing or network activity.

use super::types::Arguments;
use crate::error::{ClusterError, ClusterResult};

/// Rejects commands the cluster should not attempt to execute.
pub trait CommandValidator: Send + Sync {
    fn validate(&self, command: &str, arguments: &Arguments) -> ClusterResult<()>;
}

/// Accepts everything.
pub struct PermissiveValidator;

impl CommandValidator for PermissiveValidator {
    fn validate(&self, _command: &str, _arguments: &Arguments) -> ClusterResult<()> {
        Ok(())
    }
}

/// Size limits on the command name and its serialized arguments.
#[derive(Debug, Clone)]
pub struct LimitsValidator {
    pub max_argument_bytes: usize,
    pub max_name_len: usize,
}

impl LimitsValidator {
    pub fn new(max_argument_bytes: usize) -> Self {
        Self {
            max_argument_bytes,
            max_name_len: 256,
        }
    }
}

impl CommandValidator for LimitsValidator {
    fn validate(&self, command: &str, arguments: &Arguments) -> ClusterResult<()> {
        if command.is_empty() || command.len() > self.max_name_len {
            return Err(ClusterError::Validation {
                command: command.to_string(),
                reason: format!("name must be 1..={} bytes", self.max_name_len),
            });
        }

        let size = arguments.encoded_len();
        if size > self.max_argument_bytes {
            return Err(ClusterError::Validation {
                command: command.to_string(),
                reason: format!(
                    "arguments are {} bytes, limit is {}",
                    size, self.max_argument_bytes
                ),
            });
        }

        Ok(())
    }
}
