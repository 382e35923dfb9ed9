use crate::config::SizeGuardConfig;
use crate::errors::AppError;

use super::{GuardStage, InboundCall};

/// Rejects bodies larger than the configured maximum before they are parsed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeGuard {
    config: SizeGuardConfig,
}

impl SizeGuard {
    pub fn new(config: SizeGuardConfig) -> Self {
        Self { config }
    }

    pub fn max_bytes(&self) -> usize {
        self.config.max_bytes
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

impl GuardStage for SizeGuard {
    fn name(&self) -> &'static str {
        "size_guard"
    }

    fn check(&self, call: &mut InboundCall) -> Result<(), AppError> {
        if !self.is_enabled() {
            return Ok(());
        }
        let Some(body) = call.body.as_ref() else {
            return Ok(());
        };

        let length = body.len();
        let max = self.max_bytes();
        if length > max {
            return Err(AppError::PayloadTooLarge { length, max });
        }
        Ok(())
    }
}
