//! Type conversions for QuotaError

use super::types::QuotaError;

// Store failures are fail-closed: they surface as BackendUnavailable.
impl From<redis::RedisError> for QuotaError {
    fn from(err: redis::RedisError) -> Self {
        QuotaError::BackendUnavailable(format!("redis: {}", err))
    }
}
