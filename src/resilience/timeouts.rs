//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound the upstream dial with the connect timeout
//! - Bound the initial handshake exchange with the handshake timeout
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - The byte-copy phase is never bounded; idle sessions are legitimate

use std::future::Future;
use std::time::Duration;

use crate::relay::error::{RelayError, RelayResult};

/// Run `fut`, failing with [`RelayError::Timeout`] after `secs` seconds.
pub async fn with_timeout<F, T>(secs: u64, operation: &'static str, fut: F) -> RelayResult<T>
where
    F: Future<Output = RelayResult<T>>,
{
    match tokio::time::timeout(Duration::from_secs(secs), fut).await {
        Ok(result) => result,
        Err(_) => Err(RelayError::Timeout { operation, secs }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn elapsed_deadline_is_a_timeout() {
        let result: RelayResult<()> = with_timeout(1, "waiting", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(
            result,
            Err(RelayError::Timeout {
                operation: "waiting",
                secs: 1
            })
        ));
    }

    #[tokio::test]
    async fn inner_result_passes_through() {
        let ok = with_timeout(1, "noop", async { Ok(7) }).await.unwrap();
        assert_eq!(ok, 7);
    }
}
