use std::{fmt::Display, future::Future};

use log::warn;

/// How many times a local transaction is attempted before a transient conflict is surfaced to the caller.
pub const MAX_CONFLICT_RETRIES: u32 = 3;

/// Marks errors that are safe to retry.
///
/// Only the store's transient lock/serialization conflict class qualifies. Domain errors (missing records,
/// duplicates, preconditions) and anything involving the payment gateway must propagate immediately.
pub trait MaybeTransient {
    fn is_transient(&self) -> bool;
}

/// Runs `op` up to `attempts` times, retrying only errors whose [`MaybeTransient::is_transient`] is true.
///
/// The operation must be a purely local transaction. Never wrap a gateway call in this helper: replaying a
/// money-moving call can double-charge or double-transfer.
pub async fn retry_on_conflict<T, E, F, Fut>(attempts: u32, mut op: F) -> Result<T, E>
where
    E: MaybeTransient + Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt < attempts => {
                warn!("♻️ Transient store conflict on attempt {attempt}/{attempts}: {e}. Retrying.");
                attempt += 1;
            },
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod test {
    use std::{
        cell::Cell,
        fmt::{self, Display},
    };

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum FakeError {
        Conflict,
        Domain,
    }

    impl Display for FakeError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                FakeError::Conflict => write!(f, "conflict"),
                FakeError::Domain => write!(f, "domain error"),
            }
        }
    }

    impl MaybeTransient for FakeError {
        fn is_transient(&self) -> bool {
            matches!(self, FakeError::Conflict)
        }
    }

    #[tokio::test]
    async fn two_conflicts_then_success_yields_one_result() {
        let calls = Cell::new(0u32);
        let result = retry_on_conflict(MAX_CONFLICT_RETRIES, || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 3 {
                    Err(FakeError::Conflict)
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn domain_errors_are_never_retried() {
        let calls = Cell::new(0u32);
        let result: Result<(), _> = retry_on_conflict(MAX_CONFLICT_RETRIES, || {
            calls.set(calls.get() + 1);
            async { Err(FakeError::Domain) }
        })
        .await;
        assert_eq!(result, Err(FakeError::Domain));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn exhaustion_surfaces_the_conflict_after_three_attempts() {
        let calls = Cell::new(0u32);
        let result: Result<(), _> = retry_on_conflict(MAX_CONFLICT_RETRIES, || {
            calls.set(calls.get() + 1);
            async { Err(FakeError::Conflict) }
        })
        .await;
        assert_eq!(result, Err(FakeError::Conflict));
        assert_eq!(calls.get(), 3);
    }
}
