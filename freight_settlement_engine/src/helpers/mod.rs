mod retry;

pub use retry::{retry_on_conflict, MaybeTransient, MAX_CONFLICT_RETRIES};
