//! Callback ids and the guarded fan-out call.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

static LAST_CALLBACK_ID: AtomicU64 = AtomicU64::new(0);

/// Next process-wide callback id. Ids start at 1 and only increase, so
/// sorting by id gives registration order.
pub fn next_callback_id() -> u64 {
    LAST_CALLBACK_ID.fetch_add(1, Ordering::Relaxed) + 1
}

/// Run an application callback. A panic is logged and swallowed so the
/// remaining listeners still run.
pub(crate) fn invoke_guarded<R>(label: &str, f: impl FnOnce() -> R) -> Option<R> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(r) => Some(r),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".into());
            tracing::error!(callback = label, panic = %message, "callback panicked");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_increase() {
        let a = next_callback_id();
        let b = next_callback_id();
        assert!(b > a);
    }

    #[test]
    fn test_panic_is_contained() {
        let result = invoke_guarded("test", || -> u32 { panic!("boom") });
        assert_eq!(result, None);
        assert_eq!(invoke_guarded("test", || 7), Some(7));
    }
}
