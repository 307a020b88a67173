//! Scoped capture of out-of-band faults.
//!
//! Some operations (notably readiness primitives such as `poll(2)`) signal
//! trouble out-of-band instead of through their return value: they record a
//! fault and then hand back a plain "nothing happened" indicator. This module
//! turns those reports into structured errors.
//!
//! Faults are reported with [`report`]. While [`capture`] runs an operation on
//! the current thread, the first report is recorded and every later one in
//! the same scope is discarded. Without a scope the default handler logs the
//! report through `tracing` and execution carries on.
//!
//! Scopes nest: a `capture` inside another shadows the enclosing scope until
//! it returns. The enclosing handler is restored on every exit path,
//! unwinding included.
//!
//! # Example
//!
//! ```
//! use amqp_io::fault::{capture, report};
//!
//! let result = capture(|| {
//!     report(104, "Connection reset");
//!     report(32, "Broken pipe"); // discarded, first fault wins
//!     false
//! });
//!
//! let fault = result.unwrap_err();
//! assert_eq!(fault.message(), "Connection reset");
//! assert_eq!(fault.code(), 104);
//! ```

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::panic::Location;

thread_local! {
    /// Installed capture slots, innermost last.
    static HANDLERS: RefCell<Vec<Option<Fault>>> = const { RefCell::new(Vec::new()) };
}

/// A fault recorded inside a guarded scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    code: i32,
    message: String,
    file: &'static str,
    line: u32,
}

impl Fault {
    /// Create a fault record.
    pub fn new(code: i32, message: impl Into<String>, file: &'static str, line: u32) -> Self {
        Self {
            code,
            message: message.into(),
            file,
            line,
        }
    }

    /// Platform error code (errno on unix, 0 when unknown).
    #[inline]
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Human-readable message, as reported.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Source file that reported the fault (best effort).
    #[inline]
    pub fn file(&self) -> &'static str {
        self.file
    }

    /// Source line that reported the fault (best effort).
    #[inline]
    pub fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Fault {}

/// Report a fault out-of-band.
///
/// Recorded by the innermost [`capture`] on this thread if it has not
/// captured anything yet. The caller's location is kept for diagnostics.
#[track_caller]
pub fn report(code: i32, message: impl Into<String>) {
    let location = Location::caller();
    let fault = Fault::new(code, message, location.file(), location.line());

    let unhandled = HANDLERS.with(|handlers| {
        let mut handlers = handlers.borrow_mut();
        match handlers.last_mut() {
            Some(slot) => {
                if slot.is_none() {
                    *slot = Some(fault);
                }
                None
            }
            None => Some(fault),
        }
    });

    if let Some(fault) = unhandled {
        tracing::warn!(
            code = fault.code,
            file = fault.file,
            line = fault.line,
            "Unhandled I/O fault: {}",
            fault.message
        );
    }
}

/// Report an [`std::io::Error`] out-of-band, keeping its OS error code.
#[track_caller]
pub fn report_io(err: &std::io::Error) {
    report(err.raw_os_error().unwrap_or(0), err.to_string());
}

/// RAII guard that captures the first fault reported while it is alive.
///
/// Only [`capture`] creates one, so guards always unwind innermost first.
/// Not `Send`: the handler is bound to the thread that installed it.
#[must_use = "dropping the scope immediately uninstalls it"]
struct FaultScope {
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl FaultScope {
    /// Install a fresh, empty capture slot.
    fn enter() -> Self {
        let depth = HANDLERS.with(|handlers| {
            let mut handlers = handlers.borrow_mut();
            let depth = handlers.len();
            handlers.push(None);
            depth
        });
        Self {
            depth,
            _not_send: PhantomData,
        }
    }

    /// Uninstall the scope and settle the guarded operation's result.
    ///
    /// A captured fault supersedes `raw`.
    fn finish<T>(self, raw: T) -> std::result::Result<T, Fault> {
        let captured = HANDLERS.with(|handlers| {
            let mut handlers = handlers.borrow_mut();
            debug_assert_eq!(
                handlers.len(),
                self.depth + 1,
                "fault scope finished while a nested scope is still installed"
            );
            let captured = handlers.get_mut(self.depth).and_then(Option::take);
            handlers.truncate(self.depth);
            captured
        });
        match captured {
            Some(fault) => Err(fault),
            None => Ok(raw),
        }
    }
}

impl Drop for FaultScope {
    fn drop(&mut self) {
        // The thread-local may already be gone during thread teardown.
        let _ = HANDLERS.try_with(|handlers| {
            if let Ok(mut handlers) = handlers.try_borrow_mut() {
                handlers.truncate(self.depth);
            }
        });
    }
}

/// Run `op` with a fresh fault-capture scope installed.
///
/// Returns the operation's own result when nothing was reported, or the
/// first reported fault otherwise.
pub fn capture<T, F>(op: F) -> std::result::Result<T, Fault>
where
    F: FnOnce() -> T,
{
    let scope = FaultScope::enter();
    let raw = op();
    scope.finish(raw)
}

/// Whether a capture scope is installed on the current thread.
pub fn is_capturing() -> bool {
    HANDLERS.with(|handlers| !handlers.borrow().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_without_fault_returns_raw_result() {
        let result = capture(|| 42);
        assert_eq!(result, Ok(42));
        assert!(!is_capturing());
    }

    #[test]
    fn test_first_fault_wins() {
        let fault = capture(|| {
            report(1, "first");
            report(2, "second");
        })
        .unwrap_err();

        assert_eq!(fault.code(), 1);
        assert_eq!(fault.message(), "first");
    }

    #[test]
    fn test_fault_records_caller_location() {
        let line = line!() + 2;
        let fault = capture(|| {
            report(5, "located");
        })
        .unwrap_err();

        assert_eq!(fault.file(), file!());
        assert_eq!(fault.line(), line);
    }

    #[test]
    fn test_fault_supersedes_raw_error() {
        let result: std::result::Result<std::result::Result<(), &str>, Fault> = capture(|| {
            report(9, "out-of-band");
            Err("in-band")
        });
        assert_eq!(result.unwrap_err().message(), "out-of-band");
    }

    #[test]
    fn test_scope_restored_after_normal_error() {
        let result: std::result::Result<std::result::Result<(), &str>, Fault> =
            capture(|| Err("in-band"));
        assert_eq!(result, Ok(Err("in-band")));
        assert!(!is_capturing());
    }

    #[test]
    fn test_scope_restored_after_panic() {
        let outcome = std::panic::catch_unwind(|| {
            let _ = capture::<(), _>(|| panic!("boom"));
        });
        assert!(outcome.is_err());
        assert!(!is_capturing());
    }

    #[test]
    fn test_nested_scopes_restore_outer_handler() {
        let outer = capture(|| {
            let inner = capture(|| report(2, "inner"));
            assert_eq!(inner.unwrap_err().message(), "inner");
            assert!(is_capturing());

            report(3, "outer");
        });
        assert_eq!(outer.unwrap_err().code(), 3);
        assert!(!is_capturing());
    }

    #[test]
    fn test_inner_fault_stays_with_inner_scope() {
        let outer = capture(|| capture(|| report(2, "inner")));

        let inner = outer.expect("inner fault leaked into the outer scope");
        assert_eq!(inner.unwrap_err().code(), 2);
        assert!(!is_capturing());
    }

    #[test]
    fn test_outer_fault_kept_across_inner_scope() {
        let outer = capture(|| {
            report(1, "outer first");
            let _ = capture(|| report(2, "inner"));
            report(3, "outer later");
        });

        assert_eq!(outer.unwrap_err().message(), "outer first");
        assert!(!is_capturing());
    }

    #[test]
    fn test_fresh_scope_starts_clear() {
        let _ = capture(|| report(1, "stale"));
        assert_eq!(capture(|| "clean"), Ok("clean"));
    }

    #[test]
    fn test_report_without_scope_does_not_panic() {
        report(0, "nobody listening");
        assert!(!is_capturing());
    }

    #[test]
    fn test_report_io_keeps_os_code() {
        let err = std::io::Error::from_raw_os_error(104);
        let fault = capture(|| report_io(&err)).unwrap_err();
        assert_eq!(fault.code(), 104);
        assert_eq!(fault.message(), err.to_string());
    }

    #[test]
    fn test_fault_display_is_message() {
        let fault = Fault::new(7, "Connection reset", "x.rs", 1);
        assert_eq!(fault.to_string(), "Connection reset");
    }
}
