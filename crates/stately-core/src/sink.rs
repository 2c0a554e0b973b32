//! # Ambient error sink
//!
//! A listener failure is always reported somewhere. If the notifier has an
//! error handler, it gets the failure; otherwise the failure goes to the
//! ambient sink of the current thread.
//!
//! The sink is thread-local state with two layers:
//!
//! - a base sink, replaced with [`set_default_error_sink`] (the built-in one
//!   logs through `log::error!`);
//! - a stack of scoped overrides pushed with [`with_error_sink`], which is
//!   what tests use to capture failures:
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use stately_core::*;
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let notifier = StateNotifier::new(0);
//! notifier
//!     .subscribe_with(|v: &i32| if *v > 0 { anyhow::bail!("boom") } else { Ok(()) }, false)
//!     .unwrap();
//!
//! let result = with_error_sink(
//!     {
//!         let seen = seen.clone();
//!         move |err, _| seen.borrow_mut().push(err.to_string())
//!     },
//!     || notifier.set_state(1),
//! );
//!
//! assert!(result.is_err());
//! assert_eq!(*seen.borrow(), vec!["boom".to_string()]);
//! ```

use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::RefCell;
use std::rc::Rc;

pub type ErrorSink = Rc<dyn Fn(&anyhow::Error, &Backtrace)>;

thread_local! {
    static BASE_SINK: RefCell<Option<ErrorSink>> = const { RefCell::new(None) };
    static SINK_STACK: RefCell<Vec<ErrorSink>> = const { RefCell::new(Vec::new()) };
}

/// Replaces this thread's base sink. Returns the previous one, if any was
/// installed.
pub fn set_default_error_sink(
    sink: impl Fn(&anyhow::Error, &Backtrace) + 'static,
) -> Option<ErrorSink> {
    BASE_SINK.with(|base| base.borrow_mut().replace(Rc::new(sink)))
}

/// Restores the built-in logging sink as this thread's base sink.
pub fn reset_default_error_sink() {
    BASE_SINK.with(|base| base.borrow_mut().take());
}

/// Runs `f` with `sink` as the innermost sink of this thread.
pub fn with_error_sink<R>(
    sink: impl Fn(&anyhow::Error, &Backtrace) + 'static,
    f: impl FnOnce() -> R,
) -> R {
    // Pops on unwind too.
    struct Guard;
    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_STACK.with(|st| {
                st.borrow_mut().pop();
            });
        }
    }
    SINK_STACK.with(|st| st.borrow_mut().push(Rc::new(sink)));
    let _guard = Guard;
    f()
}

/// Hands a failure to the innermost sink of this thread.
pub fn report_error(error: &anyhow::Error, backtrace: &Backtrace) {
    let sink = SINK_STACK
        .with(|st| st.borrow().last().cloned())
        .or_else(|| BASE_SINK.with(|base| base.borrow().clone()));
    match sink {
        Some(sink) => sink(error, backtrace),
        None => log_error(error, backtrace),
    }
}

fn log_error(error: &anyhow::Error, backtrace: &Backtrace) {
    if backtrace.status() == BacktraceStatus::Captured {
        log::error!("unhandled state listener error: {error:#}\n{backtrace}");
    } else {
        log::error!("unhandled state listener error: {error:#}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(
        log: &Rc<RefCell<Vec<String>>>,
        tag: &'static str,
    ) -> impl Fn(&anyhow::Error, &Backtrace) + 'static {
        let log = log.clone();
        move |err: &anyhow::Error, _: &Backtrace| log.borrow_mut().push(format!("{tag}: {err}"))
    }

    #[test]
    fn innermost_override_wins() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let err = anyhow::anyhow!("e");
        let bt = Backtrace::disabled();

        with_error_sink(capture(&log, "outer"), || {
            report_error(&err, &bt);
            with_error_sink(capture(&log, "inner"), || report_error(&err, &bt));
            report_error(&err, &bt);
        });

        assert_eq!(*log.borrow(), vec!["outer: e", "inner: e", "outer: e"]);
    }

    #[test]
    fn base_sink_is_replaceable_and_resettable() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let err = anyhow::anyhow!("e");
        let bt = Backtrace::disabled();

        assert!(set_default_error_sink(capture(&log, "base")).is_none());
        report_error(&err, &bt);
        with_error_sink(capture(&log, "scoped"), || report_error(&err, &bt));
        reset_default_error_sink();
        report_error(&err, &bt);

        assert_eq!(*log.borrow(), vec!["base: e", "scoped: e"]);
    }

    #[test]
    fn override_is_popped_on_unwind() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            with_error_sink(capture(&log, "lost"), || panic!("unwind"))
        }));
        assert!(outcome.is_err());

        with_error_sink(capture(&log, "kept"), || {
            report_error(&anyhow::anyhow!("e"), &Backtrace::disabled())
        });
        assert_eq!(*log.borrow(), vec!["kept: e"]);
    }
}
