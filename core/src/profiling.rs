//! Optional Tracy instrumentation.
//!
//! With the `profiling` feature enabled these macros forward to
//! [`tracy_client`]; without it they expand to nothing (or to a discarded
//! expression, so arguments stay "used").
//!
//! ```ignore
//! use ember_core::profiling::{frame_mark, profile_scope, profile_scope_dynamic};
//!
//! fn compile_and_execute(pass_names: &[String]) {
//!     profile_scope!("compile_and_execute");
//!     for name in pass_names {
//!         profile_scope_dynamic!(name.as_str());
//!     }
//!     frame_mark!();
//! }
//! ```

#[cfg(feature = "profiling")]
pub use tracy_client::{self, Client, frame_mark as tracy_frame_mark, span};

/// Mark the end of a frame.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! frame_mark {
    () => {
        $crate::profiling::tracy_frame_mark()
    };
}

/// Mark the end of a frame (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! frame_mark {
    () => {};
}

/// Open a span with a static name that ends with the enclosing scope.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

/// Open a span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Open a span for the enclosing function.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_function {
    () => {
        let _profile_span = $crate::profiling::span!();
    };
}

/// Open a function span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_function {
    () => {};
}

/// Open a span whose name is only known at runtime, such as a pass name.
///
/// The name is copied by Tracy, so prefer [`profile_scope!`] for literals.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope_dynamic {
    ($name:expr) => {
        let _profile_span = $crate::profiling::Client::running()
            .map(|c| c.span_alloc(Some($name), "", file!(), line!(), 0));
    };
}

/// Open a runtime-named span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope_dynamic {
    ($name:expr) => {
        let _ = $name;
    };
}

/// Send a message to Tracy's message log.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_message {
    ($msg:expr) => {
        if let Some(client) = $crate::profiling::Client::running() {
            client.message($msg, 0);
        }
    };
}

/// Send a message (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_message {
    ($msg:expr) => {
        let _ = $msg;
    };
}

pub use frame_mark;
pub use profile_function;
pub use profile_message;
pub use profile_scope;
pub use profile_scope_dynamic;

#[cfg(test)]
mod tests {
    #[test]
    fn test_macros_compile() {
        frame_mark!();
        profile_scope!("test_scope");
        profile_scope_dynamic!("dynamic_scope");
        profile_function!();
        profile_message!("test message");
    }
}
