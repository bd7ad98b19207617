//! Logging shims.
//!
//! With the `log` feature enabled these forward to the `log` crate. Without it the arguments are
//! still type-checked through `format_args!`, but nothing is emitted and no `log` dependency is
//! pulled in.

#[cfg(feature = "log")]
macro_rules! error {
    ($($t:tt)*) => {{ log::error!(target: "qtrickle", $($t)*); }};
}

#[cfg(feature = "log")]
macro_rules! warn {
    ($($t:tt)*) => {{ log::warn!(target: "qtrickle", $($t)*); }};
}

#[cfg(feature = "log")]
macro_rules! info {
    ($($t:tt)*) => {{ log::info!(target: "qtrickle", $($t)*); }};
}

#[cfg(feature = "log")]
macro_rules! debug {
    ($($t:tt)*) => {{ log::debug!(target: "qtrickle", $($t)*); }};
}

#[cfg(feature = "log")]
macro_rules! trace {
    ($($t:tt)*) => {{ log::trace!(target: "qtrickle", $($t)*); }};
}

#[cfg(not(feature = "log"))]
macro_rules! error {
    ($($t:tt)*) => {{ let _ = format_args!($($t)*); }};
}

#[cfg(not(feature = "log"))]
macro_rules! warn {
    ($($t:tt)*) => {{ let _ = format_args!($($t)*); }};
}

#[cfg(not(feature = "log"))]
macro_rules! info {
    ($($t:tt)*) => {{ let _ = format_args!($($t)*); }};
}

#[cfg(not(feature = "log"))]
macro_rules! debug {
    ($($t:tt)*) => {{ let _ = format_args!($($t)*); }};
}

#[cfg(not(feature = "log"))]
macro_rules! trace {
    ($($t:tt)*) => {{ let _ = format_args!($($t)*); }};
}
