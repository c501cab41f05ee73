//! Macros for building argument lists and logging them.
//!
//! Every argument goes through `Value::from`, so plain Rust values can be
//! mixed freely.
//!
//! # Examples
//!
//! ```
//! use debug_console::{args, info, Console, Value};
//!
//! let mut console = Console::new();
//!
//! let values = args!["user", 42, true];
//! assert_eq!(values[1], Value::Int(42));
//!
//! info!(console, "cache hit ratio", 0.93);
//! assert_eq!(console.store().log().len(), 1);
//! ```

/// Build a `Vec<Value>` from heterogeneous arguments.
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        vec![$($crate::Value::from($arg)),+]
    };
}

/// Log the arguments with `Console::log`.
///
/// ```
/// # use debug_console::Console;
/// use debug_console::log;
/// let mut console = Console::new();
/// log!(console, "rows", 12);
/// ```
#[macro_export]
macro_rules! log {
    ($console:expr, $($arg:expr),+ $(,)?) => {
        $console.log($crate::args![$($arg),+])
    };
}

#[macro_export]
macro_rules! info {
    ($console:expr, $($arg:expr),+ $(,)?) => {
        $console.info($crate::args![$($arg),+])
    };
}

#[macro_export]
macro_rules! warn {
    ($console:expr, $($arg:expr),+ $(,)?) => {
        $console.warn($crate::args![$($arg),+])
    };
}

/// Log the arguments with `Console::error`.
///
/// ```
/// # use debug_console::Console;
/// use debug_console::error;
/// let mut console = Console::new();
/// error!(console, "payment failed:", "card declined");
/// assert_eq!(console.store().log()[0].args.len(), 2);
/// ```
#[macro_export]
macro_rules! error {
    ($console:expr, $($arg:expr),+ $(,)?) => {
        $console.error($crate::args![$($arg),+])
    };
}
