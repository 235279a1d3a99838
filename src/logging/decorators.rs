//! logging::decorators
//!
//! Wrap a function so its inputs or its result are logged.
//!
//! The wrapped function keeps its signature: arguments go in unchanged, the
//! return value comes out unchanged, and a panic unwinds through the wrapper
//! untouched. Functions of several arguments take a tuple.
//!
//! # Example
//!
//! ```
//! use jobhook::logging::{log_after, log_before};
//!
//! let add = log_after("add", log_before("add", |(a, b): (i32, i32)| a + b));
//! assert_eq!(add((2, 3)), 5);
//! // DEBUG Entered add with args ( (2, 3) )
//! // DEBUG Exited add(...) with value: 5
//! ```

use std::fmt::Debug;

use tracing::Level;

use super::emit;

/// Log the arguments at `DEBUG` before every call.
pub fn log_before<A, R, F>(name: &str, func: F) -> impl Fn(A) -> R
where
    A: Debug,
    F: Fn(A) -> R,
{
    log_before_at(Level::DEBUG, name, func)
}

/// Log the arguments at `level` before every call.
pub fn log_before_at<A, R, F>(level: Level, name: &str, func: F) -> impl Fn(A) -> R
where
    A: Debug,
    F: Fn(A) -> R,
{
    let name = name.to_string();
    move |args: A| {
        emit(level, &format!("Entered {} with args ( {:?} )", name, args));
        func(args)
    }
}

/// Log the return value at `DEBUG` after every call.
pub fn log_after<A, R, F>(name: &str, func: F) -> impl Fn(A) -> R
where
    R: Debug,
    F: Fn(A) -> R,
{
    log_after_at(Level::DEBUG, name, func)
}

/// Log the return value at `level` after every call.
pub fn log_after_at<A, R, F>(level: Level, name: &str, func: F) -> impl Fn(A) -> R
where
    R: Debug,
    F: Fn(A) -> R,
{
    let name = name.to_string();
    move |args: A| {
        let value = func(args);
        emit(level, &format!("Exited {}(...) with value: {:?}", name, value));
        value
    }
}
