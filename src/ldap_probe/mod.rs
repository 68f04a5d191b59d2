pub mod attributes;
pub mod client;
pub mod error;
pub mod probe;
pub mod result;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod fake;

use std::fmt::Write;

/// Render an error with its whole `source()` chain on one line.
pub(crate) fn report(mut err: &(dyn std::error::Error + 'static)) -> String {
    let mut s = format!("{}", err);
    while let Some(src) = err.source() {
        let _ = write!(s, ": {}", src);
        err = src;
    }
    s
}
