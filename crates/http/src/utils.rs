//! Utility macros shared by the codec and connection layers.

/// Returns early with an error if a condition is not met.
///
/// Like `assert!`, but returns `Err($error.into())` instead of panicking, which keeps the
/// parsers panic-free on hostile input.
///
/// # Example
///
/// ```ignore
/// ensure!(line.is_empty(), ParseError::malformed_chunk("missing CRLF after chunk data"));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error.into());
        }
    };
}

pub(crate) use ensure;
