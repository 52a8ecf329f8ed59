//! Call-site capture used to synthesize default region names

use core::fmt;
use core::panic::Location;

/// File and line of the code that created a region
///
/// Captured through `#[track_caller]`: every factory in this crate is
/// annotated, so the location recorded is the first frame outside the
/// crate. Use the [`callsite!`](crate::callsite) macro to pin an exact
/// source position instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallSite {
    filename: &'static str,
    line: u32,
}

impl CallSite {
    /// Build a call site from a source path and line
    ///
    /// Only the basename of `file` is kept.
    pub fn new(file: &'static str, line: u32) -> Self {
        Self {
            filename: basename(file),
            line,
        }
    }

    /// Capture the location of the caller
    #[track_caller]
    pub fn caller() -> Self {
        Self::from_location(Location::caller())
    }

    /// Build a call site from a captured location
    pub fn from_location(location: &'static Location<'static>) -> Self {
        Self::new(location.file(), location.line())
    }

    /// File basename
    pub fn filename(&self) -> &'static str {
        self.filename
    }

    /// Line number
    pub fn lineno(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.filename, self.line)
    }
}

fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
