//! Opaque handles minted by a [`Backend`](crate::Backend)
//!
//! Handles are cheap to clone and carry a backend specific token next to
//! the human readable part used for display.

use core::fmt;
use std::sync::Arc;

/// A logical namespace grouping related tasks and events
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Domain {
    name: Arc<str>,
    token: u64,
}

impl Domain {
    /// Build a domain handle; called by backends
    pub fn from_raw(name: impl Into<Arc<str>>, token: u64) -> Self {
        Self {
            name: name.into(),
            token,
        }
    }

    /// Domain name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backend token
    #[inline]
    pub fn token(&self) -> u64 {
        self.token
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Identity of a task instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id {
    d1: u64,
    d2: u64,
}

impl Id {
    /// Build an id from its two words
    pub const fn new(d1: u64, d2: u64) -> Self {
        Self { d1, d2 }
    }

    /// First word
    #[inline]
    pub const fn d1(&self) -> u64 {
        self.d1
    }

    /// Second word
    #[inline]
    pub const fn d2(&self) -> u64 {
        self.d2
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.d1, self.d2)
    }
}

/// Interned region name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StringHandle {
    text: Arc<str>,
    token: u64,
}

impl StringHandle {
    /// Build a string handle; called by backends
    pub fn from_raw(text: impl Into<Arc<str>>, token: u64) -> Self {
        Self {
            text: text.into(),
            token,
        }
    }

    /// The interned text
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Backend token
    #[inline]
    pub fn token(&self) -> u64 {
        self.token
    }
}

impl fmt::Display for StringHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Backend event created for an [`Event`](crate::Event) region
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventHandle {
    name: Arc<str>,
    token: u64,
}

impl EventHandle {
    /// Build an event handle; called by backends
    pub fn from_raw(name: impl Into<Arc<str>>, token: u64) -> Self {
        Self {
            name: name.into(),
            token,
        }
    }

    /// Event name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backend token
    #[inline]
    pub fn token(&self) -> u64 {
        self.token
    }
}

/// Backend processor-trace region created for a [`PtRegion`](crate::PtRegion)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PtRegionHandle {
    name: Arc<str>,
    token: u64,
}

impl PtRegionHandle {
    /// Build a pt-region handle; called by backends
    pub fn from_raw(name: impl Into<Arc<str>>, token: u64) -> Self {
        Self {
            name: name.into(),
            token,
        }
    }

    /// Region name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backend token
    #[inline]
    pub fn token(&self) -> u64 {
        self.token
    }
}
