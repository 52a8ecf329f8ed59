//! Handle interning shared by the bundled backends

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::handles::{Domain, EventHandle, Id, PtRegionHandle, StringHandle};

/// Mints and interns backend handles
///
/// Domains and string handles are interned by name, so asking twice for
/// the same text yields equal handles. Task ids are unique per registry
/// and start at `(1, 0)`.
pub struct HandleRegistry {
    default_domain: Arc<str>,
    domains: Mutex<HashMap<Arc<str>, Domain>>,
    strings: Mutex<HashMap<Arc<str>, StringHandle>>,
    next_token: AtomicU64,
    next_id: AtomicU64,
}

impl HandleRegistry {
    /// Create a registry whose unnamed domain is `default_domain`
    pub fn new(default_domain: &str) -> Self {
        Self {
            default_domain: Arc::from(default_domain),
            domains: Mutex::new(HashMap::new()),
            strings: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
            next_id: AtomicU64::new(1),
        }
    }

    /// Name given to domains created without one
    pub fn default_domain(&self) -> &str {
        &self.default_domain
    }

    /// Look up or create a domain
    pub fn domain(&self, name: Option<&str>) -> Domain {
        let name = name.unwrap_or(&self.default_domain);
        let mut domains = self.domains.lock();
        if let Some(domain) = domains.get(name) {
            return domain.clone();
        }
        let key: Arc<str> = Arc::from(name);
        let domain = Domain::from_raw(key.clone(), self.token());
        domains.insert(key, domain.clone());
        domain
    }

    /// Mint the next task id
    pub fn id(&self) -> Id {
        Id::new(self.next_id.fetch_add(1, Ordering::Relaxed), 0)
    }

    /// Look up or create a string handle
    pub fn string(&self, text: &str) -> StringHandle {
        let mut strings = self.strings.lock();
        if let Some(handle) = strings.get(text) {
            return handle.clone();
        }
        let key: Arc<str> = Arc::from(text);
        let handle = StringHandle::from_raw(key.clone(), self.token());
        strings.insert(key, handle.clone());
        handle
    }

    /// Create a fresh event handle
    pub fn event(&self, name: &str) -> EventHandle {
        EventHandle::from_raw(name, self.token())
    }

    /// Create a fresh processor-trace region handle
    pub fn pt_region(&self, name: &str) -> PtRegionHandle {
        PtRegionHandle::from_raw(name, self.token())
    }

    fn token(&self) -> u64 {
        self.next_token.fetch_add(1, Ordering::Relaxed)
    }
}

impl core::fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("default_domain", &self.default_domain)
            .field("domains", &self.domains.lock().len())
            .field("strings", &self.strings.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domains_are_interned() {
        let registry = HandleRegistry::new("ittmark");
        let a = registry.domain(None);
        let b = registry.domain(Some("ittmark"));
        assert_eq!(a, b);
        assert_ne!(registry.domain(Some("render")), a);
    }

    #[test]
    fn test_ids_are_sequential() {
        let registry = HandleRegistry::new("ittmark");
        assert_eq!(registry.id(), Id::new(1, 0));
        assert_eq!(registry.id(), Id::new(2, 0));
    }

    #[test]
    fn test_strings_are_interned() {
        let registry = HandleRegistry::new("ittmark");
        let a = registry.string("frame");
        assert_eq!(registry.string("frame"), a);
        assert_eq!(a.as_str(), "frame");
    }
}
