use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::identity::certs::TrustedCertificate;

/// Process-lifetime store of certificates that already passed chain and issuer checks.
///
/// Entries are never evicted. Concurrent misses for the same name may both
/// insert; the values are equivalent so the last write wins.
#[derive(Default)]
pub struct CertificateCache {
    entries: RwLock<HashMap<String, Arc<TrustedCertificate>>>,
}

impl CertificateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<TrustedCertificate>> {
        self.entries.read().get(name).cloned()
    }

    pub fn put(&self, name: impl Into<String>, cert: Arc<TrustedCertificate>) {
        self.entries.write().insert(name.into(), cert);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drops every entry so the next request for each name re-fetches and re-validates.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
