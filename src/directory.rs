//! Workspace customer directory and debounced search.
//!
//! The directory is an immutable in-memory index of the workspace's
//! customers, shared by reference throughout a session. Search is a plain
//! substring filter; [`DebouncedSearch`] wraps it so that rapid successive
//! queries settle on the latest one instead of racing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::model::{Customer, CustomerId};

/// Read-only customer index for one workspace.
#[derive(Debug, Default)]
pub struct CustomerDirectory {
    by_id: HashMap<CustomerId, Arc<Customer>>,
}

impl CustomerDirectory {
    pub fn new(customers: impl IntoIterator<Item = Customer>) -> Self {
        Self {
            by_id: customers
                .into_iter()
                .map(|customer| (customer.id, Arc::new(customer)))
                .collect(),
        }
    }

    pub fn get(&self, id: CustomerId) -> Option<Arc<Customer>> {
        self.by_id.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Case-insensitive substring match on customer name or address,
    /// sorted by name. A blank query returns the whole directory.
    pub fn search(&self, query: &str) -> Vec<Arc<Customer>> {
        let needle = query.trim().to_lowercase();
        let mut hits: Vec<Arc<Customer>> = self
            .by_id
            .values()
            .filter(|customer| {
                needle.is_empty()
                    || customer.name.to_lowercase().contains(&needle)
                    || customer.address.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.0.cmp(&b.id.0)));
        hits
    }
}

/// How long a search waits for the query to settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebounceProfile {
    #[default]
    Standard,
    /// Slower devices get a longer settle window.
    Constrained,
}

impl DebounceProfile {
    pub fn delay(self) -> Duration {
        match self {
            DebounceProfile::Standard => Duration::from_millis(300),
            DebounceProfile::Constrained => Duration::from_millis(500),
        }
    }
}

/// Debounced directory search: every call stamps a new generation, waits
/// out the settle delay, and only the call still holding the latest
/// generation produces results. Superseded calls resolve to `None`.
#[derive(Debug)]
pub struct DebouncedSearch {
    directory: Arc<CustomerDirectory>,
    delay: Duration,
    generation: AtomicU64,
}

impl DebouncedSearch {
    pub fn new(directory: Arc<CustomerDirectory>, profile: DebounceProfile) -> Self {
        Self {
            directory,
            delay: profile.delay(),
            generation: AtomicU64::new(0),
        }
    }

    /// Runs the query after the settle delay, unless a newer call has
    /// arrived in the meantime.
    pub async fn search(&self, query: &str) -> Option<Vec<Arc<Customer>>> {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        if self.generation.load(Ordering::SeqCst) != ticket {
            return None;
        }
        Some(self.directory.search(query))
    }
}
