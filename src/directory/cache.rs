use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use super::{Directory, DirectoryAccount, DirectoryRecord};

/// Cached front of a [`Directory`]. Found records live for the hit TTL;
/// misses are remembered for a shorter while so unknown addresses don't hit
/// the server on every request. A failed lookup reads as "not found" but is
/// not cached.
#[derive(Clone)]
pub struct DirectoryLookup {
    directory: Arc<dyn Directory>,
    hits: Cache<String, DirectoryRecord>,
    misses: Cache<String, ()>,
}

impl DirectoryLookup {
    pub fn new(directory: Arc<dyn Directory>, hit_ttl: Duration, miss_ttl: Duration) -> Self {
        Self {
            directory,
            hits: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(hit_ttl)
                .build(),
            misses: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(miss_ttl)
                .build(),
        }
    }

    pub fn directory(&self) -> &Arc<dyn Directory> {
        &self.directory
    }

    pub async fn fetch_user_details(
        &self,
        email: &str,
        force_refresh: bool,
    ) -> Option<DirectoryRecord> {
        let key = email.to_lowercase();
        if !force_refresh {
            if let Some(record) = self.hits.get(&key).await {
                return Some(record);
            }
            if self.misses.get(&key).await.is_some() {
                return None;
            }
        }

        let found = match self.directory.search(email, 1, false).await {
            Ok(records) => records.into_iter().next(),
            Err(e) => {
                // An outage says nothing about the address; leave both caches alone
                log::warn!("Directory lookup for {} failed: {}", email, e);
                return None;
            }
        };

        match found {
            Some(record) => {
                self.misses.invalidate(&key).await;
                self.hits.insert(key, record.clone()).await;
                Some(record)
            }
            None => {
                self.hits.invalidate(&key).await;
                self.misses.insert(key, ()).await;
                None
            }
        }
    }

    /// Uncached search; errors are logged and yield nothing.
    pub async fn search_users(
        &self,
        query: &str,
        limit: usize,
        autocomplete: bool,
    ) -> Vec<DirectoryRecord> {
        match self.directory.search(query, limit, autocomplete).await {
            Ok(records) => records,
            Err(e) => {
                log::warn!("Directory search for {:?} failed: {}", query, e);
                Vec::new()
            }
        }
    }

    pub async fn authenticate(&self, login: &str, password: &str) -> Option<DirectoryAccount> {
        match self.directory.authenticate(login, password).await {
            Ok(account) => account,
            Err(e) => {
                log::warn!("Directory authentication for {} failed: {}", login, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::directory::DirectoryError;

    struct CountingDirectory {
        calls: AtomicUsize,
        record: Option<DirectoryRecord>,
    }

    #[async_trait]
    impl Directory for CountingDirectory {
        async fn search(
            &self,
            _query: &str,
            _limit: usize,
            _autocomplete: bool,
        ) -> Result<Vec<DirectoryRecord>, DirectoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.record.clone().into_iter().collect())
        }

        async fn authenticate(
            &self,
            _login: &str,
            _password: &str,
        ) -> Result<Option<DirectoryAccount>, DirectoryError> {
            Err(DirectoryError::Fixture("unreachable".to_string()))
        }
    }

    fn lookup(record: Option<DirectoryRecord>) -> (DirectoryLookup, Arc<CountingDirectory>) {
        let directory = Arc::new(CountingDirectory {
            calls: AtomicUsize::new(0),
            record,
        });
        let lookup = DirectoryLookup::new(
            directory.clone(),
            Duration::from_secs(3600),
            Duration::from_secs(60),
        );
        (lookup, directory)
    }

    #[tokio::test]
    async fn test_hits_are_cached() {
        let record = DirectoryRecord {
            mail: "peter@mozilla.com".to_string(),
            ..Default::default()
        };
        let (lookup, directory) = lookup(Some(record.clone()));

        assert_eq!(lookup.fetch_user_details("peter@mozilla.com", false).await, Some(record.clone()));
        assert_eq!(lookup.fetch_user_details("Peter@mozilla.com", false).await, Some(record));
        assert_eq!(directory.calls.load(Ordering::SeqCst), 1);

        lookup.fetch_user_details("peter@mozilla.com", true).await;
        assert_eq!(directory.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_misses_are_remembered() {
        let (lookup, directory) = lookup(None);

        assert!(lookup.fetch_user_details("ghost@mozilla.com", false).await.is_none());
        assert!(lookup.fetch_user_details("ghost@mozilla.com", false).await.is_none());
        assert_eq!(directory.calls.load(Ordering::SeqCst), 1);
    }

    struct FlakyDirectory {
        down: AtomicBool,
        calls: AtomicUsize,
        record: DirectoryRecord,
    }

    #[async_trait]
    impl Directory for FlakyDirectory {
        async fn search(
            &self,
            _query: &str,
            _limit: usize,
            _autocomplete: bool,
        ) -> Result<Vec<DirectoryRecord>, DirectoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.down.load(Ordering::SeqCst) {
                return Err(DirectoryError::Fixture("server down".to_string()));
            }
            Ok(vec![self.record.clone()])
        }

        async fn authenticate(
            &self,
            _login: &str,
            _password: &str,
        ) -> Result<Option<DirectoryAccount>, DirectoryError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_outage_does_not_poison_the_cache() {
        let record = DirectoryRecord {
            mail: "peter@mozilla.com".to_string(),
            ..Default::default()
        };
        let directory = Arc::new(FlakyDirectory {
            down: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            record: record.clone(),
        });
        let lookup = DirectoryLookup::new(
            directory.clone(),
            Duration::from_secs(3600),
            Duration::from_secs(60),
        );

        assert_eq!(lookup.fetch_user_details("peter@mozilla.com", false).await, Some(record.clone()));

        directory.down.store(true, Ordering::SeqCst);
        assert_eq!(lookup.fetch_user_details("peter@mozilla.com", true).await, None);
        // The earlier hit survives the failed refresh
        assert_eq!(lookup.fetch_user_details("peter@mozilla.com", false).await, Some(record.clone()));

        // A failure for an uncached address is not remembered as a miss
        assert_eq!(lookup.fetch_user_details("bob@mozilla.com", false).await, None);
        directory.down.store(false, Ordering::SeqCst);
        let calls = directory.calls.load(Ordering::SeqCst);
        assert!(lookup.fetch_user_details("bob@mozilla.com", false).await.is_some());
        assert_eq!(directory.calls.load(Ordering::SeqCst), calls + 1);
    }

    #[tokio::test]
    async fn test_authentication_failure_is_swallowed() {
        let (lookup, _) = lookup(None);
        assert!(lookup.authenticate("peter", "secret").await.is_none());
    }
}
