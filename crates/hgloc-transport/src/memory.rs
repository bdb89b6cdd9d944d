//! In-process object store.
//!
//! Backs tests and offline runs. Every call is counted so callers can assert
//! that a code path made no remote requests, and failures can be injected per
//! key prefix. [`MemoryObjectStore::public_gateway`] exposes public-read
//! objects over the [`PublicHttp`] seam using the same virtual-hosted URLs
//! [`public_url`](crate::http::public_url) produces.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{HttpError, StoreError};
use crate::http::PublicHttp;
use crate::object_store::{ListPage, ObjectHead, ObjectStore, ObjectSummary, PutOptions};

const PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: Option<String>,
    public_read: bool,
}

/// Per-operation call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub head: u64,
    pub get: u64,
    pub put: u64,
    pub list: u64,
    pub presign: u64,
    pub probe: u64,
    pub public_get: u64,
}

impl CallCounts {
    /// Every request, authenticated or anonymous.
    pub fn total(&self) -> u64 {
        self.head + self.get + self.put + self.list + self.presign + self.probe + self.public_get
    }

    /// Requests that move object bodies.
    pub fn transfers(&self) -> u64 {
        self.get + self.put + self.public_get
    }
}

#[derive(Default)]
struct Counters {
    head: AtomicU64,
    get: AtomicU64,
    put: AtomicU64,
    list: AtomicU64,
    presign: AtomicU64,
    probe: AtomicU64,
    public_get: AtomicU64,
}

pub struct MemoryObjectStore {
    bucket: String,
    host: String,
    objects: Mutex<BTreeMap<String, StoredObject>>,
    counters: Counters,
    unavailable: AtomicBool,
    failing_put_prefixes: Mutex<Vec<String>>,
}

impl MemoryObjectStore {
    /// Store for `bucket`, served publicly at `https://{bucket}.s3.amazonaws.com/`.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self::with_host(bucket, "s3.amazonaws.com")
    }

    /// Store whose public gateway answers for `https://{bucket}.{host}/`.
    pub fn with_host(bucket: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            host: host.into(),
            objects: Mutex::new(BTreeMap::new()),
            counters: Counters::default(),
            unavailable: AtomicBool::new(false),
            failing_put_prefixes: Mutex::new(Vec::new()),
        }
    }

    /// Make every call fail with a transport error, simulating an outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make puts under `prefix` fail with a service error.
    pub fn fail_puts_under(&self, prefix: impl Into<String>) {
        self.failing_put_prefixes.lock().push(prefix.into());
    }

    pub fn clear_failures(&self) {
        self.failing_put_prefixes.lock().clear();
        self.set_unavailable(false);
    }

    /// Insert an object directly, bypassing counters and failure injection.
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Vec<u8>>, public_read: bool) {
        self.objects.lock().insert(
            key.into(),
            StoredObject {
                data: data.into(),
                content_type: None,
                public_read,
            },
        );
    }

    pub fn remove(&self, key: &str) -> bool {
        self.objects.lock().remove(key).is_some()
    }

    /// Object body without touching the counters.
    pub fn peek(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().get(key).map(|o| o.data.clone())
    }

    pub fn is_public(&self, key: &str) -> Option<bool> {
        self.objects.lock().get(key).map(|o| o.public_read)
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().keys().cloned().collect()
    }

    pub fn call_counts(&self) -> CallCounts {
        let c = &self.counters;
        CallCounts {
            head: c.head.load(Ordering::Relaxed),
            get: c.get.load(Ordering::Relaxed),
            put: c.put.load(Ordering::Relaxed),
            list: c.list.load(Ordering::Relaxed),
            presign: c.presign.load(Ordering::Relaxed),
            probe: c.probe.load(Ordering::Relaxed),
            public_get: c.public_get.load(Ordering::Relaxed),
        }
    }

    pub fn reset_counts(&self) {
        let c = &self.counters;
        for counter in [&c.head, &c.get, &c.put, &c.list, &c.presign, &c.probe, &c.public_get] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Anonymous HTTP view of this store.
    pub fn public_gateway(self: &Arc<Self>) -> MemoryPublicGateway {
        MemoryPublicGateway {
            store: Arc::clone(self),
        }
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("memory store marked unavailable".to_string()));
        }
        Ok(())
    }

    /// Key addressed by a virtual-hosted URL for this bucket, if any.
    fn key_for_url(&self, url: &str) -> Option<String> {
        let rest = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))?;
        let (host, path) = rest.split_once('/')?;
        let expected_host = format!("{}.{}", self.bucket, self.host);
        if host != expected_host {
            return None;
        }
        Some(path.to_string())
    }
}

impl ObjectStore for MemoryObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn head(&self, key: &str) -> Result<ObjectHead, StoreError> {
        self.counters.head.fetch_add(1, Ordering::Relaxed);
        self.check_available()?;
        self.objects
            .lock()
            .get(key)
            .map(|o| ObjectHead {
                size: o.data.len() as u64,
                content_type: o.content_type.clone(),
            })
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.counters.get.fetch_add(1, Ordering::Relaxed);
        self.check_available()?;
        self.objects
            .lock()
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn put(&self, key: &str, body: Vec<u8>, options: &PutOptions) -> Result<(), StoreError> {
        self.counters.put.fetch_add(1, Ordering::Relaxed);
        self.check_available()?;
        if self
            .failing_put_prefixes
            .lock()
            .iter()
            .any(|prefix| key.starts_with(prefix.as_str()))
        {
            return Err(StoreError::Service(format!("injected put failure for {}", key)));
        }
        self.objects.lock().insert(
            key.to_string(),
            StoredObject {
                data: body,
                content_type: options.content_type.clone(),
                public_read: options.public_read,
            },
        );
        Ok(())
    }

    fn list_page(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        self.counters.list.fetch_add(1, Ordering::Relaxed);
        self.check_available()?;

        let objects = self.objects.lock();
        let mut page = ListPage::default();
        let mut emitted = 0;
        // Entries (objects and rolled-up prefixes) in key order; the token is the
        // last entry returned.
        let mut last_entry: Option<String> = None;

        for (key, obj) in objects.range(prefix.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }
            let entry = match delimiter {
                Some(delim) => match key[prefix.len()..].find(delim) {
                    Some(idx) => key[..prefix.len() + idx + delim.len()].to_string(),
                    None => key.clone(),
                },
                None => key.clone(),
            };
            if let Some(token) = continuation_token {
                if entry.as_str() <= token {
                    continue;
                }
            }
            if last_entry.as_deref() == Some(entry.as_str()) {
                continue;
            }
            if emitted == PAGE_SIZE {
                page.next_token = last_entry.clone();
                break;
            }
            if entry == *key {
                page.objects.push(ObjectSummary {
                    key: key.clone(),
                    size: obj.data.len() as u64,
                });
            } else {
                page.common_prefixes.push(entry.clone());
            }
            emitted += 1;
            last_entry = Some(entry);
        }
        Ok(page)
    }

    fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, StoreError> {
        self.counters.presign.fetch_add(1, Ordering::Relaxed);
        self.check_available()?;
        Ok(format!(
            "https://{}.{}/{}?X-Amz-Expires={}",
            self.bucket,
            self.host,
            key,
            ttl.as_secs()
        ))
    }

    fn probe_bucket(&self) -> Result<(), StoreError> {
        self.counters.probe.fetch_add(1, Ordering::Relaxed);
        self.check_available()
    }
}

/// Anonymous HTTP access to a [`MemoryObjectStore`].
///
/// Serves public-read objects only: private objects answer 403, missing ones 404.
#[derive(Clone)]
pub struct MemoryPublicGateway {
    store: Arc<MemoryObjectStore>,
}

impl PublicHttp for MemoryPublicGateway {
    fn get_bytes(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>, HttpError> {
        self.store.counters.public_get.fetch_add(1, Ordering::Relaxed);
        if self.store.unavailable.load(Ordering::SeqCst) {
            return Err(HttpError::Transport(format!("connection refused: {}", url)));
        }
        let key = self
            .store
            .key_for_url(url)
            .ok_or_else(|| HttpError::Transport(format!("unknown host in {}", url)))?;
        match self.store.objects.lock().get(&key) {
            Some(obj) if obj.public_read => Ok(obj.data.clone()),
            Some(_) => Err(HttpError::Status(403)),
            None => Err(HttpError::Status(404)),
        }
    }
}
