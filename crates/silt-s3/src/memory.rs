use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use crate::client::{ClientError, ClientResult, ObjectClient, ObjectPage};

const DEFAULT_PAGE_SIZE: usize = 1000;

/// In-memory [`ObjectClient`] standing in for the remote bucket.
///
/// Objects live in an ordered map behind a `RwLock`, so listings come out in
/// lexicographic order like the real service. The page size is configurable
/// to force truncated listings, the bucket-existence flag simulates a
/// missing bucket, and per-operation call counters let tests assert exactly
/// how many remote calls an operation issued.
pub struct InMemoryObjectClient {
    objects: RwLock<BTreeMap<String, Bytes>>,
    bucket_exists: AtomicBool,
    page_size: usize,
    puts: AtomicUsize,
    gets: AtomicUsize,
    heads: AtomicUsize,
    deletes: AtomicUsize,
    lists: AtomicUsize,
    bucket_creates: AtomicUsize,
}

impl InMemoryObjectClient {
    /// A fresh client with an existing, empty bucket.
    pub fn new() -> Self {
        InMemoryObjectClient {
            objects: RwLock::new(BTreeMap::new()),
            bucket_exists: AtomicBool::new(true),
            page_size: DEFAULT_PAGE_SIZE,
            puts: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
            heads: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            lists: AtomicUsize::new(0),
            bucket_creates: AtomicUsize::new(0),
        }
    }

    /// Cap listings at `page_size` names per page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Start without a bucket; every operation fails with
    /// [`ClientError::BucketMissing`] until `create_bucket` is called.
    pub fn without_bucket(self) -> Self {
        self.bucket_exists.store(false, Ordering::SeqCst);
        self
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no objects are stored.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Returns `true` if an object exists under the physical `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.objects
            .read()
            .expect("lock poisoned")
            .contains_key(name)
    }

    /// All stored physical names, in listing order.
    pub fn names(&self) -> Vec<String> {
        self.objects
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Calls made to `put_object` and `put_object_if_absent`.
    pub fn put_calls(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Calls made to `get_object`.
    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Calls made to `head_object`.
    pub fn head_calls(&self) -> usize {
        self.heads.load(Ordering::SeqCst)
    }

    /// Calls made to `delete_object`.
    pub fn delete_calls(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Calls made to `list_objects`.
    pub fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    /// Calls made to `create_bucket`.
    pub fn create_bucket_calls(&self) -> usize {
        self.bucket_creates.load(Ordering::SeqCst)
    }

    fn ensure_bucket(&self) -> ClientResult<()> {
        if self.bucket_exists.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ClientError::BucketMissing)
        }
    }
}

impl Default for InMemoryObjectClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryObjectClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectClient")
            .field("object_count", &self.len())
            .field("page_size", &self.page_size)
            .finish()
    }
}

#[async_trait]
impl ObjectClient for InMemoryObjectClient {
    async fn put_object(&self, name: &str, body: Bytes) -> ClientResult<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.ensure_bucket()?;
        self.objects
            .write()
            .expect("lock poisoned")
            .insert(name.to_string(), body);
        Ok(())
    }

    async fn put_object_if_absent(&self, name: &str, body: Bytes) -> ClientResult<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.ensure_bucket()?;
        let mut objects = self.objects.write().expect("lock poisoned");
        if objects.contains_key(name) {
            return Err(ClientError::AlreadyExists);
        }
        objects.insert(name.to_string(), body);
        Ok(())
    }

    async fn get_object(&self, name: &str) -> ClientResult<Bytes> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.ensure_bucket()?;
        self.objects
            .read()
            .expect("lock poisoned")
            .get(name)
            .cloned()
            .ok_or(ClientError::NotFound)
    }

    async fn head_object(&self, name: &str) -> ClientResult<()> {
        self.heads.fetch_add(1, Ordering::SeqCst);
        self.ensure_bucket()?;
        if self.contains(name) {
            Ok(())
        } else {
            Err(ClientError::NotFound)
        }
    }

    async fn delete_object(&self, name: &str) -> ClientResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.ensure_bucket()?;
        self.objects.write().expect("lock poisoned").remove(name);
        Ok(())
    }

    async fn list_objects(
        &self,
        prefix: &str,
        start_after: Option<&str>,
    ) -> ClientResult<ObjectPage> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.ensure_bucket()?;
        let objects = self.objects.read().expect("lock poisoned");
        let mut matching = objects
            .keys()
            .filter(|name| name.starts_with(prefix))
            .filter(|name| start_after.map_or(true, |marker| name.as_str() > marker));
        let names: Vec<String> = matching.by_ref().take(self.page_size).cloned().collect();
        let truncated = matching.next().is_some();
        Ok(ObjectPage { names, truncated })
    }

    async fn create_bucket(&self) -> ClientResult<()> {
        self.bucket_creates.fetch_add(1, Ordering::SeqCst);
        self.bucket_exists.store(true, Ordering::SeqCst);
        Ok(())
    }
}
