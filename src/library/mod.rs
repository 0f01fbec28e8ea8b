//! The saved-image library
//!
//! Owns the user's collection of previously generated images: a JSON array
//! of entries persisted whole under a fixed key in the storage capability.
//! Every mutation rewrites the full collection. Newest entries sit at the
//! front.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::gemini::ImageInput;
use crate::storage::{Storage, StorageError};

/// Fixed storage key for the persisted library
pub const STORAGE_KEY: &str = "studiod.image_library";

/// Media type used when an entry does not declare one
pub const DEFAULT_MIME: &str = "image/png";

/// `data:<mime>[;base64],<payload>`
static DATA_URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^data:([^;,]*)(;base64)?,(.*)$").unwrap());

/// Library errors
#[derive(Debug, Error)]
pub enum LibraryError {
    /// Persisted state exists but is not a JSON array of entries
    #[error("corrupt library store: {0}")]
    CorruptStore(String),

    /// Import payload is not valid JSON or its top level is not an array
    #[error("import file is not a JSON image library: {0}")]
    ImportParse(String),

    /// Durable write failed; the in-memory library keeps the mutation
    #[error("failed to persist library: {0}")]
    Persistence(#[from] StorageError),

    /// Creation-path validation failure
    #[error("{0}")]
    InvalidImage(String),
}

/// One saved image entry (wire keys match the export file format)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedImage {
    pub id: String,
    pub image_data_url: String,
    pub mime_type: String,
    pub prompt: String,
    pub timestamp: i64,
}

impl SavedImage {
    /// Repackage the stored payload in the shape the generation facade
    /// accepts as a reference image.
    pub fn to_input(&self) -> Result<ImageInput, LibraryError> {
        let caps = DATA_URL_REGEX
            .captures(&self.image_data_url)
            .ok_or_else(|| LibraryError::InvalidImage("payload is not a data URL".to_string()))?;

        if caps.get(2).is_none() {
            return Err(LibraryError::InvalidImage(
                "payload is not base64-encoded".to_string(),
            ));
        }

        let mime_type = match caps.get(1).map(|m| m.as_str()) {
            Some(mime) if !mime.is_empty() => mime.to_string(),
            _ => DEFAULT_MIME.to_string(),
        };

        Ok(ImageInput {
            data: caps[3].to_string(),
            mime_type,
        })
    }
}

/// A freshly generated image the user chose to keep. Id and timestamp are
/// minted by the store, never by the caller.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub image_data_url: String,
    pub mime_type: Option<String>,
    pub prompt: String,
}

/// Durable ordered collection of saved images
pub struct LibraryStore {
    storage: Arc<dyn Storage>,
    images: RwLock<Vec<SavedImage>>,
}

impl LibraryStore {
    /// Open the store, loading the persisted library. Corrupt persisted
    /// state resets to an empty library; startup must not fail on it.
    pub async fn open(storage: Arc<dyn Storage>) -> Self {
        let images = match Self::load(storage.as_ref()).await {
            Ok(images) => images,
            Err(e) => {
                warn!("resetting image library: {}", e);
                Vec::new()
            }
        };

        debug!("image library opened with {} entries", images.len());

        Self {
            storage,
            images: RwLock::new(images),
        }
    }

    /// Read the persisted library from storage. Absent state is an empty
    /// library; unparseable or non-array state is a `CorruptStore` error.
    pub async fn load(storage: &dyn Storage) -> Result<Vec<SavedImage>, LibraryError> {
        let Some(raw) = storage.get(STORAGE_KEY).await? else {
            return Ok(Vec::new());
        };

        let value: Value = serde_json::from_str(&raw)
            .map_err(|e| LibraryError::CorruptStore(e.to_string()))?;
        let Value::Array(entries) = value else {
            return Err(LibraryError::CorruptStore(
                "top level is not an array".to_string(),
            ));
        };

        // Entries were validated on the way in; drop any that no longer
        // parse rather than failing the whole load.
        Ok(entries.iter().filter_map(validate_entry).collect())
    }

    /// Serialize the full collection to storage, replacing any prior value.
    /// The only write path.
    async fn persist(&self, images: &[SavedImage]) -> Result<(), LibraryError> {
        let raw = serde_json::to_string(images)
            .map_err(|e| LibraryError::Persistence(StorageError(e.to_string())))?;
        self.storage.set(STORAGE_KEY, &raw).await?;
        Ok(())
    }

    /// Snapshot of the library, newest first
    pub async fn list(&self) -> Vec<SavedImage> {
        self.images.read().await.clone()
    }

    /// Look up an entry by id
    pub async fn get(&self, id: &str) -> Option<SavedImage> {
        self.images
            .read()
            .await
            .iter()
            .find(|image| image.id == id)
            .cloned()
    }

    /// Save a freshly generated image into the library. Mints the id and
    /// timestamp; requires a non-empty prompt and a data-URL payload.
    pub async fn add(&self, new: NewImage) -> Result<SavedImage, LibraryError> {
        if new.prompt.trim().is_empty() {
            return Err(LibraryError::InvalidImage(
                "prompt must not be empty".to_string(),
            ));
        }
        if !DATA_URL_REGEX.is_match(&new.image_data_url) {
            return Err(LibraryError::InvalidImage(
                "image payload is not a data URL".to_string(),
            ));
        }

        let mime_type = new
            .mime_type
            .filter(|mime| !mime.is_empty())
            .or_else(|| data_url_mime(&new.image_data_url))
            .unwrap_or_else(|| DEFAULT_MIME.to_string());

        let image = SavedImage {
            id: fresh_id(),
            image_data_url: new.image_data_url,
            mime_type,
            prompt: new.prompt,
            timestamp: chrono::Utc::now().timestamp_millis(),
        };

        self.insert(image).await
    }

    /// Insert a fully formed entry at the front. A colliding id is never
    /// trusted; a fresh one is minted in its place.
    pub async fn insert(&self, mut image: SavedImage) -> Result<SavedImage, LibraryError> {
        let mut images = self.images.write().await;

        while images.iter().any(|existing| existing.id == image.id) {
            image.id = fresh_id();
        }

        images.insert(0, image.clone());
        self.persist(&images).await?;
        Ok(image)
    }

    /// Remove an entry by id and persist. Absent ids are a no-op, not an
    /// error.
    pub async fn remove(&self, id: &str) -> Result<bool, LibraryError> {
        let mut images = self.images.write().await;
        let before = images.len();
        images.retain(|image| image.id != id);

        if images.len() == before {
            return Ok(false);
        }

        self.persist(&images).await?;
        Ok(true)
    }

    /// Pretty-printed JSON export of the full library, the exact structural
    /// inverse of what `import_merge` accepts.
    pub async fn export_json(&self) -> Result<Vec<u8>, LibraryError> {
        let images = self.images.read().await;
        serde_json::to_vec_pretty(&*images)
            .map_err(|e| LibraryError::Persistence(StorageError(e.to_string())))
    }

    /// Merge a JSON export file into the library.
    ///
    /// Entries failing structural validation are dropped silently; entries
    /// whose id already exists are dropped; survivors are prepended in file
    /// order. Returns how many entries were actually added (zero is a
    /// normal outcome, distinct from a parse failure).
    pub async fn import_merge(&self, raw: &[u8]) -> Result<usize, LibraryError> {
        let value: Value =
            serde_json::from_slice(raw).map_err(|e| LibraryError::ImportParse(e.to_string()))?;
        let Value::Array(entries) = value else {
            return Err(LibraryError::ImportParse(
                "top level is not an array".to_string(),
            ));
        };

        let mut images = self.images.write().await;
        let mut seen: HashSet<String> = images.iter().map(|image| image.id.clone()).collect();

        let mut incoming = Vec::new();
        for entry in &entries {
            let Some(image) = validate_entry(entry) else {
                continue;
            };
            if !seen.insert(image.id.clone()) {
                continue;
            }
            incoming.push(image);
        }

        let added = incoming.len();
        debug!("import: {} of {} entries accepted", added, entries.len());

        if added > 0 {
            let mut merged = incoming;
            merged.append(&mut images);
            *images = merged;
            self.persist(&images).await?;
        }

        Ok(added)
    }

    /// True iff some entry's payload exactly equals the given data URL.
    /// Exact string equality of the full encoded payload, by design of the
    /// save-button gate.
    pub async fn contains_payload(&self, image_data_url: &str) -> bool {
        self.images
            .read()
            .await
            .iter()
            .any(|image| image.image_data_url == image_data_url)
    }
}

/// Structural validation for one entry: `id` and `prompt` non-empty strings,
/// `imageDataUrl` a string, `timestamp` numeric. `mimeType` is defaulted
/// rather than enforced.
fn validate_entry(entry: &Value) -> Option<SavedImage> {
    let obj = entry.as_object()?;

    let id = obj.get("id")?.as_str().filter(|s| !s.is_empty())?;
    let image_data_url = obj.get("imageDataUrl")?.as_str()?;
    let prompt = obj.get("prompt")?.as_str().filter(|s| !s.is_empty())?;

    let ts = obj.get("timestamp")?;
    let timestamp = ts.as_i64().or_else(|| ts.as_f64().map(|f| f as i64))?;

    let mime_type = obj
        .get("mimeType")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_MIME);

    Some(SavedImage {
        id: id.to_string(),
        image_data_url: image_data_url.to_string(),
        mime_type: mime_type.to_string(),
        prompt: prompt.to_string(),
        timestamp,
    })
}

/// Entry ids combine the creation instant with a random suffix so repeated
/// saves within one millisecond never collide.
fn fresh_id() -> String {
    let ts = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::random();
    format!("img-{}-{}", ts, hex::encode(suffix.to_be_bytes()))
}

/// Media type declared by a data URL, if any
fn data_url_mime(url: &str) -> Option<String> {
    let caps = DATA_URL_REGEX.captures(url)?;
    let mime = caps.get(1)?.as_str();
    if mime.is_empty() {
        None
    } else {
        Some(mime.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn entry(id: &str, payload: &str) -> SavedImage {
        SavedImage {
            id: id.to_string(),
            image_data_url: format!("data:image/png;base64,{}", payload),
            mime_type: "image/png".to_string(),
            prompt: format!("prompt for {}", id),
            timestamp: 1000,
        }
    }

    async fn empty_store() -> LibraryStore {
        LibraryStore::open(Arc::new(MemoryStorage::new())).await
    }

    #[tokio::test]
    async fn test_open_empty_storage() {
        let store = empty_store().await;
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_store_resets_to_empty() {
        // Storage containing literal junk must not prevent startup
        let storage = Arc::new(MemoryStorage::with_entry(STORAGE_KEY, "not-json"));
        let store = LibraryStore::open(storage).await;
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_rejects_non_array() {
        let storage = MemoryStorage::with_entry(STORAGE_KEY, r#"{"id":"x"}"#);
        let result = LibraryStore::load(&storage).await;
        assert!(matches!(result, Err(LibraryError::CorruptStore(_))));
    }

    #[tokio::test]
    async fn test_add_then_remove_restores_library() {
        let store = empty_store().await;
        store.insert(entry("seed", "AAAA")).await.unwrap();
        let before = store.list().await;

        let saved = store
            .add(NewImage {
                image_data_url: "data:image/png;base64,BBBB".to_string(),
                mime_type: Some("image/png".to_string()),
                prompt: "cat".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(store.list().await.len(), 2);
        assert!(store.remove(&saved.id).await.unwrap());
        assert_eq!(store.list().await, before);
    }

    #[tokio::test]
    async fn test_add_requires_prompt() {
        let store = empty_store().await;
        let result = store
            .add(NewImage {
                image_data_url: "data:image/png;base64,AAAA".to_string(),
                mime_type: None,
                prompt: "  ".to_string(),
            })
            .await;
        assert!(matches!(result, Err(LibraryError::InvalidImage(_))));
    }

    #[tokio::test]
    async fn test_add_defaults_mime_from_data_url() {
        let store = empty_store().await;
        let saved = store
            .add(NewImage {
                image_data_url: "data:image/jpeg;base64,AAAA".to_string(),
                mime_type: None,
                prompt: "cat".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(saved.mime_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_insert_prepends_newest_first() {
        let store = empty_store().await;
        store.insert(entry("first", "AAAA")).await.unwrap();
        store.insert(entry("second", "BBBB")).await.unwrap();

        let ids: Vec<String> = store.list().await.into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_insert_never_reuses_colliding_id() {
        let store = empty_store().await;
        store.insert(entry("dup", "AAAA")).await.unwrap();
        let second = store.insert(entry("dup", "BBBB")).await.unwrap();

        assert_ne!(second.id, "dup");
        assert_eq!(store.list().await.len(), 2);
    }

    #[tokio::test]
    async fn test_remove_absent_is_noop() {
        let store = empty_store().await;
        store.insert(entry("keep", "AAAA")).await.unwrap();

        assert!(!store.remove("absent").await.unwrap());
        assert_eq!(store.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_persisted_state_survives_reopen() {
        let storage = Arc::new(MemoryStorage::new());
        let store = LibraryStore::open(storage.clone()).await;
        store.insert(entry("x1", "AAAA")).await.unwrap();
        drop(store);

        let reopened = LibraryStore::open(storage).await;
        let images = reopened.list().await;
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].id, "x1");
    }

    #[tokio::test]
    async fn test_export_round_trip_preserves_entries_and_order() {
        let store = empty_store().await;
        store.insert(entry("a", "AAAA")).await.unwrap();
        store.insert(entry("b", "BBBB")).await.unwrap();
        store.insert(entry("c", "CCCC")).await.unwrap();
        let original = store.list().await;

        let exported = store.export_json().await.unwrap();

        let fresh = empty_store().await;
        let added = fresh.import_merge(&exported).await.unwrap();
        assert_eq!(added, 3);
        assert_eq!(fresh.list().await, original);
    }

    #[tokio::test]
    async fn test_import_is_idempotent() {
        let store = empty_store().await;
        store.insert(entry("a", "AAAA")).await.unwrap();
        store.insert(entry("b", "BBBB")).await.unwrap();
        let exported = store.export_json().await.unwrap();

        let target = empty_store().await;
        assert_eq!(target.import_merge(&exported).await.unwrap(), 2);
        // Importing the same file again adds nothing and changes nothing
        let before = target.list().await;
        assert_eq!(target.import_merge(&exported).await.unwrap(), 0);
        assert_eq!(target.list().await, before);
    }

    #[tokio::test]
    async fn test_import_dedupes_against_current_library() {
        let store = empty_store().await;
        store.insert(entry("a", "AAAA")).await.unwrap();
        let before = store.list().await;

        let raw = serde_json::to_vec(&vec![entry("a", "ZZZZ")]).unwrap();
        assert_eq!(store.import_merge(&raw).await.unwrap(), 0);
        assert_eq!(store.list().await, before);
    }

    #[tokio::test]
    async fn test_import_rejects_non_json() {
        let store = empty_store().await;
        let result = store.import_merge(b"not-json").await;
        assert!(matches!(result, Err(LibraryError::ImportParse(_))));
    }

    #[tokio::test]
    async fn test_import_rejects_non_array() {
        let store = empty_store().await;
        let result = store.import_merge(br#"{"id":"a"}"#).await;
        assert!(matches!(result, Err(LibraryError::ImportParse(_))));
    }

    #[tokio::test]
    async fn test_import_drops_entry_missing_timestamp() {
        let store = empty_store().await;
        let raw = br#"[{"id":"a","imageDataUrl":"d","prompt":"p"}]"#;
        assert_eq!(store.import_merge(raw).await.unwrap(), 0);
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_import_keeps_valid_drops_invalid() {
        let store = empty_store().await;
        let raw = br#"[
            {"id":"good","imageDataUrl":"data:image/png;base64,AAAA","mimeType":"image/png","prompt":"p","timestamp":1},
            {"id":"","imageDataUrl":"d","prompt":"p","timestamp":2},
            {"id":"no-prompt","imageDataUrl":"d","prompt":"","timestamp":3},
            {"id":"no-mime","imageDataUrl":"d","prompt":"p","timestamp":4}
        ]"#;

        assert_eq!(store.import_merge(raw).await.unwrap(), 2);
        let images = store.list().await;
        assert_eq!(images[0].id, "good");
        // Missing mimeType is defaulted, not dropped
        assert_eq!(images[1].id, "no-mime");
        assert_eq!(images[1].mime_type, DEFAULT_MIME);
    }

    #[tokio::test]
    async fn test_import_preserves_file_order_at_front() {
        let store = empty_store().await;
        store.insert(entry("old", "AAAA")).await.unwrap();

        let batch = vec![entry("n1", "BBBB"), entry("n2", "CCCC")];
        let raw = serde_json::to_vec(&batch).unwrap();
        assert_eq!(store.import_merge(&raw).await.unwrap(), 2);

        let ids: Vec<String> = store.list().await.into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["n1", "n2", "old"]);
    }

    #[tokio::test]
    async fn test_import_dedupes_within_batch() {
        let store = empty_store().await;
        let batch = vec![entry("same", "AAAA"), entry("same", "BBBB")];
        let raw = serde_json::to_vec(&batch).unwrap();

        assert_eq!(store.import_merge(&raw).await.unwrap(), 1);
        let images = store.list().await;
        assert_eq!(images.len(), 1);
        assert!(images[0].image_data_url.ends_with("AAAA"));
    }

    #[tokio::test]
    async fn test_saved_scenario() {
        // The canonical one-entry walk-through
        let store = empty_store().await;
        store
            .insert(SavedImage {
                id: "x1".to_string(),
                image_data_url: "data:image/png;base64,AAAA".to_string(),
                mime_type: "image/png".to_string(),
                prompt: "cat".to_string(),
                timestamp: 1000,
            })
            .await
            .unwrap();

        assert_eq!(store.list().await.len(), 1);

        let exported = store.export_json().await.unwrap();
        let parsed: Vec<Value> = serde_json::from_slice(&exported).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0]["id"], "x1");
        assert_eq!(parsed[0]["imageDataUrl"], "data:image/png;base64,AAAA");
        assert_eq!(parsed[0]["mimeType"], "image/png");
        assert_eq!(parsed[0]["prompt"], "cat");
        assert_eq!(parsed[0]["timestamp"], 1000);

        assert!(store.contains_payload("data:image/png;base64,AAAA").await);
        assert!(!store.contains_payload("data:image/png;base64,BBBB").await);
    }

    #[tokio::test]
    async fn test_to_input_extracts_payload_and_mime() {
        let image = entry("a", "QUJD");
        let input = image.to_input().unwrap();
        assert_eq!(input.data, "QUJD");
        assert_eq!(input.mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_to_input_defaults_missing_mime() {
        let image = SavedImage {
            image_data_url: "data:;base64,QUJD".to_string(),
            ..entry("a", "QUJD")
        };
        let input = image.to_input().unwrap();
        assert_eq!(input.mime_type, DEFAULT_MIME);
    }

    #[tokio::test]
    async fn test_to_input_rejects_non_data_url() {
        let image = SavedImage {
            image_data_url: "https://example.com/cat.png".to_string(),
            ..entry("a", "QUJD")
        };
        assert!(matches!(
            image.to_input(),
            Err(LibraryError::InvalidImage(_))
        ));
    }

    /// Storage that accepts reads but fails every write
    struct ReadOnlyStorage;

    #[async_trait::async_trait]
    impl Storage for ReadOnlyStorage {
        async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError("quota exceeded".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_persist_keeps_in_memory_state() {
        let store = LibraryStore::open(Arc::new(ReadOnlyStorage)).await;

        let result = store.insert(entry("x1", "AAAA")).await;
        assert!(matches!(result, Err(LibraryError::Persistence(_))));

        // The entry stays usable for the rest of the session
        let images = store.list().await;
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].id, "x1");
    }
}
