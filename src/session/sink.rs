//! Destinations for captured photos.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::camera::CapturedPhoto;

/// Errors raised while handing a photo to a sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The sink holds as many photos as it may
    #[error("Photo sink is full ({capacity} photos)")]
    Full { capacity: usize },

    /// The sink refused the photo for another reason
    #[error("Photo sink rejected the photo: {0}")]
    Rejected(String),
}

/// Receives successful captures for persistence.
pub trait PhotoSink: Send + Sync {
    fn store(&self, photo: &CapturedPhoto) -> Result<(), SinkError>;
}

/// In-memory sink keyed by payload digest.
///
/// Storing the same bytes twice keeps a single copy.
#[derive(Debug, Default)]
pub struct MemorySink {
    photos: Mutex<HashMap<String, CapturedPhoto>>,
    order: Mutex<Vec<String>>,
    capacity: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the number of distinct photos kept.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.photos).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look a photo up by its hex SHA-256 digest.
    pub fn get(&self, digest: &str) -> Option<CapturedPhoto> {
        lock(&self.photos).get(digest).cloned()
    }

    /// Digests in the order photos were first stored.
    pub fn digests(&self) -> Vec<String> {
        lock(&self.order).clone()
    }
}

impl PhotoSink for MemorySink {
    fn store(&self, photo: &CapturedPhoto) -> Result<(), SinkError> {
        if photo.is_empty() {
            return Err(SinkError::Rejected("empty payload".to_string()));
        }

        let digest = photo.digest();
        let mut photos = lock(&self.photos);
        if photos.contains_key(&digest) {
            log::debug!("Photo {} already stored", &digest[..12]);
            return Ok(());
        }
        if let Some(capacity) = self.capacity {
            if photos.len() >= capacity {
                return Err(SinkError::Full { capacity });
            }
        }

        photos.insert(digest.clone(), photo.clone());
        lock(&self.order).push(digest);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::RequestId;
    use std::time::SystemTime;

    fn photo(id: u64, data: &[u8]) -> CapturedPhoto {
        CapturedPhoto {
            request_id: RequestId::from_raw(id),
            data: data.to_vec(),
            is_proxy: false,
            captured_at: SystemTime::now(),
        }
    }

    #[test]
    fn test_store_and_lookup() {
        let sink = MemorySink::new();
        let p = photo(1, b"abc");
        sink.store(&p).unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.get(&p.digest()), Some(p.clone()));
        assert_eq!(sink.digests(), vec![p.digest()]);
    }

    #[test]
    fn test_duplicate_bytes_stored_once() {
        let sink = MemorySink::new();
        sink.store(&photo(1, b"same")).unwrap();
        sink.store(&photo(2, b"same")).unwrap();
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_capacity_enforced() {
        let sink = MemorySink::with_capacity(1);
        sink.store(&photo(1, b"one")).unwrap();
        let err = sink.store(&photo(2, b"two")).unwrap_err();
        assert!(matches!(err, SinkError::Full { capacity: 1 }));
        assert_eq!(format!("{}", err), "Photo sink is full (1 photos)");
    }

    #[test]
    fn test_empty_payload_rejected() {
        let sink = MemorySink::new();
        assert!(matches!(
            sink.store(&photo(1, b"")),
            Err(SinkError::Rejected(_))
        ));
        assert!(sink.is_empty());
    }
}
