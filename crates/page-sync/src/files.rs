//! Holding area for bytes uploaded ahead of the event that uses them.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct TempFileStore {
    files: Mutex<HashMap<String, Bytes>>,
}

impl TempFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, file_id: impl Into<String>, bytes: Bytes) {
        self.files.lock().insert(file_id.into(), bytes);
    }

    pub fn get(&self, file_id: &str) -> Option<Bytes> {
        self.files.lock().get(file_id).cloned()
    }

    pub fn remove_all<'a>(&self, file_ids: impl IntoIterator<Item = &'a str>) {
        let mut files = self.files.lock();
        for file_id in file_ids {
            files.remove(file_id);
        }
    }

    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.files.lock().clear();
    }
}
