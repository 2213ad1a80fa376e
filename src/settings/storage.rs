//! Key-value storage seam for the settings reader

/// Read-only view of the page's key-value storage
pub trait KeyValueStore {
    /// Raw string stored under `key`, None if absent or unreadable
    fn get_item(&self, key: &str) -> Option<String>;
}

impl KeyValueStore for web_sys::Storage {
    fn get_item(&self, key: &str) -> Option<String> {
        web_sys::Storage::get_item(self, key).ok().flatten()
    }
}

/// A store the page would not hand out reads as empty
impl<S: KeyValueStore> KeyValueStore for Option<S> {
    fn get_item(&self, key: &str) -> Option<String> {
        self.as_ref()?.get_item(key)
    }
}

#[cfg(test)]
pub use memory::MemoryStore;
