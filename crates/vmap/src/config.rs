use fidx::{ByteOrder, Version};
use std::path::{Path, PathBuf};

/// Everything needed to open or create a vector map over an external layer.
///
/// # Fields
///
/// * `locator`: data-source locator understood by the provider.
/// * `layer`: layer name, matched exactly.
/// * `index_path`: feature index file; without one the map stays at
///   level 1 unless [`VectorMap::build_index`](crate::VectorMap::build_index)
///   is called.
/// * `reader_version`: version this reader claims for the index gate.
/// * `index_byte_order`: byte order of index files written by the map.
/// * `driver` / `overwrite`: write path only.
/// * `rebuild_index`: rebuild and persist the index when the file is
///   missing or corrupt instead of staying at level 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapConfig {
    pub locator: String,
    pub layer: String,
    pub index_path: Option<PathBuf>,
    pub reader_version: Version,
    pub index_byte_order: ByteOrder,
    pub driver: String,
    pub overwrite: bool,
    pub rebuild_index: bool,
}

impl MapConfig {
    pub fn new(locator: impl Into<String>, layer: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            layer: layer.into(),
            index_path: None,
            reader_version: fidx::VERSION,
            index_byte_order: ByteOrder::Little,
            driver: String::new(),
            overwrite: false,
            rebuild_index: false,
        }
    }

    pub fn with_index_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.index_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_reader_version(mut self, version: Version) -> Self {
        self.reader_version = version;
        self
    }

    pub fn with_index_byte_order(mut self, order: ByteOrder) -> Self {
        self.index_byte_order = order;
        self
    }

    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = driver.into();
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_rebuild_index(mut self, rebuild: bool) -> Self {
        self.rebuild_index = rebuild;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = MapConfig::new("mem://a", "roads");
        assert_eq!(c.reader_version, fidx::VERSION);
        assert_eq!(c.index_byte_order, ByteOrder::Little);
        assert!(c.index_path.is_none());
        assert!(!c.overwrite);
        assert!(!c.rebuild_index);
    }

    #[test]
    fn builders_set_fields() {
        let c = MapConfig::new("mem://a", "roads")
            .with_index_path("/tmp/fidx")
            .with_reader_version(Version::new(3, 0))
            .with_index_byte_order(ByteOrder::Big)
            .with_driver("Memory")
            .with_overwrite(true)
            .with_rebuild_index(true);
        assert_eq!(c.index_path.as_deref(), Some(Path::new("/tmp/fidx")));
        assert_eq!(c.reader_version, Version::new(3, 0));
        assert_eq!(c.index_byte_order, ByteOrder::Big);
        assert_eq!(c.driver, "Memory");
        assert!(c.overwrite && c.rebuild_index);
    }
}
