//! In-process implementation of the provider capabilities.
//!
//! Data sources live in a store shared by every clone of a
//! [`MemoryProvider`]. Opening a data source takes a private copy of its
//! layers; handles opened for update write their layers back when dropped.
//! The store counts feature reads and open handles and can be told to fail
//! layer deletion or creation, which is what the session tests rely on.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::source::{
    DataSource, Feature, Geometry, GeometryType, LayerOptions, Provider, SourceError,
};

/// Name of the single driver the memory provider registers.
pub const MEMORY_DRIVER: &str = "Memory";

/// A layer held by the memory provider.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryLayer {
    pub name: String,
    pub geometry_type: GeometryType,
    pub has_z: bool,
    pub features: Vec<Feature>,
    next_fid: i64,
}

impl MemoryLayer {
    pub fn new(name: impl Into<String>, geometry_type: GeometryType) -> Self {
        Self {
            name: name.into(),
            geometry_type,
            has_z: false,
            features: Vec::new(),
            next_fid: 0,
        }
    }

    pub fn with_z(mut self, has_z: bool) -> Self {
        self.has_z = has_z;
        self
    }

    /// Appends a feature under the next free identifier.
    pub fn push(&mut self, geometry: Option<Geometry>) -> i64 {
        let fid = self.next_fid;
        self.push_with_fid(fid, geometry);
        fid
    }

    /// Appends a feature under an explicit identifier. Identifiers need not
    /// be dense, which is how real providers behave after deletions.
    pub fn push_with_fid(&mut self, fid: i64, geometry: Option<Geometry>) {
        self.features.push(Feature::new(fid, geometry));
        self.next_fid = self.next_fid.max(fid + 1);
    }
}

#[derive(Default)]
struct Store {
    sources: RefCell<HashMap<String, Vec<MemoryLayer>>>,
    registered: Cell<bool>,
    reads: Cell<u64>,
    open_handles: Cell<usize>,
    fail_deletes: Cell<bool>,
    fail_creates: Cell<bool>,
}

/// Provider over an in-memory store. Clones share the store.
#[derive(Clone, Default)]
pub struct MemoryProvider {
    store: Rc<Store>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `layer` to the data source at `locator`, creating it if needed.
    pub fn insert_layer(&self, locator: &str, layer: MemoryLayer) {
        self.store
            .sources
            .borrow_mut()
            .entry(locator.to_string())
            .or_default()
            .push(layer);
    }

    /// Snapshot of the named layer as currently stored.
    pub fn layer(&self, locator: &str, name: &str) -> Option<MemoryLayer> {
        self.store
            .sources
            .borrow()
            .get(locator)?
            .iter()
            .find(|l| l.name == name)
            .cloned()
    }

    pub fn layer_names(&self, locator: &str) -> Vec<String> {
        self.store
            .sources
            .borrow()
            .get(locator)
            .map(|ls| ls.iter().map(|l| l.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Features handed out by `next_feature`/`get_feature` since creation or
    /// the last [`reset_reads`](Self::reset_reads).
    pub fn reads(&self) -> u64 {
        self.store.reads.get()
    }

    pub fn reset_reads(&self) {
        self.store.reads.set(0);
    }

    /// Data-source handles currently open.
    pub fn open_handles(&self) -> usize {
        self.store.open_handles.get()
    }

    pub fn fail_layer_deletes(&self, fail: bool) {
        self.store.fail_deletes.set(fail);
    }

    pub fn fail_layer_creates(&self, fail: bool) {
        self.store.fail_creates.set(fail);
    }

    fn handle(&self, locator: &str, layers: Vec<MemoryLayer>, update: bool) -> MemoryDataSource {
        self.store.open_handles.set(self.store.open_handles.get() + 1);
        MemoryDataSource {
            locator: locator.to_string(),
            cursors: vec![0; layers.len()],
            layers,
            update,
            store: Rc::clone(&self.store),
        }
    }
}

impl Provider for MemoryProvider {
    type Source = MemoryDataSource;

    fn register_drivers(&self) {
        self.store.registered.set(true);
    }

    fn open(&self, locator: &str, update: bool) -> Result<MemoryDataSource, SourceError> {
        let layers = self
            .store
            .sources
            .borrow()
            .get(locator)
            .cloned()
            .ok_or_else(|| SourceError::new(format!("no data source at '{}'", locator)))?;
        Ok(self.handle(locator, layers, update))
    }

    fn has_driver(&self, name: &str) -> bool {
        self.store.registered.get() && name == MEMORY_DRIVER
    }

    fn create_data_source(
        &self,
        driver: &str,
        locator: &str,
    ) -> Result<MemoryDataSource, SourceError> {
        if !self.has_driver(driver) {
            return Err(SourceError::new(format!("driver <{}> not registered", driver)));
        }
        let layers = self
            .store
            .sources
            .borrow_mut()
            .entry(locator.to_string())
            .or_default()
            .clone();
        Ok(self.handle(locator, layers, true))
    }
}

/// Handle on one memory data source.
pub struct MemoryDataSource {
    locator: String,
    layers: Vec<MemoryLayer>,
    cursors: Vec<usize>,
    update: bool,
    store: Rc<Store>,
}

impl MemoryDataSource {
    fn layer_ref(&self, layer: usize) -> Result<&MemoryLayer, SourceError> {
        self.layers
            .get(layer)
            .ok_or_else(|| SourceError::new(format!("no layer at position {}", layer)))
    }

    fn count_read(&self) {
        self.store.reads.set(self.store.reads.get() + 1);
    }
}

impl DataSource for MemoryDataSource {
    fn layer_count(&self) -> usize {
        self.layers.len()
    }

    fn layer_name(&self, layer: usize) -> Option<String> {
        self.layers.get(layer).map(|l| l.name.clone())
    }

    fn layer_has_z(&self, layer: usize) -> bool {
        self.layers.get(layer).map(|l| l.has_z).unwrap_or(false)
    }

    fn reset_reading(&mut self, layer: usize) {
        if let Some(c) = self.cursors.get_mut(layer) {
            *c = 0;
        }
    }

    fn next_feature(&mut self, layer: usize) -> Result<Option<Feature>, SourceError> {
        let pos = self.cursors.get(layer).copied().unwrap_or(0);
        let feature = self.layer_ref(layer)?.features.get(pos).cloned();
        if feature.is_some() {
            self.cursors[layer] = pos + 1;
            self.count_read();
        }
        Ok(feature)
    }

    fn get_feature(&mut self, layer: usize, fid: i64) -> Result<Option<Feature>, SourceError> {
        let feature = self
            .layer_ref(layer)?
            .features
            .iter()
            .find(|f| f.fid == fid)
            .cloned();
        self.count_read();
        Ok(feature)
    }

    fn delete_layer(&mut self, layer: usize) -> Result<(), SourceError> {
        if !self.update {
            return Err(SourceError::new("data source opened read-only"));
        }
        if self.store.fail_deletes.get() {
            return Err(SourceError::new("layer deletion refused"));
        }
        self.layer_ref(layer)?;
        self.layers.remove(layer);
        self.cursors.remove(layer);
        Ok(())
    }

    fn create_layer(
        &mut self,
        name: &str,
        geometry_type: GeometryType,
        _options: &LayerOptions,
    ) -> Result<usize, SourceError> {
        if !self.update {
            return Err(SourceError::new("data source opened read-only"));
        }
        if self.store.fail_creates.get() {
            return Err(SourceError::new("layer creation refused"));
        }
        self.layers.push(MemoryLayer::new(name, geometry_type));
        self.cursors.push(0);
        Ok(self.layers.len() - 1)
    }

    fn create_feature(
        &mut self,
        layer: usize,
        geometry: Option<Geometry>,
        attributes: BTreeMap<String, String>,
    ) -> Result<i64, SourceError> {
        if !self.update {
            return Err(SourceError::new("data source opened read-only"));
        }
        let l = self
            .layers
            .get_mut(layer)
            .ok_or_else(|| SourceError::new(format!("no layer at position {}", layer)))?;
        let fid = l.push(geometry);
        if let Some(f) = l.features.last_mut() {
            f.attributes = attributes;
        }
        Ok(fid)
    }
}

impl Drop for MemoryDataSource {
    fn drop(&mut self) {
        if self.update {
            self.store
                .sources
                .borrow_mut()
                .insert(self.locator.clone(), std::mem::take(&mut self.layers));
        }
        self.store
            .open_handles
            .set(self.store.open_handles.get().saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_with_points(n: usize) -> MemoryProvider {
        let p = MemoryProvider::new();
        let mut layer = MemoryLayer::new("pts", GeometryType::Point);
        for i in 0..n {
            layer.push(Some(Geometry::Point {
                x: i as f64,
                y: 0.0,
            }));
        }
        p.insert_layer("mem://a", layer);
        p
    }

    #[test]
    fn open_missing_locator_fails() {
        let p = MemoryProvider::new();
        assert!(p.open("mem://none", false).is_err());
        assert_eq!(p.open_handles(), 0);
    }

    #[test]
    fn sequential_reads_and_reset() {
        let p = provider_with_points(3);
        let mut ds = p.open("mem://a", false).unwrap();
        let fids: Vec<i64> = std::iter::from_fn(|| ds.next_feature(0).unwrap())
            .map(|f| f.fid)
            .collect();
        assert_eq!(fids, vec![0, 1, 2]);
        assert_eq!(p.reads(), 3);

        ds.reset_reading(0);
        assert_eq!(ds.next_feature(0).unwrap().unwrap().fid, 0);
    }

    #[test]
    fn handles_are_counted_and_released() {
        let p = provider_with_points(1);
        let a = p.open("mem://a", false).unwrap();
        let b = p.open("mem://a", false).unwrap();
        assert_eq!(p.open_handles(), 2);
        drop(a);
        drop(b);
        assert_eq!(p.open_handles(), 0);
    }

    #[test]
    fn read_only_handle_rejects_writes() {
        let p = provider_with_points(1);
        let mut ds = p.open("mem://a", false).unwrap();
        assert!(ds.delete_layer(0).is_err());
        assert!(ds
            .create_layer("x", GeometryType::Point, &LayerOptions::new())
            .is_err());
    }

    #[test]
    fn update_handle_commits_on_drop() {
        let p = provider_with_points(1);
        p.register_drivers();
        {
            let mut ds = p.create_data_source(MEMORY_DRIVER, "mem://a").unwrap();
            let idx = ds
                .create_layer("lines", GeometryType::LineString, &LayerOptions::new())
                .unwrap();
            ds.create_feature(idx, None, BTreeMap::new()).unwrap();
        }
        assert_eq!(p.layer_names("mem://a"), vec!["pts", "lines"]);
        assert_eq!(p.layer("mem://a", "lines").unwrap().features.len(), 1);
    }

    #[test]
    fn drivers_require_registration() {
        let p = MemoryProvider::new();
        assert!(!p.has_driver(MEMORY_DRIVER));
        p.register_drivers();
        assert!(p.has_driver(MEMORY_DRIVER));
        assert!(!p.has_driver("ESRI Shapefile"));
    }
}
