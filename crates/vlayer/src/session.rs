use fcache::{CacheStats, FeatureCache};
use fidx::{Compatibility, IndexReader, OffsetTable, Version};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, trace};

use crate::index;
use crate::source::{DataSource, Feature, Geometry, Provider};
use crate::Error;

/// Level 1 reads the layer front to back; level 2 seeks through an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Sequential,
    Indexed,
}

/// An open data source together with the one layer bound from it.
///
/// The data source is released when the handle is dropped, which is the
/// only way it is released.
pub struct LayerHandle<S> {
    source: S,
    layer: usize,
    name: String,
    locator: String,
}

impl<S: DataSource> LayerHandle<S> {
    pub(crate) fn new(source: S, layer: usize, name: &str, locator: &str) -> Self {
        Self {
            source,
            layer,
            name: name.to_string(),
            locator: locator.to_string(),
        }
    }
}

/// Everything needed to fetch a feature by ordinal, minus the cache.
struct Reader<S> {
    handle: LayerHandle<S>,
    offsets: Option<OffsetTable>,
    /// Next ordinal a sequential read yields.
    next: u64,
}

impl<S: DataSource> Reader<S> {
    fn rewind(&mut self) {
        self.handle.source.reset_reading(self.handle.layer);
        self.next = 1;
    }

    fn fetch(&mut self, ordinal: u64) -> Result<Feature, Error> {
        if ordinal == 0 {
            return Err(Error::OutOfRange { ordinal });
        }

        if let Some(offsets) = &self.offsets {
            let fid = offsets.get(ordinal).ok_or(Error::OutOfRange { ordinal })?;
            let feature = self
                .handle
                .source
                .get_feature(self.handle.layer, fid)?
                .ok_or(Error::FeatureNotFound { fid })?;
            self.next = ordinal + 1;
            return Ok(feature);
        }

        if ordinal < self.next {
            trace!(ordinal, next = self.next, "rewinding for backward sequential read");
            self.rewind();
        }
        loop {
            let feature = self
                .handle
                .source
                .next_feature(self.handle.layer)?
                .ok_or(Error::OutOfRange { ordinal })?;
            let current = self.next;
            self.next += 1;
            if current == ordinal {
                return Ok(feature);
            }
        }
    }
}

/// Read/write access to one layer of an external data source.
///
/// Reads go through a single-entry [`FeatureCache`] keyed by ordinal. With an
/// [`OffsetTable`] attached the session seeks directly to each feature;
/// without one it advances sequentially from its cursor.
///
/// Elevation is never reported, whatever the source declares.
pub struct LayerSession<S: DataSource> {
    reader: Reader<S>,
    cache: FeatureCache<Feature>,
}

impl<S: DataSource> LayerSession<S> {
    pub(crate) fn bind(handle: LayerHandle<S>) -> Self {
        Self {
            reader: Reader {
                handle,
                offsets: None,
                next: 1,
            },
            cache: FeatureCache::new(),
        }
    }

    pub fn layer_name(&self) -> &str {
        &self.reader.handle.name
    }

    pub fn locator(&self) -> &str {
        &self.reader.handle.locator
    }

    /// Position of the bound layer within its data source.
    pub fn layer_index(&self) -> usize {
        self.reader.handle.layer
    }

    pub fn source(&self) -> &S {
        &self.reader.handle.source
    }

    pub fn access_level(&self) -> AccessLevel {
        match self.reader.offsets {
            Some(_) => AccessLevel::Indexed,
            None => AccessLevel::Sequential,
        }
    }

    /// Always `false`: 3D geometry is not supported yet.
    pub fn has_z(&self) -> bool {
        false
    }

    pub fn offsets(&self) -> Option<&OffsetTable> {
        self.reader.offsets.as_ref()
    }

    /// Next ordinal [`read_next`](Self::read_next) yields.
    pub fn cursor(&self) -> u64 {
        self.reader.next
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Switches to indexed access using `offsets`.
    pub fn attach_index(&mut self, offsets: OffsetTable) {
        debug!(records = offsets.len(), layer = %self.layer_name(), "feature index attached");
        self.reader.offsets = Some(offsets);
        self.reader.next = 1;
        self.cache.clear();
    }

    /// Drops the index and returns to sequential access.
    pub fn detach_index(&mut self) -> Option<OffsetTable> {
        self.cache.clear();
        self.reader.rewind();
        self.reader.offsets.take()
    }

    /// Loads a persisted index from `path` and attaches it.
    ///
    /// # Errors
    ///
    /// [`Error::Index`] wrapping the load failure; the session is left
    /// untouched, so recoverable failures can simply continue sequentially.
    pub fn load_index<P: AsRef<Path>>(
        &mut self,
        path: P,
        reader_version: Version,
    ) -> Result<Compatibility, Error> {
        let loaded = IndexReader::new(reader_version).load(path)?;
        self.attach_index(loaded.offsets);
        Ok(loaded.compatibility)
    }

    /// Scans the whole layer, attaches the resulting index and returns it.
    pub fn build_index(&mut self) -> Result<&OffsetTable, Error> {
        let offsets = index::build(&mut self.reader.handle.source, self.reader.handle.layer)?;
        self.attach_index(offsets);
        Ok(self.reader.offsets.get_or_insert_with(OffsetTable::default))
    }

    /// Fetches the feature at `ordinal` from the source, bypassing the cache.
    ///
    /// # Errors
    ///
    /// - [`Error::OutOfRange`] for ordinal 0, an ordinal past the index, or
    ///   one past the end of the layer when reading sequentially.
    /// - [`Error::FeatureNotFound`] when the index names an identifier the
    ///   source no longer has.
    pub fn fetch(&mut self, ordinal: u64) -> Result<Feature, Error> {
        self.reader.fetch(ordinal)
    }

    /// Returns the feature at `ordinal`, reusing the last fetched feature when
    /// the ordinal repeats.
    pub fn read(&mut self, ordinal: u64) -> Result<&Feature, Error> {
        let reader = &mut self.reader;
        self.cache.get_or_fetch(ordinal, |o| reader.fetch(o))
    }

    /// Reads the feature at the cursor and advances it. `None` at the end.
    pub fn read_next(&mut self) -> Result<Option<(u64, Feature)>, Error> {
        let ordinal = self.reader.next;
        match self.reader.fetch(ordinal) {
            Ok(feature) => Ok(Some((ordinal, feature))),
            Err(Error::OutOfRange { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Restarts sequential reading at ordinal 1.
    pub fn rewind(&mut self) {
        self.reader.rewind();
    }

    /// Appends a feature to the bound layer and returns its source identifier.
    ///
    /// Any attached index no longer covers the layer and is dropped; the
    /// cursor then restarts at ordinal 1.
    pub fn write_feature(
        &mut self,
        geometry: Option<Geometry>,
        attributes: BTreeMap<String, String>,
    ) -> Result<i64, Error> {
        let handle = &mut self.reader.handle;
        let fid = handle
            .source
            .create_feature(handle.layer, geometry, attributes)?;
        if self.reader.offsets.is_some() {
            self.detach_index();
            debug!(layer = %self.reader.handle.name, "feature index dropped after write");
        }
        self.cache.clear();
        Ok(fid)
    }

    /// Releases the data source.
    pub fn close(self) {
        debug!(layer = %self.layer_name(), locator = %self.locator(), "closing layer session");
    }
}

/// Opens `layer_name` in the data source at `locator` for reading.
///
/// Layer names are compared exactly (case-sensitive) in the order the source
/// enumerates them. The session starts at level 1 with an empty cache.
///
/// # Errors
///
/// - [`Error::UndefinedDataSource`] / [`Error::UndefinedLayer`] for empty
///   arguments; nothing is opened.
/// - [`Error::DataSourceUnavailable`] if the provider cannot open `locator`.
/// - [`Error::LayerNotFound`] if no layer matches; the data source is
///   released before returning.
pub fn open_for_read<P: Provider>(
    provider: &P,
    locator: &str,
    layer_name: &str,
) -> Result<LayerSession<P::Source>, Error> {
    if locator.is_empty() {
        return Err(Error::UndefinedDataSource);
    }
    if layer_name.is_empty() {
        return Err(Error::UndefinedLayer);
    }
    debug!(locator, layer = layer_name, "opening layer for read");

    provider.register_drivers();
    let source = provider
        .open(locator, false)
        .map_err(|source| Error::DataSourceUnavailable {
            locator: locator.to_string(),
            source,
        })?;

    let count = source.layer_count();
    debug!(layers = count, "layers found in data source");

    // `source` is dropped (released) on the error path
    let layer = (0..count)
        .find(|i| source.layer_name(*i).as_deref() == Some(layer_name))
        .ok_or_else(|| Error::LayerNotFound {
            name: layer_name.to_string(),
        })?;
    debug!(layer, "layer opened");

    if source.layer_has_z(layer) {
        debug!(layer = layer_name, "source reports 3D geometry; reading as 2D");
    }

    Ok(LayerSession::bind(LayerHandle::new(
        source,
        layer,
        layer_name,
        locator,
    )))
}
