//! Capabilities consumed from the external data-source provider.
//!
//! The provider owns its own drivers, storage and serialization; this crate
//! only drives it through [`Provider`] and [`DataSource`]. Layers are
//! addressed by their position within a data source, as the provider
//! enumerates them.

use std::collections::BTreeMap;
use thiserror::Error;

/// Failure reported by the external provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SourceError(pub String);

impl SourceError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Geometry type declared for a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryType {
    Unknown,
    Point,
    LineString,
    Polygon,
}

/// A 2D geometry. Elevation is never carried.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point { x: f64, y: f64 },
    LineString(Vec<(f64, f64)>),
    Polygon(Vec<Vec<(f64, f64)>>),
}

impl Geometry {
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Geometry::Point { .. } => GeometryType::Point,
            Geometry::LineString(_) => GeometryType::LineString,
            Geometry::Polygon(_) => GeometryType::Polygon,
        }
    }
}

/// A decoded feature as returned by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// The provider's own identifier; this is what the index stores as the
    /// feature's offset.
    pub fid: i64,
    pub geometry: Option<Geometry>,
    pub attributes: BTreeMap<String, String>,
}

impl Feature {
    pub fn new(fid: i64, geometry: Option<Geometry>) -> Self {
        Self {
            fid,
            geometry,
            attributes: BTreeMap::new(),
        }
    }
}

/// Driver-specific layer creation options.
pub type LayerOptions = BTreeMap<String, String>;

/// Entry point of the external provider.
pub trait Provider {
    type Source: DataSource;

    /// Makes the provider's drivers available. Must be idempotent.
    fn register_drivers(&self);

    /// Opens an existing data source.
    fn open(&self, locator: &str, update: bool) -> Result<Self::Source, SourceError>;

    fn has_driver(&self, name: &str) -> bool;

    /// Creates (or opens for writing) a data source with the named driver.
    fn create_data_source(&self, driver: &str, locator: &str)
        -> Result<Self::Source, SourceError>;
}

/// An open data source. Dropping it releases the provider handle.
pub trait DataSource {
    fn layer_count(&self) -> usize;

    /// Declared name of the layer at `layer`, `None` if out of range.
    fn layer_name(&self, layer: usize) -> Option<String>;

    /// First layer whose name equals `name` exactly.
    fn find_layer_by_name(&self, name: &str) -> Option<usize> {
        (0..self.layer_count()).find(|i| self.layer_name(*i).as_deref() == Some(name))
    }

    /// `true` when the layer's geometries carry elevation.
    fn layer_has_z(&self, layer: usize) -> bool;

    /// Restarts sequential reading of `layer` at its first feature.
    fn reset_reading(&mut self, layer: usize);

    /// Next feature in the layer's sequential order, `None` at the end.
    fn next_feature(&mut self, layer: usize) -> Result<Option<Feature>, SourceError>;

    /// Feature with the provider identifier `fid`, `None` if absent.
    fn get_feature(&mut self, layer: usize, fid: i64) -> Result<Option<Feature>, SourceError>;

    fn delete_layer(&mut self, layer: usize) -> Result<(), SourceError>;

    /// Creates a layer and returns its position.
    fn create_layer(
        &mut self,
        name: &str,
        geometry_type: GeometryType,
        options: &LayerOptions,
    ) -> Result<usize, SourceError>;

    /// Appends a feature and returns the identifier the provider assigned.
    fn create_feature(
        &mut self,
        layer: usize,
        geometry: Option<Geometry>,
        attributes: BTreeMap<String, String>,
    ) -> Result<i64, SourceError>;
}
