//! # Vlayer
//!
//! Random-access reading of vector layers owned by an external provider.
//!
//! The provider (anything implementing [`Provider`]) only promises sequential
//! iteration over a layer's features plus lookup by its own feature
//! identifier. A [`LayerSession`] binds one layer of one data source and
//! numbers its features densely from 1:
//!
//! - **Level 1** ([`AccessLevel::Sequential`]): no index; fetching ordinal
//!   `n` advances through the layer from the session cursor.
//! - **Level 2** ([`AccessLevel::Indexed`]): an [`OffsetTable`] maps each
//!   ordinal to the provider identifier, loaded from a feature index file
//!   or built by one full scan.
//!
//! Reads pass through a one-entry cache of the last fetched feature.
//!
//! Layers are created for writing with [`create`], which refuses to replace
//! an existing layer of the same name unless overwriting is allowed.
//!
//! ## Example
//! ```rust
//! use vlayer::memory::{MemoryLayer, MemoryProvider};
//! use vlayer::{open_for_read, GeometryType};
//!
//! let provider = MemoryProvider::new();
//! let mut layer = MemoryLayer::new("wells", GeometryType::Point);
//! layer.push(None);
//! layer.push(None);
//! provider.insert_layer("mem://survey", layer);
//!
//! let mut session = open_for_read(&provider, "mem://survey", "wells").unwrap();
//! session.build_index().unwrap();
//! assert_eq!(session.read(2).unwrap().fid, 1);
//! ```

mod create;
mod index;
pub mod memory;
mod session;
mod source;

pub use create::{create, DEFAULT_GEOMETRY_TYPE};
pub use index::build as build_index;
pub use session::{open_for_read, AccessLevel, LayerHandle, LayerSession};
pub use source::{
    DataSource, Feature, Geometry, GeometryType, LayerOptions, Provider, SourceError,
};

pub use fidx::{FidxError, OffsetTable};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("data source not defined")]
    UndefinedDataSource,
    #[error("layer not defined")]
    UndefinedLayer,
    #[error("unable to open data source '{locator}'")]
    DataSourceUnavailable {
        locator: String,
        #[source]
        source: SourceError,
    },
    #[error("layer <{name}> not found")]
    LayerNotFound { name: String },
    #[error("feature ordinal {ordinal} out of range")]
    OutOfRange { ordinal: u64 },
    #[error("feature {fid} not found in data source")]
    FeatureNotFound { fid: i64 },
    #[error("unable to get driver <{0}>")]
    DriverUnavailable(String),
    #[error("unable to create data source '{locator}'")]
    DataSourceCreate {
        locator: String,
        #[source]
        source: SourceError,
    },
    #[error("layer <{name}> already exists in data source '{locator}'")]
    LayerAlreadyExists { name: String, locator: String },
    #[error("unable to delete layer <{name}>")]
    LayerDelete {
        name: String,
        #[source]
        source: SourceError,
    },
    #[error("unable to create layer <{name}> in '{locator}'")]
    LayerCreate {
        name: String,
        locator: String,
        #[source]
        source: SourceError,
    },
    #[error("source error")]
    Source(#[from] SourceError),
    #[error(transparent)]
    Index(#[from] FidxError),
}

impl Error {
    /// `true` for conditions that must stop the calling operation with no
    /// fallback: missing configuration, an unknown driver, an existing layer
    /// without overwrite permission, or an index too new for this reader.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::UndefinedDataSource
            | Error::UndefinedLayer
            | Error::DriverUnavailable(_)
            | Error::LayerAlreadyExists { .. } => true,
            Error::Index(e) => !e.is_recoverable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fidx::Version;
    use std::io;

    #[test]
    fn index_errors_follow_recoverability() {
        let missing = Error::Index(FidxError::Unavailable(io::Error::from(
            io::ErrorKind::NotFound,
        )));
        assert!(!missing.is_fatal());
        let corrupt = Error::Index(FidxError::Corrupt("short".into()));
        assert!(!corrupt.is_fatal());
        let too_new = Error::Index(FidxError::UnsupportedVersion {
            file: Version::new(9, 0),
            back: Version::new(9, 0),
            reader: fidx::VERSION,
        });
        assert!(too_new.is_fatal());
    }

    #[test]
    fn lookup_failures_are_not_fatal() {
        assert!(!Error::LayerNotFound { name: "a".into() }.is_fatal());
        assert!(!Error::OutOfRange { ordinal: 9 }.is_fatal());
    }

    #[test]
    fn messages_name_the_layer() {
        let e = Error::LayerAlreadyExists {
            name: "roads".into(),
            locator: "/data/out.gpkg".into(),
        };
        assert_eq!(
            e.to_string(),
            "layer <roads> already exists in data source '/data/out.gpkg'"
        );
    }
}
