//! Vector map engine tying together the layer session, its cache and the
//! feature index file.

use anyhow::{Context, Result};
use fidx::{Compatibility, IndexWriter};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use vlayer::{AccessLevel, DataSource, Feature, Geometry, LayerSession, Provider};

use crate::config::MapConfig;

/// How the map was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write,
}

/// A vector map over one external layer.
///
/// # Read Path
///
/// 1. Open the data source and bind the configured layer (level 1).
/// 2. If an index file is configured, load it and switch to level 2.
/// 3. Missing or corrupt index: warn and stay at level 1, or rebuild and
///    persist the index when `rebuild_index` is set.
/// 4. Index too new for `reader_version`: fail.
///
/// # Write Path
///
/// 1. Create the layer (see [`vlayer::create`]).
/// 2. Append features with [`write`](VectorMap::write).
/// 3. On [`close`](VectorMap::close), build and persist the index if an index
///    path is configured.
pub struct VectorMap<S: DataSource> {
    session: LayerSession<S>,
    config: MapConfig,
    mode: Mode,
}

impl<S: DataSource> VectorMap<S> {
    /// Opens an existing layer for reading.
    ///
    /// # Errors
    ///
    /// Any open failure from [`vlayer::open_for_read`], an index file that
    /// requires a newer reader, or a failed rebuild. Recoverable index
    /// failures are not errors.
    pub fn open_old<P>(provider: &P, config: MapConfig) -> Result<Self>
    where
        P: Provider<Source = S>,
    {
        let session = vlayer::open_for_read(provider, &config.locator, &config.layer)
            .with_context(|| {
                format!(
                    "opening layer <{}> in '{}'",
                    config.layer, config.locator
                )
            })?;

        let mut map = Self {
            session,
            config,
            mode: Mode::Read,
        };
        map.attach_persisted_index()?;
        Ok(map)
    }

    /// Creates the configured layer for writing.
    ///
    /// # Errors
    ///
    /// Any failure from [`vlayer::create`]; in particular an existing layer
    /// of the same name when `overwrite` is not set.
    pub fn open_new<P>(provider: &P, config: MapConfig) -> Result<Self>
    where
        P: Provider<Source = S>,
    {
        let session = vlayer::create(
            provider,
            &config.locator,
            &config.layer,
            &config.driver,
            config.overwrite,
        )
        .with_context(|| {
            format!(
                "creating layer <{}> in '{}'",
                config.layer, config.locator
            )
        })?;

        Ok(Self {
            session,
            config,
            mode: Mode::Write,
        })
    }

    fn attach_persisted_index(&mut self) -> Result<()> {
        let Some(path) = self.config.index_path.clone() else {
            return Ok(());
        };

        match self.session.load_index(&path, self.config.reader_version) {
            Ok(Compatibility::Full) => {
                debug!(path = %path.display(), "feature index loaded");
            }
            Ok(Compatibility::Partial) => {
                debug!(path = %path.display(), "feature index loaded with newer format");
            }
            Err(vlayer::Error::Index(e)) if e.is_recoverable() => {
                warn!(
                    layer = %self.config.layer,
                    error = ?e,
                    "feature index unusable; falling back to sequential access"
                );
                if self.config.rebuild_index {
                    self.build_index()?;
                }
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("loading feature index {}", path.display())
                });
            }
        }
        Ok(())
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn level(&self) -> AccessLevel {
        self.session.access_level()
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn session(&self) -> &LayerSession<S> {
        &self.session
    }

    /// Number of indexed features, `None` at level 1.
    pub fn num_features(&self) -> Option<usize> {
        self.session.offsets().map(|o| o.len())
    }

    /// Feature at `ordinal` (1-based), through the single-feature cache.
    pub fn read(&mut self, ordinal: u64) -> Result<&Feature> {
        Ok(self.session.read(ordinal)?)
    }

    /// Next feature in ordinal order, `None` at the end of the layer.
    pub fn read_next(&mut self) -> Result<Option<(u64, Feature)>> {
        Ok(self.session.read_next()?)
    }

    pub fn rewind(&mut self) {
        self.session.rewind();
    }

    /// Appends a feature. Only valid for maps opened with
    /// [`open_new`](Self::open_new).
    pub fn write(
        &mut self,
        geometry: Option<Geometry>,
        attributes: BTreeMap<String, String>,
    ) -> Result<i64> {
        if self.mode != Mode::Write {
            anyhow::bail!("vector map <{}> is open read-only", self.config.layer);
        }
        Ok(self.session.write_feature(geometry, attributes)?)
    }

    /// Rebuilds the index by scanning the layer, switches to level 2 and, if
    /// an index path is configured, persists it. Returns the record count.
    pub fn build_index(&mut self) -> Result<usize> {
        let table = self.session.build_index()?;
        let records = table.len();

        if let Some(path) = &self.config.index_path {
            IndexWriter::new()
                .with_byte_order(self.config.index_byte_order)
                .write(path, table)
                .with_context(|| format!("writing feature index {}", path.display()))?;
        }
        debug!(records, layer = %self.config.layer, "feature index rebuilt");
        Ok(records)
    }

    /// Closes the map, releasing the data source. Maps opened for writing
    /// persist their index first when an index path is configured.
    pub fn close(mut self) -> Result<()> {
        if self.mode == Mode::Write && self.config.index_path.is_some() {
            self.build_index()?;
        }
        self.session.close();
        Ok(())
    }
}
