//! Creating a new layer for writing.

use tracing::{debug, warn};

use crate::session::{LayerHandle, LayerSession};
use crate::source::{DataSource, GeometryType, LayerOptions, Provider};
use crate::Error;

/// Geometry type of every layer this crate creates.
pub const DEFAULT_GEOMETRY_TYPE: GeometryType = GeometryType::Point;

/// Creates `layer_name` in the data source at `locator` using `driver`, and
/// returns a session bound to the new, empty layer.
///
/// # Steps
///
/// 1. Register drivers and resolve `driver`.
/// 2. Create (or open for writing) the data source.
/// 3. If a layer with the same name exists, delete it when `overwrite` is
///    set; otherwise stop.
/// 4. Create the layer with [`DEFAULT_GEOMETRY_TYPE`], no options and no
///    spatial reference.
///
/// # Errors
///
/// - [`Error::UndefinedDataSource`] / [`Error::UndefinedLayer`] for empty
///   arguments.
/// - [`Error::DriverUnavailable`] if the driver is unknown.
/// - [`Error::DataSourceCreate`] if the data source cannot be created.
/// - [`Error::LayerAlreadyExists`] if the name is taken and `overwrite` is
///   not set. The existing layer is left intact.
/// - [`Error::LayerDelete`] if the colliding layer cannot be deleted.
/// - [`Error::LayerCreate`] if the provider refuses the new layer.
///
/// The data source is released on every error path.
pub fn create<P: Provider>(
    provider: &P,
    locator: &str,
    layer_name: &str,
    driver: &str,
    overwrite: bool,
) -> Result<LayerSession<P::Source>, Error> {
    if locator.is_empty() {
        return Err(Error::UndefinedDataSource);
    }
    if layer_name.is_empty() {
        return Err(Error::UndefinedLayer);
    }

    provider.register_drivers();
    if !provider.has_driver(driver) {
        warn!(driver, "unable to get driver");
        return Err(Error::DriverUnavailable(driver.to_string()));
    }

    let mut source =
        provider
            .create_data_source(driver, locator)
            .map_err(|source| Error::DataSourceCreate {
                locator: locator.to_string(),
                source,
            })?;

    if let Some(existing) = source.find_layer_by_name(layer_name) {
        if !overwrite {
            return Err(Error::LayerAlreadyExists {
                name: layer_name.to_string(),
                locator: locator.to_string(),
            });
        }
        warn!(layer = layer_name, "layer already exists and will be overwritten");
        source
            .delete_layer(existing)
            .map_err(|source| Error::LayerDelete {
                name: layer_name.to_string(),
                source,
            })?;
    }

    // TODO: bind a spatial reference once the caller can supply one
    let layer = source
        .create_layer(layer_name, DEFAULT_GEOMETRY_TYPE, &LayerOptions::new())
        .map_err(|source| Error::LayerCreate {
            name: layer_name.to_string(),
            locator: locator.to_string(),
            source,
        })?;
    debug!(layer, name = layer_name, locator, "layer created");

    Ok(LayerSession::bind(LayerHandle::new(
        source, layer, layer_name, locator,
    )))
}
