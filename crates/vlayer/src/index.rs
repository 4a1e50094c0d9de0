//! Building the ordinal → offset table from the source itself.

use fidx::OffsetTable;
use tracing::debug;

use crate::source::DataSource;
use crate::Error;

/// Scans `layer` front to back, recording each feature's source identifier
/// as the offset of the next ordinal.
///
/// This is the expensive path a persisted index exists to avoid. Sequential
/// reading of the layer is reset before and after the scan.
pub fn build<S: DataSource>(source: &mut S, layer: usize) -> Result<OffsetTable, Error> {
    source.reset_reading(layer);
    let mut offsets = Vec::new();
    while let Some(feature) = source.next_feature(layer)? {
        offsets.push(feature.fid);
    }
    source.reset_reading(layer);

    debug!(records = offsets.len(), layer, "feature index built");
    Ok(OffsetTable::new(offsets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryLayer, MemoryProvider};
    use crate::source::{GeometryType, Provider};

    #[test]
    fn build_scans_from_the_start() {
        let p = MemoryProvider::new();
        let mut layer = MemoryLayer::new("l", GeometryType::Point);
        for fid in [3, 8, 21] {
            layer.push_with_fid(fid, None);
        }
        p.insert_layer("mem://x", layer);

        let mut ds = p.open("mem://x", false).unwrap();
        // leave the source mid-way through the layer
        ds.next_feature(0).unwrap();

        let table = build(&mut ds, 0).unwrap();
        assert_eq!(table.as_slice(), &[3, 8, 21]);
        assert_eq!(ds.next_feature(0).unwrap().map(|f| f.fid), Some(3));
    }

    #[test]
    fn empty_layer_builds_empty_table() {
        let p = MemoryProvider::new();
        p.insert_layer("mem://x", MemoryLayer::new("l", GeometryType::Point));
        let mut ds = p.open("mem://x", false).unwrap();
        assert!(build(&mut ds, 0).unwrap().is_empty());
    }
}
