//! Whole-catalog persistence to a single snapshot file.
//!
//! The format borrows the checksum-then-length-then-payload framing used
//! elsewhere in this crate for on-disk records: a fixed magic/version
//! header followed by one length-prefixed, crc32-checked record per store.
//! A write goes to a temp file beside the target path and is renamed into
//! place, so a crash mid-write never leaves a half-written snapshot at the
//! configured location.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::index::hnsw::{HnswIndex, HnswSnapshot};
use crate::index::kdtree::KdTree;
use crate::index::{NonLinearIndexConfig, NonLinearKind};
use crate::metadata::StoreValue;
use crate::store::Store;
use crate::vector::Vector;

const MAGIC: &[u8; 8] = b"LUMENDB\x01";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreRecord {
    name: String,
    dimension: usize,
    predicate_fields: Vec<String>,
    entries: Vec<(Vec<f32>, StoreValue)>,
    non_linear: Vec<NonLinearRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
enum NonLinearRecord {
    Hnsw(HnswSnapshot),
    KdTree {
        config: crate::index::kdtree::KdTreeConfig,
        points: Vec<(u64, Vec<f32>)>,
    },
}

fn write_record<W: Write>(writer: &mut W, record: &StoreRecord) -> Result<()> {
    let data = serde_json::to_vec(record).map_err(|e| Error::SnapshotWriteFailed(e.to_string()))?;
    let checksum = crc32fast::hash(&data);
    let length = data.len() as u32;
    writer.write_all(&checksum.to_le_bytes())?;
    writer.write_all(&length.to_le_bytes())?;
    writer.write_all(&data)?;
    Ok(())
}

fn read_record<R: Read>(reader: &mut R) -> Result<Option<StoreRecord>> {
    let mut checksum_buf = [0u8; 4];
    match reader.read_exact(&mut checksum_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let expected_checksum = u32::from_le_bytes(checksum_buf);

    let mut length_buf = [0u8; 4];
    reader.read_exact(&mut length_buf)?;
    let length = u32::from_le_bytes(length_buf) as usize;

    let mut data = vec![0u8; length];
    reader.read_exact(&mut data)?;

    let actual_checksum = crc32fast::hash(&data);
    if actual_checksum != expected_checksum {
        return Err(Error::IndexCorrupted(format!(
            "checksum mismatch: expected {expected_checksum}, got {actual_checksum}"
        )));
    }

    let record: StoreRecord =
        serde_json::from_slice(&data).map_err(|e| Error::IndexCorrupted(e.to_string()))?;
    Ok(Some(record))
}

/// Serializes every store in `catalog` and atomically replaces the file at
/// `path`.
pub fn save(catalog: &Catalog, path: &Path) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(MAGIC)?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes())?;

        let names = catalog.store_names();
        writer.write_all(&(names.len() as u32).to_le_bytes())?;

        for name in names {
            catalog.with_store_read(&name, |store| {
                let record = build_record(&name, store);
                write_record(&mut writer, &record)
            })?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn build_record(name: &str, store: &Store) -> StoreRecord {
    let entries = store
        .iter_entries()
        .map(|(v, value)| (v.as_slice().to_vec(), value.clone()))
        .collect();

    let non_linear = store
        .non_linear_configs()
        .into_iter()
        .map(|config| match config {
            NonLinearIndexConfig::Hnsw(_) => {
                NonLinearRecord::Hnsw(store.hnsw_export().expect("hnsw config implies hnsw export"))
            }
            NonLinearIndexConfig::KdTree(config) => NonLinearRecord::KdTree {
                config,
                points: store.kdtree_export_points().unwrap_or_default(),
            },
        })
        .collect();

    StoreRecord {
        name: name.to_string(),
        dimension: store.dimension(),
        predicate_fields: store.predicate_fields(),
        entries,
        non_linear,
    }
}

/// Rebuilds a `Store` from a deserialized record, replaying every vector
/// through `set` so predicate indexes come up consistent, then restoring
/// non-linear indexes directly from their exported state.
fn restore_store(record: StoreRecord, allocator: Arc<crate::limits::BoundedAllocator>) -> Result<Store> {
    let mut store = Store::new(record.dimension, &record.predicate_fields, &[], allocator);

    let entries = record
        .entries
        .into_iter()
        .map(|(data, value)| Ok((Vector::new(data)?, value)))
        .collect::<Result<Vec<_>>>()?;
    store.set(entries)?;

    for non_linear in record.non_linear {
        match non_linear {
            NonLinearRecord::Hnsw(snapshot) => {
                let index = HnswIndex::import(snapshot)?;
                store.restore_hnsw(index);
            }
            NonLinearRecord::KdTree { config, points } => {
                let mut tree = KdTree::new(config);
                for (id, vector) in points {
                    tree.insert(id, Vector::new(vector)?)?;
                }
                store.restore_kdtree(tree);
            }
        }
    }

    Ok(store)
}

/// Loads every store from `path` and inserts them into `catalog`, replacing
/// any store with the same name.
///
/// When `path` doesn't exist this is a no-op: a fresh catalog with no prior
/// snapshot is not a load failure.
pub fn load(catalog: &Catalog, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let file = OpenOptions::new()
        .read(true)
        .open(path)
        .map_err(|_| Error::PersistLoadFailed)?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic).map_err(|_| Error::PersistLoadFailed)?;
    if &magic != MAGIC {
        return Err(Error::PersistLoadFailed);
    }

    let mut version_buf = [0u8; 4];
    reader.read_exact(&mut version_buf).map_err(|_| Error::PersistLoadFailed)?;
    if u32::from_le_bytes(version_buf) != FORMAT_VERSION {
        return Err(Error::PersistLoadFailed);
    }

    let mut count_buf = [0u8; 4];
    reader.read_exact(&mut count_buf).map_err(|_| Error::PersistLoadFailed)?;
    let count = u32::from_le_bytes(count_buf);

    for _ in 0..count {
        let record = read_record(&mut reader)
            .map_err(|_| Error::PersistLoadFailed)?
            .ok_or(Error::PersistLoadFailed)?;
        let name = record.name.clone();
        let store = restore_store(record, catalog.allocator().clone()).map_err(|_| Error::PersistLoadFailed)?;
        catalog.insert_store(name, store);
    }

    Ok(())
}

/// How a failed [`load`] at startup should be handled, controlled by the
/// `--fail-on-startup-if-persist-load-fails` flag.
pub enum LoadFailurePolicy {
    /// Propagate the error; the caller should abort startup.
    Strict,
    /// Swallow the error and start from an empty catalog.
    Lenient,
}

/// Loads `path` into `catalog` honoring `policy`. Returns `Ok(false)` when a
/// lenient load swallowed an error (so the caller can still log it).
pub fn load_with_policy(catalog: &Catalog, path: &Path, policy: LoadFailurePolicy) -> Result<bool> {
    match load(catalog, path) {
        Ok(()) => Ok(true),
        Err(e) => match policy {
            LoadFailurePolicy::Strict => Err(e),
            LoadFailurePolicy::Lenient => {
                catalog.purge_stores();
                Ok(false)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::hnsw::HnswConfig;
    use crate::limits::BoundedAllocator;
    use crate::predicate::Condition;

    fn allocator() -> Arc<BoundedAllocator> {
        Arc::new(BoundedAllocator::new(1024 * 1024 * 1024))
    }

    fn temp_path(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("lumendb_snapshot_tests");
        fs::create_dir_all(&dir).unwrap();
        dir.join(format!("{tag}_{:?}.bin", std::thread::current().id()))
    }

    #[test]
    fn test_save_and_load_round_trip_entries() {
        let path = temp_path("round_trip");
        let cat = Catalog::new(allocator());
        cat.create_store("s", 3, &["tag".to_string()], &[], false).unwrap();
        cat.with_store_write("s", |store| {
            store.set(vec![
                (Vector::new(vec![1.0, 0.0, 0.0]).unwrap(), StoreValue::new().with_field("tag", "a")),
                (Vector::new(vec![0.0, 1.0, 0.0]).unwrap(), StoreValue::new().with_field("tag", "b")),
            ])
        })
        .unwrap();

        save(&cat, &path).unwrap();

        let restored = Catalog::new(allocator());
        load(&restored, &path).unwrap();
        assert_eq!(restored.store_names(), vec!["s".to_string()]);
        let found = restored
            .with_store_read("s", |store| Ok(store.get_pred(&Condition::equals("tag", "a"))))
            .unwrap();
        assert_eq!(found.len(), 1);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_missing_file_is_noop() {
        let path = temp_path("missing");
        let _ = fs::remove_file(&path);
        let cat = Catalog::new(allocator());
        assert!(load(&cat, &path).is_ok());
        assert!(cat.store_names().is_empty());
    }

    #[test]
    fn test_load_corrupted_file_errors_strict_starts_empty_lenient() {
        let path = temp_path("corrupted");
        fs::write(&path, b"not a valid snapshot").unwrap();

        let strict = Catalog::new(allocator());
        assert!(load_with_policy(&strict, &path, LoadFailurePolicy::Strict).is_err());

        let lenient = Catalog::new(allocator());
        lenient.create_store("leftover", 2, &[], &[], false).unwrap();
        let ok = load_with_policy(&lenient, &path, LoadFailurePolicy::Lenient).unwrap();
        assert!(!ok);
        assert!(lenient.store_names().is_empty());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_hnsw_adjacency_survives_round_trip() {
        let path = temp_path("hnsw");
        let cat = Catalog::new(allocator());
        cat.create_store(
            "s",
            4,
            &[],
            &[NonLinearIndexConfig::Hnsw(HnswConfig::with_m(4))],
            false,
        )
        .unwrap();
        cat.with_store_write("s", |store| {
            let entries = (0..10u32)
                .map(|i| {
                    let data: Vec<f32> = (0..4).map(|j| ((i + j) as f32).cos()).collect();
                    (Vector::new(data).unwrap(), StoreValue::new())
                })
                .collect();
            store.set(entries)
        })
        .unwrap();

        save(&cat, &path).unwrap();

        let restored = Catalog::new(allocator());
        load(&restored, &path).unwrap();
        let results = restored
            .with_store_read("s", |store| {
                store.get_sim_n(
                    &Vector::new(vec![1.0, 1.0, 1.0, 1.0]).unwrap(),
                    3,
                    crate::distance::SimilarityAlgorithm::Hnsw,
                    None,
                    None,
                )
            })
            .unwrap();
        assert_eq!(results.len(), 3);
        let _ = fs::remove_file(&path);
    }
}
