use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use log::debug;
use sha2::{Digest, Sha256};

use super::error::LoadError;
use super::loader::{self, SourceFormat};
use super::model::Dataset;

/// Content-keyed store of parsed datasets.
///
/// Identical bytes are parsed once; later loads return the same `Arc`.
/// Entries are never evicted since uploaded sources never change.
#[derive(Debug, Default)]
pub struct DatasetCache {
    entries: RwLock<HashMap<String, Arc<Dataset>>>,
}

/// Hex SHA-256 of the source bytes, tagged with the format they are parsed as.
pub fn content_key(bytes: &[u8], format: SourceFormat) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{format}:{:x}", hasher.finalize())
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load delimited text, reusing a previous parse of the same bytes.
    pub fn load_csv(&self, bytes: &[u8]) -> Result<Arc<Dataset>, LoadError> {
        self.get_or_load(content_key(bytes, SourceFormat::Csv), || loader::load_csv(bytes))
    }

    /// Load a JSON records array, reusing a previous parse of the same bytes.
    pub fn load_json(&self, bytes: &[u8]) -> Result<Arc<Dataset>, LoadError> {
        self.get_or_load(content_key(bytes, SourceFormat::Json), || loader::load_json(bytes))
    }

    /// Load a file keyed by its content, not its path or timestamp.
    ///
    /// The key and the parse come from one open handle, so a file renamed
    /// over `path` meanwhile cannot be cached under the old key. A writer
    /// rewriting the same inode in place is still not detected.
    pub fn load_file(&self, path: &Path) -> Result<Arc<Dataset>, LoadError> {
        let format = SourceFormat::from_path(path)?;
        let mut file = File::open(path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        self.get_or_load(content_key(&bytes, format), || match format {
            SourceFormat::Csv => loader::load_csv(&bytes),
            SourceFormat::Json => loader::load_json(&bytes),
            SourceFormat::Parquet => {
                file.rewind()?;
                loader::load_parquet_file(file)
            }
        })
    }

    fn get_or_load(
        &self,
        key: String,
        load: impl FnOnce() -> Result<Dataset, LoadError>,
    ) -> Result<Arc<Dataset>, LoadError> {
        if let Some(hit) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            debug!("dataset cache hit for {key}");
            return Ok(Arc::clone(hit));
        }

        debug!("dataset cache miss for {key}");
        let dataset = Arc::new(load()?);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // A concurrent loader may have won the race; keep the first entry.
        let entry = entries.entry(key).or_insert(dataset);
        Ok(Arc::clone(entry))
    }

    /// Number of cached datasets.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "Departamento,Tipo_Cultivo,Area_Hectareas,Produccion_Anual_Ton,Precio_Venta_Por_Ton_COP\n\
                       Huila,Cafe,1,2,3\n";

    #[test]
    fn identical_bytes_share_one_dataset() {
        let cache = DatasetCache::new();
        let a = cache.load_csv(CSV.as_bytes()).unwrap();
        let b = cache.load_csv(CSV.to_string().as_bytes()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn different_bytes_get_new_entries() {
        let cache = DatasetCache::new();
        let a = cache.load_csv(CSV.as_bytes()).unwrap();
        let other = format!("{CSV}Meta,Arroz,4,5,6\n");
        let b = cache.load_csv(other.as_bytes()).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(b.len(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failed_loads_are_not_cached() {
        let cache = DatasetCache::new();
        assert!(cache.load_csv(b"a,b\n1,2\n").is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn parquet_key_is_the_parsed_content() {
        use crate::data::export::write_parquet;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("farms.parquet");
        let records = loader::load_csv(CSV.as_bytes()).unwrap().records;
        write_parquet(&records, false, File::create(&path).unwrap()).unwrap();

        let cache = DatasetCache::new();
        let a = cache.load_file(&path).unwrap();
        let b = cache.load_file(&path).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.records, records);

        let key = content_key(&std::fs::read(&path).unwrap(), SourceFormat::Parquet);
        assert!(cache.entries.read().unwrap().contains_key(&key));
    }
}
