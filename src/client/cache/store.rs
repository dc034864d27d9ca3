extern crate serde_json;
extern crate serde_yaml;

use serde_json::Value;
use std::{
    collections::HashMap,
    error::Error as StdError,
    fmt,
    fs::File,
    io,
    path::{Path, PathBuf},
    sync::Mutex,
};

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Yaml(serde_yaml::Error),
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "cache store I/O error: {}", e),
            Self::Yaml(e) => write!(f, "cache store file is corrupt: {}", e),
        }
    }
}
impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Yaml(e) => Some(e),
        }
    }
}

/// Process-wide key/value file backing the cache across restarts. Keys are
/// the cache's logical fetch identifiers, values their last-known JSON
/// shape. All access is funneled through the cache, so a plain mutex is
/// enough.
pub struct Store {
    path: PathBuf,
    map: Mutex<HashMap<String, Value>>,
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let map = match File::open(&path) {
            Ok(file) => serde_yaml::from_reader(file).map_err(Error::Yaml)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(Error::Io(e)),
        };
        Ok(Store {
            path,
            map: Mutex::new(map),
        })
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.map.lock().unwrap().get(key).cloned()
    }

    pub fn put(&self, key: &str, value: Value) -> Result<(), Error> {
        let mut map = self.map.lock().unwrap();
        map.insert(key.to_string(), value);
        let file = File::create(&self.path).map_err(Error::Io)?;
        serde_yaml::to_writer(file, &*map).map_err(Error::Yaml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.yml");
        {
            let store = Store::open(&path).unwrap();
            assert_eq!(store.get("getProfile"), None);
            store
                .put("getProfile", json!({"username": "ana", "name": "Ana"}))
                .unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert_eq!(
            store.get("getProfile"),
            Some(json!({"username": "ana", "name": "Ana"}))
        );
    }

    #[test]
    fn missing_file_is_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("absent.yml")).unwrap();
        assert_eq!(store.get("anything"), None);
    }
}
