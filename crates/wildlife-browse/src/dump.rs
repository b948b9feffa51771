//! JSON save dumps on disk.
//!
//! A dump directory holds one `<map>.json` file per partition (an array of
//! records) and an optional `names.json` class → name table.

use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use wildlife_core::{FetchError, PartitionId, Record};
use wildlife_query::{RecordSource, TableResolver};

/// Name table file inside a dump directory.
const NAMES_FILE: &str = "names.json";

/// Record source reading `<map>.json` files from a directory.
pub struct JsonDumpSource {
    dir: PathBuf,
}

impl JsonDumpSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn partition_path(&self, partition: &PartitionId) -> PathBuf {
        self.dir.join(format!("{}.json", partition))
    }
}

impl RecordSource for JsonDumpSource {
    fn fetch(
        &self,
        partition: &PartitionId,
        _force_refresh: bool,
    ) -> BoxFuture<'static, Result<Vec<Record>, FetchError>> {
        let path = self.partition_path(partition);

        Box::pin(async move {
            tracing::debug!("Reading {}", path.display());
            let text = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| FetchError::Io(format!("{}: {}", path.display(), e)))?;
            serde_json::from_str(&text)
                .map_err(|e| FetchError::Parse(format!("{}: {}", path.display(), e)))
        })
    }
}

/// Load the name table of a dump directory. A missing table is empty.
pub fn load_names(dir: &Path) -> Result<TableResolver, FetchError> {
    let path = dir.join(NAMES_FILE);
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("No {} in {}, showing class names", NAMES_FILE, dir.display());
            return Ok(TableResolver::default());
        }
        Err(e) => return Err(FetchError::Io(format!("{}: {}", path.display(), e))),
    };
    serde_json::from_str(&text).map_err(|e| FetchError::Parse(format!("{}: {}", path.display(), e)))
}
