// File: src/persistence.rs
use crate::core::table::NgramSource;
use crate::error::PersistenceError;
use crate::session::{CachedDocument, SessionIndex};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

const SNAPSHOT_FORMAT: u32 = 1;

/// The serializable state of a session: the cached token streams only. The
/// frequency table is derived data and is rebuilt on load.
#[derive(Clone, serde::Serialize, serde::Deserialize)]
struct SessionSnapshot {
    format: u32,
    n: usize,
    documents: Vec<(String, CachedDocument)>,
}

pub fn save_session(index: &SessionIndex, path: &Path) -> Result<(), PersistenceError> {
    let parent_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent_dir)?;

    let snapshot = SessionSnapshot {
        format: SNAPSHOT_FORMAT,
        n: index.order(),
        documents: index
            .documents()
            .map(|(id, document)| (id.clone(), document.clone()))
            .collect(),
    };

    let temp_file = NamedTempFile::new_in(parent_dir)?;
    {
        let mut writer = BufWriter::new(temp_file.as_file());
        bincode::serialize_into(&mut writer, &snapshot)?;
        writer.flush()?;
    }

    temp_file.persist(path).map_err(|e| e.error)?;
    info!(path = %path.display(), documents = snapshot.documents.len(), "saved session snapshot");
    Ok(())
}

/// Restores a snapshot into `index`, replacing its documents. Token streams
/// recorded at another model order are re-indexed at the index's current order.
pub fn load_session(index: &mut SessionIndex, path: &Path) -> Result<usize, PersistenceError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let snapshot: SessionSnapshot = bincode::deserialize_from(reader)?;
    if snapshot.format != SNAPSHOT_FORMAT {
        return Err(PersistenceError::UnsupportedVersion(snapshot.format));
    }

    index.clear();
    let restored = snapshot.documents.len();
    for (id, document) in snapshot.documents {
        index.insert_tokens(&id, &document.group, document.tokens);
    }
    info!(
        path = %path.display(),
        documents = restored,
        snapshot_n = snapshot.n,
        n = index.order(),
        "restored session snapshot"
    );
    Ok(restored)
}
