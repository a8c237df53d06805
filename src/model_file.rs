// File: src/model_file.rs
//! Reading and writing the serialized model document.
//!
//! A model file is a JSON object:
//!
//! ```text
//! { "version": "2.2", "n": 4,
//!   "ngrams": { ".py": { "[\"def\", \"f\", \"(\"]": { "self": 12, "x": 3 } } },
//!   "vocab": { ".py": ["def", "f", ...] },
//!   "file_extensions": [".py"], "total_patterns": 15,
//!   "smoothing": "laplace", "alpha": 1.0 }
//! ```
//!
//! stored either as plain text or compressed with gzip or zstd. The format is
//! detected from the first two bytes when reading; the file name only picks the
//! container when writing.

use crate::core::context::ContextKey;
use crate::core::model::{ModelMeta, Smoothing, StaticModel, DEFAULT_ALPHA};
use crate::core::table::{total_count, FrequencyTable, GroupTable, NgramSource};
use crate::core::types::{LanguageGroup, Token, TokenCounts};
use crate::error::ModelError;
use crate::session::SessionIndex;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{info, warn};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZSTD_MAGIC: [u8; 2] = [0x28, 0xb5];
const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Zstd,
}

impl Compression {
    /// Sniffs the container format from the leading bytes.
    pub fn detect(bytes: &[u8]) -> Self {
        match bytes.get(..2) {
            Some(magic) if magic == GZIP_MAGIC => Compression::Gzip,
            Some(magic) if magic == ZSTD_MAGIC => Compression::Zstd,
            _ => Compression::None,
        }
    }

    /// Picks the container from a file name: `.gz` and `.zst` suffixes, plain otherwise.
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("gz") => Compression::Gzip,
            Some("zst") => Compression::Zstd,
            _ => Compression::None,
        }
    }
}

/// The on-disk shape of a model, field for field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDocument {
    #[serde(default)]
    pub version: String,
    pub n: usize,
    /// group -> encoded context -> next token -> count
    #[serde(default)]
    pub ngrams: BTreeMap<LanguageGroup, EncodedContexts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vocab: Option<BTreeMap<LanguageGroup, Vec<Token>>>,
    #[serde(default)]
    pub file_extensions: Vec<String>,
    #[serde(default)]
    pub total_patterns: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smoothing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
}

impl ModelDocument {
    /// Validates the document and builds the in-memory model.
    ///
    /// Context keys that are not JSON string arrays of length `n - 1` are
    /// skipped, as are non-positive counts; each skip is logged.
    pub fn into_model(self) -> Result<StaticModel, ModelError> {
        if self.n < 2 {
            return Err(ModelError::InvalidOrder(self.n));
        }
        let smoothing = parse_smoothing(self.smoothing.as_deref(), self.alpha)?;
        let width = self.n - 1;

        let mut table = FrequencyTable::new();
        let mut skipped_keys = 0usize;
        let mut dropped_counts = 0usize;
        for (group, contexts) in self.ngrams {
            let mut group_table = GroupTable::new();
            for (encoded, counts) in contexts {
                let key = match ContextKey::decode(&encoded) {
                    Some(key) if key.len() == width => key,
                    _ => {
                        skipped_keys += 1;
                        continue;
                    }
                };
                let mut distribution = TokenCounts::new();
                for (token, count) in counts {
                    if count > 0 {
                        distribution.insert(token, count as u64);
                    } else {
                        dropped_counts += 1;
                    }
                }
                group_table.insert_distribution(key, distribution);
            }
            table.insert_group(group, group_table);
        }
        if skipped_keys > 0 {
            warn!(skipped_keys, expected_width = width, "skipped malformed context keys");
        }
        if dropped_counts > 0 {
            warn!(dropped_counts, "dropped non-positive counts");
        }

        let meta = ModelMeta {
            version: self.version,
            n: self.n,
            file_extensions: self.file_extensions,
            total_patterns: self.total_patterns,
            smoothing,
        };
        StaticModel::new(meta, table, self.vocab.unwrap_or_default())
    }

    pub fn from_model(model: &StaticModel) -> Self {
        let meta = model.meta();
        let (smoothing, alpha) = smoothing_fields(meta.smoothing);
        Self {
            version: meta.version.clone(),
            n: meta.n,
            ngrams: encode_table(model.table()),
            vocab: Some(model.vocabularies().clone()).filter(|v| !v.is_empty()),
            file_extensions: meta.file_extensions.clone(),
            total_patterns: meta.total_patterns,
            smoothing,
            alpha,
        }
    }

    /// Exports the open-document index as a standalone model with additive
    /// smoothing over the tokens seen per group.
    pub fn from_session(index: &SessionIndex) -> Self {
        let mut vocab: BTreeMap<LanguageGroup, Vec<Token>> = BTreeMap::new();
        for (_, document) in index.documents() {
            vocab.entry(document.group.clone()).or_default().extend(document.tokens.iter().cloned());
        }
        for tokens in vocab.values_mut() {
            let distinct: BTreeSet<Token> = tokens.drain(..).collect();
            tokens.extend(distinct);
        }

        let table = index.table();
        let total_patterns = table
            .groups()
            .flat_map(|(_, group)| group.iter())
            .map(|(_, counts)| total_count(counts))
            .fold(0u64, |acc, total| acc.saturating_add(u64::try_from(total).unwrap_or(u64::MAX)));
        let (smoothing, alpha) = smoothing_fields(Smoothing::Additive { alpha: DEFAULT_ALPHA });

        Self {
            version: "session".to_string(),
            n: index.order(),
            ngrams: encode_table(table),
            file_extensions: vocab.keys().cloned().collect(),
            vocab: Some(vocab),
            total_patterns,
            smoothing,
            alpha,
        }
    }
}

fn parse_smoothing(name: Option<&str>, alpha: Option<f64>) -> Result<Smoothing, ModelError> {
    match name {
        None | Some("none") => Ok(Smoothing::None),
        Some("laplace") | Some("additive") => Smoothing::additive(alpha.unwrap_or(DEFAULT_ALPHA)),
        Some(other) => {
            warn!(smoothing = other, "unsupported smoothing method, falling back to none");
            Ok(Smoothing::None)
        }
    }
}

fn smoothing_fields(smoothing: Smoothing) -> (Option<String>, Option<f64>) {
    match smoothing {
        Smoothing::None => (Some("none".to_string()), None),
        Smoothing::Additive { alpha } => (Some("laplace".to_string()), Some(alpha)),
    }
}

type EncodedContexts = BTreeMap<String, BTreeMap<Token, i64>>;

fn encode_table(table: &FrequencyTable) -> BTreeMap<LanguageGroup, EncodedContexts> {
    table
        .groups()
        .map(|(group, contexts)| {
            let encoded: EncodedContexts = contexts
                .iter()
                .map(|(key, counts)| {
                    let counts: BTreeMap<Token, i64> = counts
                        .iter()
                        .map(|(token, count)| (token.clone(), i64::try_from(*count).unwrap_or(i64::MAX)))
                        .collect();
                    (key.encode(), counts)
                })
                .collect();
            (group.clone(), encoded)
        })
        .collect()
}

/// Decompresses (if needed) and parses raw model bytes.
pub fn parse_model_bytes(bytes: &[u8]) -> Result<StaticModel, ModelError> {
    let compression = Compression::detect(bytes);
    let document: ModelDocument = match compression {
        Compression::None => serde_json::from_slice(bytes)?,
        Compression::Gzip => {
            let mut text = Vec::new();
            GzDecoder::new(bytes)
                .read_to_end(&mut text)
                .map_err(|source| ModelError::Decompress { format: "gzip", source })?;
            serde_json::from_slice(&text)?
        }
        Compression::Zstd => {
            let text = zstd::decode_all(bytes).map_err(|source| ModelError::Decompress { format: "zstd", source })?;
            serde_json::from_slice(&text)?
        }
    };
    document.into_model()
}

/// Reads and parses a model file.
pub fn load_model(path: &Path) -> Result<StaticModel, ModelError> {
    let read_error = |source: std::io::Error| ModelError::Read { path: path.to_path_buf(), source };
    let file = File::open(path).map_err(read_error)?;
    let mut bytes = Vec::new();
    BufReader::new(file).read_to_end(&mut bytes).map_err(read_error)?;

    let model = parse_model_bytes(&bytes)?;
    let stats = model.stats();
    info!(
        path = %path.display(),
        version = %stats.version,
        n = stats.n,
        groups = ?stats.groups,
        contexts = stats.contexts,
        smoothing = ?model.meta().smoothing,
        "loaded model"
    );
    Ok(model)
}

/// Writes a model document atomically: a temp file in the target directory is
/// filled and then renamed over `path`.
pub fn write_model(path: &Path, document: &ModelDocument, compression: Compression) -> Result<(), ModelError> {
    let parent_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent_dir)?;

    let temp_file = NamedTempFile::new_in(parent_dir)?;
    {
        let mut writer = BufWriter::new(temp_file.as_file());
        match compression {
            Compression::None => {
                serde_json::to_writer_pretty(&mut writer, document)?;
            }
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(&mut writer, flate2::Compression::default());
                serde_json::to_writer(&mut encoder, document)?;
                encoder.finish()?;
            }
            Compression::Zstd => {
                let json = serde_json::to_vec(document)?;
                let compressed = zstd::encode_all(&json[..], ZSTD_LEVEL)?;
                writer.write_all(&compressed)?;
            }
        }
        writer.flush()?;
    }

    temp_file.persist(path).map_err(|e| e.error)?;
    info!(path = %path.display(), ?compression, "wrote model");
    Ok(())
}
