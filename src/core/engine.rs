// src/core/engine.rs
use crate::config::SuggestConfig;
use crate::core::model::{ModelStats, ModelStore, StaticModel};
use crate::core::rank::merge_and_rank;
use crate::core::scoring::{score, ScoringParams};
use crate::core::table::NgramSource;
use crate::core::tokenizer::Tokenizer;
use crate::core::types::{language_group_for_extension, LanguageGroup, Source, Suggestion};
use crate::error::{ModelError, PersistenceError};
use crate::model_file::{self, Compression, ModelDocument};
use crate::persistence::{load_session, save_session};
use crate::session::{SessionIndex, SessionStats};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Order used by the session index until a model says otherwise.
const DEFAULT_ORDER: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStats {
    pub model: Option<ModelStats>,
    pub session: SessionStats,
}

/// Facade the hosts talk to: one static model, one session index and the
/// scoring parameters derived from the config.
///
/// Document events take `&mut self` and suggestions take `&self`; a host that
/// serves requests from several threads must wrap the engine in a mutex.
pub struct SuggestionEngine {
    config: SuggestConfig,
    params: ScoringParams,
    store: ModelStore,
    session: SessionIndex,
}

impl SuggestionEngine {
    pub fn new(config: SuggestConfig) -> Self {
        let params = config.scoring_params();
        let session = SessionIndex::new(DEFAULT_ORDER).with_dampening(config.scoring.session_dampening);
        Self {
            config,
            params,
            store: ModelStore::new(),
            session,
        }
    }

    /// Builds an engine and loads whatever the config points at. A model or
    /// snapshot that fails to load is logged once and left out: the engine
    /// then serves empty suggestions until `load_model` succeeds.
    pub fn from_config(config: SuggestConfig) -> Self {
        let mut engine = Self::new(config);
        if let Some(path) = engine.config.model.path.clone() {
            if let Err(e) = engine.load_model(&path) {
                error!(path = %path.display(), error = %e, "could not load model");
            }
        }
        if let Some(path) = engine.config.session.snapshot_path.clone() {
            if path.exists() {
                if let Err(e) = engine.restore_session(&path) {
                    warn!(path = %path.display(), error = %e, "could not restore session snapshot");
                }
            }
        }
        engine
    }

    pub fn config(&self) -> &SuggestConfig {
        &self.config
    }

    pub fn load_model(&mut self, path: &Path) -> Result<ModelStats, ModelError> {
        let model = model_file::load_model(path)?;
        Ok(self.install_model(model))
    }

    /// Swaps in `model` and re-indexes open documents at its order.
    pub fn install_model(&mut self, model: StaticModel) -> ModelStats {
        let stats = model.stats();
        if self.session.order() != stats.n {
            info!(from = self.session.order(), to = stats.n, "re-indexing session for new model order");
            self.session.reindex(stats.n);
        }
        if let Some(previous) = self.store.replace(model) {
            debug!(version = %previous.meta().version, "replaced previous model");
        }
        stats
    }

    pub fn unload_model(&mut self) -> bool {
        self.store.unload().is_some()
    }

    pub fn has_model(&self) -> bool {
        self.store.is_loaded()
    }

    /// Indexes an opened document. The language group comes from the id's file
    /// extension; ids without one are not indexed and `false` is returned.
    pub fn open_document(&mut self, id: &str, text: &str) -> bool {
        if !self.config.suggest.session_index {
            return false;
        }
        match group_for_document(id) {
            Some(group) => {
                self.session.insert(id, &group, text);
                true
            }
            None => {
                debug!(document = id, "document has no extension, not indexed");
                false
            }
        }
    }

    pub fn change_document(&mut self, id: &str, text: &str) -> bool {
        if !self.config.suggest.session_index {
            return false;
        }
        match group_for_document(id) {
            Some(group) => {
                self.session.update(id, &group, text);
                true
            }
            None => false,
        }
    }

    pub fn close_document(&mut self, id: &str) -> bool {
        self.session.remove(id)
    }

    /// Ranked next-token suggestions for the text before the cursor in a file
    /// with the given extension. Empty when no model is loaded.
    pub fn suggest(&self, text_before_cursor: &str, extension: &str) -> Vec<Suggestion> {
        // 1. No model configured means no suggestions, session included
        let model = match self.store.snapshot() {
            Some(model) => model,
            None => return Vec::new(),
        };

        // 2. Resolve the equivalent groups and tokenize in the requested dialect
        let groups = self.config.languages.groups_for(extension);
        let tokens = Tokenizer::for_group(&groups[0]).tokenize(text_before_cursor);

        // 3. Score against the static model and, if enabled, the open documents
        let static_suggestions = score(&*model, Source::Static, &tokens, &groups, &self.params);
        let session_suggestions = if self.config.suggest.session_index {
            self.session.suggest(&tokens, &groups, self.params.max_results, self.params.min_confidence)
        } else {
            Vec::new()
        };

        // 4. Merge, dedup and rank
        merge_and_rank(
            static_suggestions,
            session_suggestions,
            self.params.max_results,
            self.config.scoring.tie_epsilon,
        )
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            model: self.store.snapshot().map(|model| model.stats()),
            session: self.session.stats(),
        }
    }

    pub fn clear_session(&mut self) {
        self.session.clear();
        info!("cleared session index");
    }

    pub fn session(&self) -> &SessionIndex {
        &self.session
    }

    /// Writes the open-document index as a model file.
    pub fn export_session(&self, path: &Path, compression: Compression) -> Result<(), ModelError> {
        model_file::write_model(path, &ModelDocument::from_session(&self.session), compression)
    }

    pub fn save_session(&self, path: &Path) -> Result<(), PersistenceError> {
        save_session(&self.session, path)
    }

    pub fn restore_session(&mut self, path: &Path) -> Result<usize, PersistenceError> {
        load_session(&mut self.session, path)
    }
}

fn group_for_document(id: &str) -> Option<LanguageGroup> {
    Path::new(id)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(language_group_for_extension)
}
