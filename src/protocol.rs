//! JSON-lines messages exchanged with the editor host, one object per line.

use crate::core::engine::SuggestionEngine;
use crate::core::model::ModelStats;
use crate::core::types::Suggestion;
use crate::model_file::Compression;
use crate::session::SessionStats;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    LoadModel {
        path: PathBuf,
    },
    Open {
        id: String,
        text: String,
    },
    Change {
        id: String,
        text: String,
    },
    Close {
        id: String,
    },
    Suggest {
        request_id: String,
        /// Document text up to the cursor.
        context: String,
        /// File extension of the document, e.g. `"py"` or `".py"`.
        extension: String,
    },
    Stats,
    Clear,
    ExportSession {
        path: PathBuf,
        #[serde(default)]
        compression: Option<Compression>,
    },
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineMessage {
    ModelLoaded {
        version: String,
        n: usize,
        groups: Vec<String>,
        contexts: usize,
    },
    Suggestions {
        request_id: String,
        suggestions: Vec<Suggestion>,
    },
    Stats {
        model: Option<ModelStats>,
        documents: usize,
        groups: usize,
    },
    Ok {
        op: String,
        /// Whether a document event reached the session index.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        indexed: Option<bool>,
    },
    Error {
        message: String,
    },
}

impl EngineMessage {
    pub fn model_loaded(stats: ModelStats) -> Self {
        EngineMessage::ModelLoaded {
            version: stats.version,
            n: stats.n,
            groups: stats.groups,
            contexts: stats.contexts,
        }
    }

    pub fn stats(model: Option<ModelStats>, session: SessionStats) -> Self {
        EngineMessage::Stats {
            model,
            documents: session.documents,
            groups: session.groups,
        }
    }

    pub fn ok(op: &str) -> Self {
        EngineMessage::Ok { op: op.to_string(), indexed: None }
    }

    pub fn indexed(op: &str, indexed: bool) -> Self {
        EngineMessage::Ok { op: op.to_string(), indexed: Some(indexed) }
    }

    pub fn error(err: impl std::fmt::Display) -> Self {
        EngineMessage::Error { message: err.to_string() }
    }
}

/// Applies one request to the engine and builds its reply.
pub fn handle(engine: &mut SuggestionEngine, message: ClientMessage) -> EngineMessage {
    match message {
        ClientMessage::LoadModel { path } => match engine.load_model(&path) {
            Ok(stats) => EngineMessage::model_loaded(stats),
            Err(e) => EngineMessage::error(e),
        },
        ClientMessage::Open { id, text } => EngineMessage::indexed("open", engine.open_document(&id, &text)),
        ClientMessage::Change { id, text } => EngineMessage::indexed("change", engine.change_document(&id, &text)),
        ClientMessage::Close { id } => {
            engine.close_document(&id);
            EngineMessage::ok("close")
        }
        ClientMessage::Suggest {
            request_id,
            context,
            extension,
        } => EngineMessage::Suggestions {
            request_id,
            suggestions: engine.suggest(&context, &extension),
        },
        ClientMessage::Stats => {
            let stats = engine.stats();
            EngineMessage::stats(stats.model, stats.session)
        }
        ClientMessage::Clear => {
            engine.clear_session();
            EngineMessage::ok("clear")
        }
        ClientMessage::ExportSession { path, compression } => {
            let compression = compression.unwrap_or_else(|| Compression::for_path(&path));
            match engine.export_session(&path, compression) {
                Ok(()) => EngineMessage::ok("export_session"),
                Err(e) => EngineMessage::error(e),
            }
        }
        ClientMessage::Shutdown => EngineMessage::ok("shutdown"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SuggestConfig;
    use crate::core::types::Source;

    fn request(engine: &mut SuggestionEngine, line: &str) -> String {
        let message: ClientMessage = serde_json::from_str(line).unwrap();
        serde_json::to_string(&handle(engine, message)).unwrap()
    }

    #[test]
    fn parses_tagged_requests() {
        let message: ClientMessage =
            serde_json::from_str(r#"{"type":"suggest","request_id":"7","context":"foo(","extension":"py"}"#).unwrap();
        match message {
            ClientMessage::Suggest { request_id, context, extension } => {
                assert_eq!(request_id, "7");
                assert_eq!(context, "foo(");
                assert_eq!(extension, "py");
            }
            other => panic!("unexpected message {other:?}"),
        }

        let export: ClientMessage =
            serde_json::from_str(r#"{"type":"export_session","path":"/tmp/s.json.gz","compression":"gzip"}"#).unwrap();
        assert!(matches!(export, ClientMessage::ExportSession { compression: Some(Compression::Gzip), .. }));
        assert!(matches!(serde_json::from_str(r#"{"type":"shutdown"}"#).unwrap(), ClientMessage::Shutdown));
    }

    #[test]
    fn replies_carry_source_tags() {
        let reply = EngineMessage::Suggestions {
            request_id: "1".to_string(),
            suggestions: vec![Suggestion::new("bar", 0.75, Source::Session)],
        };
        let line = serde_json::to_string(&reply).unwrap();
        assert_eq!(
            line,
            r#"{"type":"suggestions","request_id":"1","suggestions":[{"token":"bar","confidence":0.75,"source":"session"}]}"#
        );
    }

    #[test]
    fn document_events_report_whether_they_were_indexed() {
        let mut engine = SuggestionEngine::new(SuggestConfig::default());
        assert_eq!(
            request(&mut engine, r#"{"type":"open","id":"src/app.py","text":"x = 1"}"#),
            r#"{"type":"ok","op":"open","indexed":true}"#
        );
        assert_eq!(
            request(&mut engine, r#"{"type":"change","id":"Makefile","text":"all: build"}"#),
            r#"{"type":"ok","op":"change","indexed":false}"#
        );
        assert_eq!(request(&mut engine, r#"{"type":"clear"}"#), r#"{"type":"ok","op":"clear"}"#);
    }

    #[test]
    fn requests_without_a_model_are_answered() {
        let mut engine = SuggestionEngine::new(SuggestConfig::default());
        assert_eq!(
            request(&mut engine, r#"{"type":"suggest","request_id":"3","context":"foo(","extension":"py"}"#),
            r#"{"type":"suggestions","request_id":"3","suggestions":[]}"#
        );
        let reply = request(&mut engine, r#"{"type":"load_model","path":"/nonexistent/model.json.gz"}"#);
        assert!(reply.starts_with(r#"{"type":"error""#));
    }
}
