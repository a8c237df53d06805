use anyhow::Result;
use ngram_core::logging::init_logging;
use ngram_core::protocol::{handle, ClientMessage, EngineMessage};
use ngram_core::{SuggestConfig, SuggestionEngine};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{debug, info, warn};

fn main() -> Result<()> {
    init_logging("info");

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = SuggestConfig::load(config_path.as_deref())?;
    info!(
        model = ?config.model.path,
        max_results = config.suggest.max_results,
        min_confidence = config.suggest.min_confidence,
        fuzzy = config.suggest.fuzzy,
        smoothing = config.suggest.smoothing,
        session_index = config.suggest.session_index,
        "loaded code-ngram config"
    );
    let snapshot_path = config.session.snapshot_path.clone();
    let mut engine = SuggestionEngine::from_config(config);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let input = line?;
        if input.trim().is_empty() {
            continue;
        }
        debug!(request = %input, "<- host");

        let message = match serde_json::from_str::<ClientMessage>(&input) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "malformed request");
                reply(&mut stdout, &EngineMessage::error(format!("malformed request: {e}")))?;
                continue;
            }
        };

        let shutdown = matches!(message, ClientMessage::Shutdown);
        let response = handle(&mut engine, message);
        reply(&mut stdout, &response)?;
        if shutdown {
            break;
        }
    }

    if let Some(path) = snapshot_path {
        if let Err(e) = engine.save_session(&path) {
            warn!(path = %path.display(), error = %e, "could not save session snapshot");
        }
    }
    info!("shutting down");
    Ok(())
}

fn reply(stdout: &mut io::Stdout, message: &EngineMessage) -> Result<()> {
    let line = serde_json::to_string(message)?;
    writeln!(stdout, "{line}")?;
    stdout.flush()?;
    Ok(())
}
