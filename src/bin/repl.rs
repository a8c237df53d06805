use anyhow::{Context, Result};
use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};
use ngram_core::logging::init_logging;
use ngram_core::{Source, SuggestConfig, Suggestion, SuggestionEngine};
use std::io::{stdin, stdout, Write};
use std::path::Path;

fn main() -> Result<()> {
    init_logging("warn");

    let mut args = std::env::args().skip(1);
    let mut config = SuggestConfig::load(None).context("failed to read config")?;
    if let Some(model_path) = args.next() {
        config.model.path = Some(model_path.into());
    }
    let wanted_model = config.model.path.clone();
    let mut engine = SuggestionEngine::from_config(config);
    let mut extension = args.next().unwrap_or_else(|| "py".to_string());
    let mut buffer = String::new();
    let mut status = String::new();
    if let (Some(path), false) = (wanted_model, engine.has_model()) {
        status = format!("could not load {}, try :load <model>", path.display());
    }

    loop {
        let suggestions = engine.suggest(&buffer, &extension);
        print_ui(&engine, &extension, &buffer, &suggestions, &status)?;
        status.clear();

        let mut input = String::new();
        if stdin().read_line(&mut input)? == 0 {
            break;
        }
        let cmd = input.trim_end_matches(&['\r', '\n'][..]);

        match cmd {
            ":q" | "exit" => break,
            "" => buffer.push('\n'),
            ":clear" => buffer.clear(),
            s if s.starts_with(":load ") => match engine.load_model(Path::new(s[6..].trim())) {
                Ok(stats) => status = format!("loaded model {} (n = {})", stats.version, stats.n),
                Err(e) => status = format!("error: {e}"),
            },
            s if s.starts_with(":open ") => {
                let path = s[6..].trim();
                match std::fs::read_to_string(path) {
                    Ok(text) if engine.open_document(path, &text) => status = format!("indexed {path}"),
                    Ok(_) => status = format!("{path} has no extension, not indexed"),
                    Err(e) => status = format!("error: {e}"),
                }
            }
            s if s.starts_with(":ext ") => extension = s[5..].trim().to_string(),
            s if s.starts_with(':') && s.len() > 1 => {
                // Select suggestion :1, :2 etc
                if let Ok(n) = s[1..].parse::<usize>() {
                    if n > 0 && n <= suggestions.len() {
                        buffer.push_str(&suggestions[n - 1].token);
                        buffer.push(' ');
                    }
                }
            }
            s => {
                buffer.push_str(s);
                buffer.push(' ');
            }
        }
    }

    Ok(())
}

fn print_ui(
    engine: &SuggestionEngine,
    extension: &str,
    buffer: &str,
    suggestions: &[Suggestion],
    status: &str,
) -> Result<()> {
    let mut out = stdout();
    execute!(out, Clear(ClearType::All), MoveTo(0, 0))?;
    println!("{}", "code-ngram suggestion repl".bold());
    println!("---------------------------------------------------------------");
    println!("Type code and press [Enter]. Select with ':1', ':2'. ':q' to quit.");
    println!(":load <model>  :open <file>  :ext <extension>  :clear\n");

    let stats = engine.stats();
    match &stats.model {
        Some(model) => println!(
            "Model: {} (n = {}, {} contexts)  Session: {} documents",
            model.version, model.n, model.contexts, stats.session.documents
        ),
        None => println!("{}", "No model loaded.".yellow()),
    }
    if !status.is_empty() {
        println!("{}", status.dark_grey());
    }

    println!("\n[{extension}] {}", buffer.cyan());
    if suggestions.is_empty() {
        println!("\nNo suggestions.");
    } else {
        println!("\nSuggestions:");
        for (i, suggestion) in suggestions.iter().enumerate() {
            let source = match suggestion.source {
                Source::Static => "static".dark_grey(),
                Source::Session => "session".green(),
            };
            println!("  :{}: {} ({:.3}, {})", i + 1, suggestion.token.as_str().bold(), suggestion.confidence, source);
        }
    }
    print!("\n> ");
    out.flush()?;
    Ok(())
}
