// src/core/tokenizer.rs
use crate::core::types::Token;
use once_cell::sync::Lazy;
use regex::Regex;

const IDENTIFIER: &str = r"[a-zA-Z_][a-zA-Z0-9_]*";
const NUMBER: &str = r"[0-9.]+";
const OPERATOR_RUN: &str = r"[+\-*/=<>!&|^~%]+";
const PUNCTUATION: &str = r"[:;,.()\[\]{}]";
const DOUBLE_QUOTED: &str = r#"".*?""#;
const SINGLE_QUOTED: &str = r"'.*?'";
const BACKTICK_QUOTED: &str = r"`.*?`";

static GENERAL_GRAMMAR: Lazy<Regex> = Lazy::new(|| {
    let pattern = [IDENTIFIER, NUMBER, OPERATOR_RUN, PUNCTUATION, DOUBLE_QUOTED, SINGLE_QUOTED].join("|");
    Regex::new(&pattern).expect("general token grammar is a valid regex")
});

static SCRIPT_GRAMMAR: Lazy<Regex> = Lazy::new(|| {
    let pattern = [
        IDENTIFIER,
        NUMBER,
        OPERATOR_RUN,
        PUNCTUATION,
        DOUBLE_QUOTED,
        SINGLE_QUOTED,
        BACKTICK_QUOTED,
    ]
    .join("|");
    Regex::new(&pattern).expect("script token grammar is a valid regex")
});

/// Token grammar variant. `Script` additionally keeps backtick template
/// strings as one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    General,
    Script,
}

impl Dialect {
    /// Picks the dialect for a language group id such as `".ts"`.
    pub fn for_group(group: &str) -> Self {
        match group.trim_start_matches('.') {
            "js" | "jsx" | "ts" | "tsx" | "mjs" | "cjs" => Dialect::Script,
            _ => Dialect::General,
        }
    }

    fn grammar(self) -> &'static Regex {
        match self {
            Dialect::General => &GENERAL_GRAMMAR,
            Dialect::Script => &SCRIPT_GRAMMAR,
        }
    }
}

/// A stateless line-oriented tokenizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tokenizer {
    dialect: Dialect,
}

impl Tokenizer {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn for_group(group: &str) -> Self {
        Self::new(Dialect::for_group(group))
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Splits `text` into tokens. Each line is trimmed and scanned on its own,
    /// so quoted strings never span lines. Characters outside the grammar are dropped.
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let grammar = self.dialect.grammar();
        let mut tokens = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            tokens.extend(
                grammar
                    .find_iter(line)
                    .map(|m| m.as_str())
                    .filter(|t| !t.trim().is_empty())
                    .map(str::to_string),
            );
        }
        tokens
    }
}
