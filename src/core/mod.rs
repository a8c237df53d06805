pub mod context;
pub mod engine;
pub mod model;
pub mod rank;
pub mod scoring;
pub mod table;
pub mod tokenizer;
pub mod types;
