use flate2::write::GzEncoder;
use ngram_core::core::model::Smoothing;
use ngram_core::model_file::{load_model, write_model, Compression, ModelDocument};
use ngram_core::ModelError;
use std::fs;
use std::io::Write;
use tempfile::TempDir;

// Shape produced by the training script: `json.dumps` keys with ", " separators.
const TRAINER_OUTPUT: &str = r#"{
  "version": "2.2",
  "n": 3,
  "ngrams": {
    ".py": {
      "[\"foo\", \"(\"]": {"bar": 3, "baz": 1},
      "[\"def\", \"main\"]": {"(": 4},
      "[\"broken\"]": {"x": 1}
    },
    ".js": {
      "[\"console\", \".\"]": {"log": 9, "error": 0}
    }
  },
  "vocab": {".py": ["foo", "(", "bar", "baz", "def", "main"]},
  "file_extensions": [".py", ".js"],
  "total_patterns": 17,
  "smoothing": "laplace",
  "alpha": 0.5
}"#;

#[test]
fn loads_plain_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("model.json");
    fs::write(&path, TRAINER_OUTPUT).unwrap();

    let model = load_model(&path).unwrap();
    let stats = model.stats();
    assert_eq!(stats.version, "2.2");
    assert_eq!(stats.n, 3);
    assert_eq!(stats.contexts, 3);
    assert_eq!(stats.total_patterns, 17);
    assert_eq!(model.meta().smoothing, Smoothing::Additive { alpha: 0.5 });
}

#[test]
fn loads_gzip_written_by_trainer() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("model.json.gz");
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(TRAINER_OUTPUT.as_bytes()).unwrap();
    fs::write(&path, encoder.finish().unwrap()).unwrap();

    let model = load_model(&path).unwrap();
    assert_eq!(model.stats().contexts, 3);
}

#[test]
fn writer_round_trips_every_container() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("source.json");
    fs::write(&source, TRAINER_OUTPUT).unwrap();
    let original = load_model(&source).unwrap();
    let document = ModelDocument::from_model(&original);

    for (name, compression) in [
        ("plain.json", Compression::None),
        ("model.json.gz", Compression::Gzip),
        ("model.json.zst", Compression::Zstd),
    ] {
        let path = dir.path().join("out").join(name);
        write_model(&path, &document, compression).unwrap();
        let reloaded = load_model(&path).unwrap();
        assert_eq!(reloaded.stats(), original.stats(), "{name}");
        assert_eq!(ModelDocument::from_model(&reloaded), document, "{name}");
    }
}

#[test]
fn missing_file_reports_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.json.gz");
    match load_model(&path) {
        Err(ModelError::Read { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected read error, got {other:?}"),
    }
}

#[test]
fn order_below_two_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("model.json");
    fs::write(&path, r#"{"version": "2.2", "n": 1, "ngrams": {}}"#).unwrap();
    assert!(matches!(load_model(&path), Err(ModelError::InvalidOrder(1))));
}
