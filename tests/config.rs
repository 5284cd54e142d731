use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use stardex::config::{load_config, ProviderKind};

fn write_config(content: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("stardex.toml");
    fs::write(&path, content).unwrap();
    (tmp, path)
}

const MINIMAL: &str = r#"
github_pat = "ghp_test"

[embedder]
provider = "openai"
model = "text-embedding-3-small"
"#;

#[test]
fn minimal_config_gets_defaults() {
    let (_tmp, path) = write_config(MINIMAL);
    let cfg = load_config(&path).unwrap();

    assert_eq!(cfg.provider_kind().unwrap(), ProviderKind::OpenAi);
    assert_eq!(cfg.chunking.max_chars, 1200);
    assert_eq!(cfg.chunking.overlap_chars, 200);
    assert_eq!(cfg.fetch.parallelism, 8);
    assert_eq!(cfg.retrieval.top_k, 8);
    assert_eq!(cfg.embedder.batch_size, 64);
    assert!(cfg.cache_db_path().ends_with("cache/embeddings.sqlite"));
    assert!(cfg.index_db_path().ends_with("index/vectors.sqlite"));
}

#[test]
fn unknown_provider_fails_before_any_io() {
    let (_tmp, path) = write_config(
        r#"
github_pat = "ghp_test"

[embedder]
provider = "bedrock"
model = "titan"
"#,
    );
    let err = load_config(&path).unwrap_err().to_string();
    assert!(err.contains("Unknown embedding provider"), "{}", err);
}

#[test]
fn azure_requires_endpoint_deployment_and_version() {
    let (_tmp, path) = write_config(
        r#"
github_pat = "ghp_test"

[embedder]
provider = "azure_openai"
model = "text-embedding-3-small"
api_endpoint = "https://example.openai.azure.com"
"#,
    );
    assert!(load_config(&path).is_err());

    let (_tmp, path) = write_config(
        r#"
github_pat = "ghp_test"

[embedder]
provider = "azure_openai"
model = "text-embedding-3-small"
api_endpoint = "https://example.openai.azure.com"
api_deployment = "embed"
api_version = "2024-02-01"
"#,
    );
    let cfg = load_config(&path).unwrap();
    assert_eq!(cfg.provider_kind().unwrap(), ProviderKind::AzureOpenAi);
}

#[test]
fn empty_pat_is_rejected() {
    let (_tmp, path) = write_config(
        r#"
github_pat = "  "

[embedder]
provider = "ollama"
model = "nomic-embed-text"
"#,
    );
    assert!(load_config(&path).is_err());
}

#[test]
fn overlap_must_be_smaller_than_chunk() {
    let (_tmp, path) = write_config(
        r#"
github_pat = "ghp_test"

[embedder]
provider = "openai"
model = "text-embedding-3-small"

[chunking]
max_chars = 100
overlap_chars = 100
"#,
    );
    assert!(load_config(&path).is_err());
}

#[test]
fn missing_file_is_an_error() {
    let tmp = TempDir::new().unwrap();
    assert!(load_config(&tmp.path().join("nope.toml")).is_err());
}
