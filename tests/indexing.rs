//! End-to-end tests for the indexing pipeline and the query path, driven
//! through [`VaultSearch`] with a deterministic stub embedding provider.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use vault_search::discover::path_key;
use vault_search::error::{IndexError, SearchError};
use vault_search::indexer::{content_hash, Indexer};
use vault_search::models::IndexRunResult;
use vault_search::store::{InMemoryStore, SqliteStore, VectorStore};

use common::{filler, service_with, test_config, write_note, FailingStore, StubEmbedder};

#[tokio::test]
async fn test_index_then_skip_unchanged() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let vault = config.vault.path.clone();
    write_note(&vault, "small.md", &filler(50));
    write_note(&vault, "large.md", &filler(2500));

    let store = Arc::new(SqliteStore::open(&config.db.path).await.unwrap());
    let service = service_with(config, Arc::new(StubEmbedder::new()), store.clone());

    let first = service.reindex().await.unwrap();
    assert_eq!(
        first,
        IndexRunResult {
            processed: 2,
            skipped: 0,
            errors: 0,
            total_files: 2,
        }
    );

    let small = path_key(&vault.join("small.md"));
    let large = path_key(&vault.join("large.md"));
    assert_eq!(store.chunks_for_source(&small).await.unwrap().len(), 1);

    let large_chunks = store.chunks_for_source(&large).await.unwrap();
    assert_eq!(large_chunks.len(), 3);
    for (i, chunk) in large_chunks.iter().enumerate() {
        assert_eq!(chunk.logical_path, format!("{}#{}", large, i));
        assert_eq!(chunk.metadata.total_chunks, 3);
        assert!(chunk.content.chars().count() <= 1000);
    }
    assert_eq!(store.collection_stats().await.count, 4);

    let second = service.reindex().await.unwrap();
    assert_eq!(second.processed, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(second.errors, 0);
    assert_eq!(store.collection_stats().await.count, 4);

    service.shutdown().await;
}

#[tokio::test]
async fn test_unchanged_files_make_no_embedding_calls() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    write_note(&config.vault.path, "a.md", "# Alpha\n\nFirst note.");

    let embedder = Arc::new(StubEmbedder::new());
    let service = service_with(config, embedder.clone(), Arc::new(InMemoryStore::new()));

    service.reindex().await.unwrap();
    let after_first = embedder.calls();
    assert_eq!(after_first, 1);

    service.reindex().await.unwrap();
    assert_eq!(embedder.calls(), after_first);
}

#[tokio::test]
async fn test_changed_file_is_reprocessed() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let vault = config.vault.path.clone();
    write_note(&vault, "a.md", "original text");
    write_note(&vault, "b.md", "untouched text");

    let store = Arc::new(InMemoryStore::new());
    let service = service_with(config, Arc::new(StubEmbedder::new()), store.clone());
    service.reindex().await.unwrap();

    write_note(&vault, "a.md", "edited text");
    let result = service.reindex().await.unwrap();
    assert_eq!(result.processed, 1);
    assert_eq!(result.skipped, 1);

    let key = path_key(&vault.join("a.md"));
    let stored = store.get_by_logical_path(&key).await.unwrap().unwrap();
    assert_eq!(stored.content, "edited text");
    assert_eq!(stored.metadata.content_hash, content_hash("edited text"));
}

#[tokio::test]
async fn test_shrinking_file_drops_stale_chunks() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let vault = config.vault.path.clone();
    write_note(&vault, "long.md", &filler(2500));

    let store = Arc::new(SqliteStore::open(&config.db.path).await.unwrap());
    let service = service_with(config, Arc::new(StubEmbedder::new()), store.clone());
    service.reindex().await.unwrap();
    assert_eq!(store.collection_stats().await.count, 3);

    write_note(&vault, "long.md", "now a short note");
    let result = service.reindex().await.unwrap();
    assert_eq!(result.processed, 1);

    let key = path_key(&vault.join("long.md"));
    let chunks = store.chunks_for_source(&key).await.unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].logical_path, key);
    assert!(store
        .get_by_logical_path(&format!("{}#2", key))
        .await
        .unwrap()
        .is_none());

    // Once shrunk, the next run finds the bare-path hash and skips.
    let again = service.reindex().await.unwrap();
    assert_eq!(again.skipped, 1);

    service.shutdown().await;
}

#[tokio::test]
async fn test_delete_document() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let vault = config.vault.path.clone();
    write_note(&vault, "a.md", "alpha");

    let store = Arc::new(InMemoryStore::new());
    let service = service_with(config, Arc::new(StubEmbedder::new()), store.clone());
    service.reindex().await.unwrap();

    let key = path_key(&vault.join("a.md"));
    assert!(service.delete_document(&key).await.unwrap());
    assert!(store.get_by_logical_path(&key).await.unwrap().is_none());
    assert!(!service.delete_document(&key).await.unwrap());
    assert!(!service.delete_document("never-indexed.md").await.unwrap());
}

#[tokio::test]
async fn test_document_view_ignores_chunk_suffix() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let vault = config.vault.path.clone();
    write_note(&vault, "notes/long.md", &filler(2500));

    let service = service_with(
        config,
        Arc::new(StubEmbedder::new()),
        Arc::new(InMemoryStore::new()),
    );
    service.reindex().await.unwrap();

    let doc = service.document("notes/long.md#1").await.unwrap().unwrap();
    assert_eq!(doc.file_path, path_key(&vault.join("notes/long.md")));
    assert_eq!(doc.total_chunks, 3);
    assert_eq!(doc.chunks.len(), 3);

    assert!(service.document("notes/missing.md").await.unwrap().is_none());
}

#[tokio::test]
async fn test_batch_write_failure_counts_chunks() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let vault = config.vault.path.clone();
    write_note(&vault, "a.md", "alpha");
    write_note(&vault, "b.md", "beta");
    write_note(&vault, "c.md", &filler(2500));

    let service = service_with(
        config,
        Arc::new(StubEmbedder::new()),
        Arc::new(FailingStore::new()),
    );
    let result = service.reindex().await.unwrap();

    assert_eq!(result.total_files, 3);
    assert_eq!(result.processed, 3);
    // 1 + 1 + 3 chunks were lost in the single failed batch.
    assert_eq!(result.errors, 5);
}

#[tokio::test]
async fn test_unreachable_provider_aborts_run() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    write_note(&config.vault.path, "a.md", "alpha");

    let store = Arc::new(InMemoryStore::new());
    let service = service_with(config, Arc::new(StubEmbedder::unreachable()), store.clone());

    let err = service.reindex().await.unwrap_err();
    assert!(matches!(err, IndexError::ProviderUnavailable { .. }));
    assert_eq!(store.collection_stats().await.count, 0);
}

#[tokio::test]
async fn test_missing_model_only_warns() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    write_note(&config.vault.path, "a.md", "alpha");

    let service = service_with(
        config,
        Arc::new(StubEmbedder::new().without_model()),
        Arc::new(InMemoryStore::new()),
    );
    let result = service.reindex().await.unwrap();
    assert_eq!(result.processed, 1);
}

#[tokio::test]
async fn test_failed_embeddings_are_dropped() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let vault = config.vault.path.clone();
    write_note(&vault, "bad.md", "this one will FAIL to embed");
    write_note(&vault, "good.md", "this one embeds fine");

    let store = Arc::new(InMemoryStore::new());
    let service = service_with(
        config,
        Arc::new(StubEmbedder::new().failing_on("FAIL")),
        store.clone(),
    );
    let result = service.reindex().await.unwrap();

    assert_eq!(result.processed, 2);
    assert_eq!(result.errors, 0);
    assert_eq!(store.collection_stats().await.count, 1);
    assert!(store
        .get_by_logical_path(&path_key(&vault.join("bad.md")))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_unreadable_file_counts_as_error() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let vault = config.vault.path.clone();
    write_note(&vault, "good.md", "fine");
    std::fs::write(vault.join("binary.md"), [0xff, 0xfe, 0x00, 0x9f]).unwrap();

    let service = service_with(
        config,
        Arc::new(StubEmbedder::new()),
        Arc::new(InMemoryStore::new()),
    );
    let result = service.reindex().await.unwrap();

    assert_eq!(result.total_files, 2);
    assert_eq!(result.processed, 1);
    assert_eq!(result.errors, 1);
}

#[tokio::test]
async fn test_hidden_and_excluded_files_are_ignored() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(tmp.path());
    config.vault.exclude_globs = vec!["drafts/**".to_string()];
    let vault = config.vault.path.clone();
    write_note(&vault, "visible.md", "kept");
    write_note(&vault, ".obsidian/workspace.md", "hidden");
    write_note(&vault, "drafts/wip.md", "excluded");
    write_note(&vault, "image.png", "not markdown");

    let service = service_with(
        config,
        Arc::new(StubEmbedder::new()),
        Arc::new(InMemoryStore::new()),
    );
    let result = service.reindex().await.unwrap();
    assert_eq!(result.total_files, 1);
    assert_eq!(service.stats().await.vault.total_files, 1);
}

#[tokio::test]
async fn test_missing_vault_fails_run() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(tmp.path());
    config.vault.path = tmp.path().join("does-not-exist");

    let service = service_with(
        config,
        Arc::new(StubEmbedder::new()),
        Arc::new(InMemoryStore::new()),
    );
    let err = service.reindex().await.unwrap_err();
    assert!(matches!(err, IndexError::VaultMissing(_)));

    let stats = service.stats().await;
    assert_eq!(stats.vault.total_files, 0);
    assert_eq!(stats.collection.count, 0);
}

#[tokio::test]
async fn test_concurrent_run_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    write_note(&config.vault.path, "a.md", "alpha");

    let service = service_with(
        config,
        Arc::new(StubEmbedder::new().with_delay(Duration::from_millis(200))),
        Arc::new(InMemoryStore::new()),
    );

    let (a, b) = tokio::join!(service.reindex(), service.reindex());
    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(IndexError::RunInProgress))));

    assert!(!service.health().await.indexing);
    assert_eq!(service.reindex().await.unwrap().skipped, 1);
}

#[tokio::test]
async fn test_is_running_follows_the_run() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    write_note(&config.vault.path, "a.md", "alpha");

    let indexer = Arc::new(Indexer::new(
        Arc::new(StubEmbedder::new().with_delay(Duration::from_millis(300))),
        Arc::new(InMemoryStore::new()),
        &config,
    ));
    assert!(!indexer.is_running());

    let run = {
        let indexer = indexer.clone();
        tokio::spawn(async move { indexer.run().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(indexer.is_running());

    let result = run.await.unwrap().unwrap();
    assert_eq!(result.processed, 1);
    assert!(!indexer.is_running());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_polling_is_running_never_rejects_a_run() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let indexer = Arc::new(Indexer::new(
        Arc::new(StubEmbedder::new()),
        Arc::new(InMemoryStore::new()),
        &config,
    ));

    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let poller = {
        let indexer = indexer.clone();
        let stop = stop.clone();
        tokio::spawn(async move {
            while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                let _ = indexer.is_running();
                tokio::task::yield_now().await;
            }
        })
    };

    for _ in 0..500 {
        indexer.run().await.unwrap();
    }

    stop.store(true, std::sync::atomic::Ordering::Relaxed);
    poller.await.unwrap();
}

#[tokio::test]
async fn test_changed_file_that_cannot_embed_drops_old_version() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let vault = config.vault.path.clone();
    write_note(&vault, "a.md", "first version");

    let store = Arc::new(InMemoryStore::new());
    let service = service_with(
        config,
        Arc::new(StubEmbedder::new().failing_on("FAIL")),
        store.clone(),
    );
    service.reindex().await.unwrap();
    assert_eq!(store.collection_stats().await.count, 1);

    write_note(&vault, "a.md", "second version will FAIL");
    let result = service.reindex().await.unwrap();
    assert_eq!(result.processed, 1);
    assert_eq!(result.errors, 0);

    let key = path_key(&vault.join("a.md"));
    assert!(store.get_by_logical_path(&key).await.unwrap().is_none());
    assert!(service.search("first version", 5).await.unwrap().is_empty());

    // With nothing stored the file is retried rather than skipped.
    let retry = service.reindex().await.unwrap();
    assert_eq!(retry.processed, 1);
    assert_eq!(retry.skipped, 0);
}

#[tokio::test]
async fn test_search_ranks_closest_note_first() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let vault = config.vault.path.clone();
    write_note(&vault, "rust.md", "ownership borrowing lifetimes");
    write_note(&vault, "garden.md", "tomatoes need plenty of sun");
    write_note(&vault, "zzz.md", "zzzz zzzz zzzz");

    let store = Arc::new(SqliteStore::open(&config.db.path).await.unwrap());
    let service = service_with(config, Arc::new(StubEmbedder::new()), store);
    service.reindex().await.unwrap();

    let hits = service
        .search("ownership borrowing lifetimes", 2)
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].logical_path, path_key(&vault.join("rust.md")));
    assert!(hits[0].distance < 1e-4);
    assert!(hits[0].distance <= hits[1].distance);

    service.shutdown().await;
}

#[tokio::test]
async fn test_search_rejects_bad_input() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let embedder = Arc::new(StubEmbedder::new());
    let service = service_with(config, embedder.clone(), Arc::new(InMemoryStore::new()));

    assert_eq!(
        service.search("   ", 5).await.unwrap_err(),
        SearchError::EmptyQuery
    );
    assert_eq!(
        service.search("query", 0).await.unwrap_err(),
        SearchError::InvalidLimit
    );
    assert_eq!(embedder.calls(), 0);
}

#[tokio::test]
async fn test_search_with_unavailable_provider() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let store = Arc::new(InMemoryStore::new());
    let service = service_with(
        config,
        Arc::new(StubEmbedder::unreachable()),
        store.clone(),
    );

    assert_eq!(
        service.search("anything", 5).await.unwrap_err(),
        SearchError::EmbeddingUnavailable
    );
    assert_eq!(store.query_failures(), 0);
}

#[tokio::test]
async fn test_search_empty_index_returns_nothing() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    let service = service_with(
        config,
        Arc::new(StubEmbedder::new()),
        Arc::new(InMemoryStore::new()),
    );
    assert!(service.search("anything", 5).await.unwrap().is_empty());
}
