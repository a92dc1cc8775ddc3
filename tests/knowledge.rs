//! Knowledge base integration tests
//!
//! Chunking, building and retrieval over real documents with local
//! embedders.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use voice_rag::knowledge::{DEFAULT_DOCUMENT, HashingEmbedder, KnowledgeBase, chunk};
use voice_rag::Error;

mod common;

use common::{CountingEmbedder, TableEmbedder};

const ANIMALS: &str = "Cats are mammals. Dogs are mammals too. Fish live in water.";

fn sentences(text: &str) -> Vec<String> {
    text.replace('\n', " ")
        .split(". ")
        .map(|s| s.trim().trim_end_matches('.').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[test]
fn test_every_sentence_is_covered() {
    for size in [1, 40, 120, 250, 10_000] {
        let chunks = chunk(DEFAULT_DOCUMENT, size);
        let joined = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        for sentence in sentences(DEFAULT_DOCUMENT) {
            assert!(
                joined.contains(&sentence),
                "chunk size {size} lost sentence {sentence:?}"
            );
        }
    }
}

#[test]
fn test_multi_sentence_chunks_stay_under_size() {
    for size in [40, 120, 250] {
        for c in chunk(DEFAULT_DOCUMENT, size) {
            let single_sentence = !c.text.trim_end_matches('.').contains(". ");
            assert!(
                single_sentence || c.text.chars().count() < size + 1,
                "chunk {} exceeds {size}: {:?}",
                c.index,
                c.text
            );
        }
    }
}

#[test]
fn test_bundled_corpus_chunks() {
    let chunks = chunk(DEFAULT_DOCUMENT, 250);
    assert_eq!(chunks.len(), 3);
    assert!(chunks[0].text.contains("glucose"));
    assert!(chunks[1].text.contains("chloroplasts"));
    assert!(chunks[2].text.contains("Calvin cycle"));
}

#[tokio::test]
async fn test_build_embeds_all_chunks_in_one_batch() {
    let embedder = Arc::new(CountingEmbedder::default());
    let kb = KnowledgeBase::build(DEFAULT_DOCUMENT, 250, embedder.clone())
        .await
        .unwrap();

    assert_eq!(embedder.calls(), 1);
    assert_eq!(embedder.texts.load(Ordering::SeqCst), kb.len());
    assert_eq!(kb.len(), kb.index_len());
    assert_eq!(kb.dimension(), 256);
}

#[tokio::test]
async fn test_chunk_text_ranks_itself_first() {
    let kb = KnowledgeBase::build(DEFAULT_DOCUMENT, 120, Arc::new(HashingEmbedder::default()))
        .await
        .unwrap();

    for c in kb.chunks() {
        let hits = kb.search_scored(&c.text, 1).await.unwrap();
        assert_eq!(hits[0].index, c.index);
        assert!(hits[0].distance.abs() < 1e-5);
    }
}

#[tokio::test]
async fn test_exact_vector_match_returns_that_chunk() {
    let embedder = TableEmbedder::new(vec![
        ("Cats are mammals.", vec![1.0, 0.0, 0.0]),
        ("Dogs are mammals too.", vec![0.0, 1.0, 0.0]),
        ("Fish live in water.", vec![0.0, 0.0, 1.0]),
        ("which animal barks?", vec![0.0, 1.0, 0.0]),
    ]);
    let kb = KnowledgeBase::build(ANIMALS, 30, Arc::new(embedder))
        .await
        .unwrap();
    assert_eq!(kb.len(), 3);

    let hits = kb.search("which animal barks?", 1).await.unwrap();
    assert_eq!(hits, vec!["Dogs are mammals too.".to_string()]);
}

#[tokio::test]
async fn test_k_larger_than_corpus_returns_all_ranked() {
    let kb = KnowledgeBase::build(DEFAULT_DOCUMENT, 250, Arc::new(HashingEmbedder::default()))
        .await
        .unwrap();

    let hits = kb
        .search_scored("How does the plant make glucose?", 10)
        .await
        .unwrap();

    assert_eq!(hits.len(), kb.len());
    let mut indices: Vec<usize> = hits.iter().map(|h| h.index).collect();
    indices.sort_unstable();
    indices.dedup();
    assert_eq!(indices.len(), kb.len());
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[tokio::test]
async fn test_zero_k_rejected() {
    let kb = KnowledgeBase::build(ANIMALS, 30, Arc::new(HashingEmbedder::default()))
        .await
        .unwrap();

    assert!(matches!(
        kb.search("cats", 0).await,
        Err(Error::InvalidQuery(_))
    ));
}

#[tokio::test]
async fn test_empty_document_rejected() {
    let result = KnowledgeBase::build(" \n ", 250, Arc::new(HashingEmbedder::default())).await;
    assert!(matches!(result, Err(Error::EmptyDocument)));
}

#[tokio::test]
async fn test_query_dimension_mismatch() {
    let embedder = TableEmbedder::new(vec![
        ("Cats are mammals.", vec![1.0, 0.0]),
        ("Dogs are mammals too.", vec![0.0, 1.0]),
        ("Fish live in water.", vec![1.0, 1.0]),
        ("odd query", vec![1.0, 0.0, 0.0]),
    ]);
    let kb = KnowledgeBase::build(ANIMALS, 30, Arc::new(embedder))
        .await
        .unwrap();

    assert!(matches!(
        kb.search("odd query", 1).await,
        Err(Error::EmbeddingDimensionMismatch {
            expected: 2,
            found: 3
        })
    ));
}
