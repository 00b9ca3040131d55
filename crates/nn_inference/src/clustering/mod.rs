use nn_core::{Article, Embedding};
use tracing::{debug, info};

use crate::embeddings::EmbeddingGenerator;

pub const DEFAULT_THRESHOLD: f32 = 0.95;

/// Similarity between a cluster seed and a candidate. Degenerate or
/// mismatched vectors count as unrelated.
fn similarity_or_zero(seed: &Embedding, candidate: &Embedding) -> f32 {
    match seed.cosine_similarity(candidate) {
        Ok(similarity) => similarity,
        Err(e) => {
            debug!("Similarity treated as 0: {}", e);
            0.0
        }
    }
}

/// Greedy single-pass clustering.
///
/// Each cluster is represented by the embedding of its first member. Every
/// item joins the cluster whose seed is most similar, provided that similarity
/// reaches `threshold`; on ties the earliest cluster wins. Otherwise the item
/// opens a new cluster. Clusters come out in order of first appearance and
/// members keep their input order.
pub fn cluster_embedded<T>(items: Vec<(T, Embedding)>, threshold: f32) -> Vec<Vec<T>> {
    let mut seeds: Vec<Embedding> = Vec::new();
    let mut clusters: Vec<Vec<T>> = Vec::new();

    for (item, embedding) in items {
        let mut best: Option<(usize, f32)> = None;
        for (i, seed) in seeds.iter().enumerate() {
            let similarity = similarity_or_zero(seed, &embedding);
            if best.map_or(true, |(_, s)| similarity > s) {
                best = Some((i, similarity));
            }
        }

        match best {
            Some((i, similarity)) if similarity >= threshold => clusters[i].push(item),
            _ => {
                seeds.push(embedding);
                clusters.push(vec![item]);
            }
        }
    }

    clusters
}

pub struct SimilarityClusterer {
    generator: EmbeddingGenerator,
    threshold: f32,
}

impl SimilarityClusterer {
    pub fn new(generator: EmbeddingGenerator, threshold: f32) -> Self {
        Self { generator, threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Embeds and clusters the articles. Articles that cannot be embedded are
    /// left out of the result.
    pub async fn cluster(&self, articles: Vec<Article>) -> Vec<Vec<Article>> {
        if articles.is_empty() {
            return Vec::new();
        }

        let total = articles.len();
        info!(
            "🧮 Clustering {} articles with {} (threshold {:.2})",
            total,
            self.generator.model().name(),
            self.threshold
        );
        let embedded = self.generator.embed_articles(articles).await;
        if embedded.len() < total {
            info!("⚠️ {} of {} articles could not be embedded", total - embedded.len(), total);
        }

        let clusters = cluster_embedded(embedded, self.threshold);
        info!(
            "✨ {} clusters, {} with more than one article",
            clusters.len(),
            clusters.iter().filter(|c| c.len() > 1).count()
        );
        clusters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nn_core::{Category, Error, Media, Result, TextEmbedder};
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Returns fixed vectors keyed by the article body.
    #[derive(Debug)]
    struct FixedModel(HashMap<String, Vec<f32>>);

    #[async_trait]
    impl TextEmbedder for FixedModel {
        fn name(&self) -> &str {
            "fixed"
        }

        fn dims(&self) -> usize {
            2
        }

        async fn embed(&self, text: &str) -> Result<Embedding> {
            self.0
                .get(text)
                .cloned()
                .map(Embedding::new)
                .ok_or_else(|| Error::EmbeddingUnavailable(text.to_string()))
        }
    }

    fn article(body: &str) -> Article {
        Article::new(body, body, Category::Politica, body, Media::ElPais)
    }

    fn clusterer(vectors: &[(&str, Vec<f32>)], threshold: f32) -> SimilarityClusterer {
        let model = FixedModel(
            vectors
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        );
        SimilarityClusterer::new(EmbeddingGenerator::new(Arc::new(model), 4), threshold)
    }

    fn titles(clusters: &[Vec<Article>]) -> Vec<Vec<String>> {
        clusters
            .iter()
            .map(|c| c.iter().map(|a| a.title.clone()).collect())
            .collect()
    }

    fn e(values: &[f32]) -> Embedding {
        Embedding::new(values.to_vec())
    }

    #[test]
    fn test_empty_input() {
        let clusters: Vec<Vec<u32>> = cluster_embedded(Vec::new(), DEFAULT_THRESHOLD);
        assert!(clusters.is_empty());
    }

    #[test]
    fn test_single_item_is_singleton() {
        let clusters = cluster_embedded(vec![("a", e(&[1.0, 0.0]))], DEFAULT_THRESHOLD);
        assert_eq!(clusters, vec![vec!["a"]]);
    }

    #[test]
    fn test_threshold_one_with_distinct_embeddings() {
        let items = vec![
            (0, e(&[1.0, 0.0, 0.0])),
            (1, e(&[0.9, 0.1, 0.0])),
            (2, e(&[0.0, 1.0, 0.2])),
            (3, e(&[0.3, 0.3, 0.9])),
        ];
        let clusters = cluster_embedded(items, 1.0);
        assert_eq!(clusters, vec![vec![0], vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn test_partition_and_idempotence() {
        let items = vec![
            ("a", e(&[1.0, 0.0])),
            ("b", e(&[0.99, 0.05])),
            ("c", e(&[0.0, 1.0])),
            ("d", e(&[0.02, 1.0])),
            ("e", e(&[-1.0, 0.0])),
        ];
        let first = cluster_embedded(items.clone(), 0.9);
        let second = cluster_embedded(items, 0.9);
        assert_eq!(first, second);

        let mut members: Vec<&str> = first.iter().flatten().copied().collect();
        members.sort();
        assert_eq!(members, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(first, vec![vec!["a", "b"], vec!["c", "d"], vec!["e"]]);
    }

    #[test]
    fn test_seed_is_first_member() {
        // b joins a; c is close to b but not to the seed a.
        let items = vec![
            ("a", e(&[1.0, 0.0])),
            ("b", e(&[0.96, 0.28])),
            ("c", e(&[0.8, 0.6])),
        ];
        let clusters = cluster_embedded(items, 0.95);
        assert_eq!(clusters, vec![vec!["a", "b"], vec!["c"]]);
    }

    #[test]
    fn test_best_matching_cluster_wins() {
        let items = vec![
            ("a", e(&[1.0, 0.0])),
            ("b", e(&[0.0, 1.0])),
            ("c", e(&[0.1, 1.0])),
        ];
        let clusters = cluster_embedded(items, 0.5);
        assert_eq!(clusters, vec![vec!["a"], vec!["b", "c"]]);
    }

    #[test]
    fn test_ties_go_to_earliest_cluster() {
        let items = vec![
            ("a", e(&[1.0, 0.0])),
            ("b", e(&[0.0, 1.0])),
            ("c", e(&[1.0, 1.0])),
        ];
        let clusters = cluster_embedded(items, 0.7);
        assert_eq!(clusters, vec![vec!["a", "c"], vec!["b"]]);
    }

    #[test]
    fn test_degenerate_vectors_do_not_abort() {
        let items = vec![
            ("zero", e(&[0.0, 0.0])),
            ("a", e(&[1.0, 0.0])),
            ("zero2", e(&[0.0, 0.0])),
        ];
        let clusters = cluster_embedded(items, 0.95);
        assert_eq!(clusters, vec![vec!["zero"], vec!["a"], vec!["zero2"]]);
    }

    #[tokio::test]
    async fn test_similarity_097_against_thresholds() {
        let vectors = [
            ("uno", vec![1.0, 0.0]),
            ("dos", vec![0.97, 0.243_104_9]),
        ];

        let loose = clusterer(&vectors, 0.95);
        let clusters = loose.cluster(vec![article("uno"), article("dos")]).await;
        assert_eq!(titles(&clusters), vec![vec!["uno", "dos"]]);

        let strict = clusterer(&vectors, 0.99);
        let clusters = strict.cluster(vec![article("uno"), article("dos")]).await;
        assert_eq!(titles(&clusters), vec![vec!["uno"], vec!["dos"]]);
    }

    #[tokio::test]
    async fn test_unembeddable_articles_are_omitted() {
        let vectors = [("uno", vec![1.0, 0.0]), ("tres", vec![1.0, 0.01])];
        let clusterer = clusterer(&vectors, DEFAULT_THRESHOLD);
        let clusters = clusterer
            .cluster(vec![article("uno"), article("dos"), article("tres")])
            .await;
        assert_eq!(titles(&clusters), vec![vec!["uno", "tres"]]);
    }

    #[tokio::test]
    async fn test_cluster_empty() {
        let clusterer = clusterer(&[], DEFAULT_THRESHOLD);
        assert!(clusterer.cluster(Vec::new()).await.is_empty());
    }
}
