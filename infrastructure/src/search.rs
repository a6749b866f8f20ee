use domain::models::{Document, Metric, Retrieved};
use rayon::prelude::*;

pub struct SearchEngine;

impl SearchEngine {
    pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        let dot_product = Self::dot(a, b);
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot_product / (norm_a * norm_b)
    }

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
    }

    pub fn distance(metric: Metric, a: &[f32], b: &[f32]) -> f32 {
        match metric {
            Metric::Cosine => 1.0 - Self::cosine_similarity(a, b),
            Metric::L2 => a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum(),
            Metric::Ip => 1.0 - Self::dot(a, b),
        }
    }

    /// Rank `documents` by distance to `query` and keep the `top_k` closest.
    ///
    /// `documents` must be in insertion order: equal distances keep that order.
    pub fn nearest(
        metric: Metric,
        query: &[f32],
        documents: &[Document],
        top_k: usize,
    ) -> Vec<Retrieved> {
        let mut distances: Vec<(usize, f32)> = documents
            .par_iter()
            .enumerate()
            .map(|(idx, doc)| (idx, Self::distance(metric, query, &doc.vector)))
            .collect();

        distances.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        distances
            .into_iter()
            .take(top_k)
            .map(|(idx, distance)| Retrieved {
                id: documents[idx].id.clone(),
                text: documents[idx].text.clone(),
                distance,
            })
            .collect()
    }
}
