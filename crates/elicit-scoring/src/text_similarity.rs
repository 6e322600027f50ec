//! TF-IDF cosine similarity over character n-grams.
//!
//! Character n-grams make the comparison robust to typos and word-form
//! variation. IDF uses the smoothed form `ln(1 + N / (1 + df))`.

use std::collections::{HashMap, HashSet};

pub struct TfidfCosine {
    pub similarity_threshold: f64,
    pub min_ngram: usize,
    pub max_ngram: usize,
}

impl Default for TfidfCosine {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            min_ngram: 2,
            max_ngram: 3,
        }
    }
}

impl TfidfCosine {
    pub fn new(similarity_threshold: f64) -> Self {
        Self {
            similarity_threshold,
            ..Default::default()
        }
    }

    pub fn compute_similarity(&self, text1: &str, text2: &str) -> f64 {
        if text1.is_empty() || text2.is_empty() {
            return 0.0;
        }
        let docs = [self.tokenize(text1), self.tokenize(text2)];
        let vec1 = tfidf_vector(&docs[0], &docs);
        let vec2 = tfidf_vector(&docs[1], &docs);
        cosine(&vec1, &vec2)
    }

    /// Max similarity of `proposed` to any of `recent`, and whether it
    /// crosses the threshold.
    pub fn is_too_similar(&self, proposed: &str, recent: &[&str]) -> (bool, f64) {
        let max_similarity = recent
            .iter()
            .map(|r| self.compute_similarity(proposed, r))
            .fold(0.0f64, f64::max);
        (max_similarity >= self.similarity_threshold, max_similarity)
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.to_lowercase().chars().collect();
        let mut tokens = Vec::new();
        for n in self.min_ngram..=self.max_ngram {
            if chars.len() < n {
                continue;
            }
            for window in chars.windows(n) {
                tokens.push(window.iter().collect());
            }
        }
        tokens
    }
}

fn tfidf_vector(doc: &[String], all_docs: &[Vec<String>]) -> HashMap<String, f64> {
    let mut tf: HashMap<&str, usize> = HashMap::new();
    for token in doc {
        *tf.entry(token).or_default() += 1;
    }
    let total_terms = doc.len() as f64;
    if total_terms == 0.0 {
        return HashMap::new();
    }

    let mut df: HashMap<&str, usize> = HashMap::new();
    for tokens in all_docs {
        let unique: HashSet<&str> = tokens.iter().map(|t| t.as_str()).collect();
        for token in unique {
            *df.entry(token).or_default() += 1;
        }
    }
    let total_docs = all_docs.len() as f64;

    tf.into_iter()
        .map(|(term, count)| {
            let tf_norm = count as f64 / total_terms;
            let idf = (1.0 + total_docs / (1.0 + df[term] as f64)).ln();
            (term.to_string(), tf_norm * idf)
        })
        .collect()
}

fn cosine(vec1: &HashMap<String, f64>, vec2: &HashMap<String, f64>) -> f64 {
    if vec1.is_empty() || vec2.is_empty() {
        return 0.0;
    }
    let dot: f64 = vec1
        .iter()
        .filter_map(|(term, v1)| vec2.get(term).map(|v2| v1 * v2))
        .sum();
    let mag1 = vec1.values().map(|v| v * v).sum::<f64>().sqrt();
    let mag2 = vec2.values().map(|v| v * v).sum::<f64>().sqrt();
    if mag1 == 0.0 || mag2 == 0.0 {
        return 0.0;
    }
    dot / (mag1 * mag2)
}
