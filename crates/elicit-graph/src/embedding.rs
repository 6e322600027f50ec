//! Deterministic text embeddings and lemmatization.
//!
//! Canonical slot matching needs a deterministic `encode` with a usable
//! cosine space and a word lemmatizer - not any particular model. The
//! encoder hashes character trigrams into a fixed-width vector and
//! L2-normalizes; paraphrases sharing stems land close together. The
//! lemmatizer is a small rule table for English inflection.

use dashmap::DashMap;
use std::sync::Arc;

pub const EMBEDDING_DIM: usize = 256;

pub struct EmbeddingService {
    cache: DashMap<String, Arc<Vec<f32>>>,
}

impl Default for EmbeddingService {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingService {
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    /// Encode text to a fixed-dimension unit vector. Deterministic for
    /// identical input; cached for the process lifetime.
    pub fn encode(&self, text: &str) -> Arc<Vec<f32>> {
        if let Some(cached) = self.cache.get(text) {
            return cached.clone();
        }
        let vector = Arc::new(embed(text));
        self.cache.insert(text.to_string(), vector.clone());
        vector
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Reduce a single word to its lemma. Context-free by design:
    /// callers lemmatize underscore-separated words independently.
    pub fn lemmatize(&self, word: &str) -> String {
        lemmatize_word(word)
    }
}

fn embed(text: &str) -> Vec<f32> {
    let normalized: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let mut vector = vec![0f32; EMBEDDING_DIM];
    for word in normalized.split_whitespace() {
        let stem = lemmatize_word(word);
        let padded: Vec<char> = std::iter::once('^')
            .chain(stem.chars())
            .chain(std::iter::once('$'))
            .collect();
        for window in padded.windows(3) {
            let bucket = fnv1a(window) as usize % EMBEDDING_DIM;
            vector[bucket] += 1.0;
        }
        // Whole-stem feature so short words still separate.
        let bucket = fnv1a(&padded) as usize % EMBEDDING_DIM;
        vector[bucket] += 2.0;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}

fn fnv1a(chars: &[char]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for c in chars {
        let mut buf = [0u8; 4];
        for byte in c.encode_utf8(&mut buf).as_bytes() {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
    }
    hash
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

/// Irregular forms the suffix rules would mangle.
const IRREGULAR: &[(&str, &str)] = &[
    ("children", "child"),
    ("feet", "foot"),
    ("teeth", "tooth"),
    ("mice", "mouse"),
    ("men", "man"),
    ("women", "woman"),
    ("people", "person"),
    ("ran", "run"),
    ("went", "go"),
    ("made", "make"),
    ("felt", "feel"),
    ("left", "leave"),
    ("better", "good"),
    ("best", "good"),
];

fn lemmatize_word(word: &str) -> String {
    let lower = word.to_lowercase();
    if lower.len() <= 3 {
        return lower;
    }
    if let Some((_, lemma)) = IRREGULAR.iter().find(|(form, _)| *form == lower) {
        return (*lemma).to_string();
    }

    // Plural and 3rd-person -s forms.
    if let Some(stem) = lower.strip_suffix("ies") {
        if stem.len() >= 2 {
            return format!("{}y", stem);
        }
    }
    if let Some(stem) = lower.strip_suffix("sses") {
        return format!("{}ss", stem);
    }
    if let Some(stem) = lower.strip_suffix("es") {
        if stem.ends_with("sh") || stem.ends_with("ch") || stem.ends_with('x') || stem.ends_with('z')
        {
            return stem.to_string();
        }
    }
    if lower.ends_with('s') && !lower.ends_with("ss") && !lower.ends_with("us") && !lower.ends_with("is")
    {
        return lower[..lower.len() - 1].to_string();
    }

    // Past tense.
    if let Some(stem) = lower.strip_suffix("ed") {
        if stem.len() >= 3 {
            return undouble(restore_e(stem));
        }
    }

    // Progressive.
    if let Some(stem) = lower.strip_suffix("ing") {
        if stem.len() >= 3 {
            return undouble(restore_e(stem));
        }
    }

    lower
}

/// "reduc" -> "reduce", "improv" -> "improve": restore a dropped final e
/// after consonant clusters that need one.
fn restore_e(stem: &str) -> String {
    let needs_e = stem.ends_with('c')
        || stem.ends_with('v')
        || stem.ends_with('u')
        || stem.ends_with("at")
        || stem.ends_with("iz")
        || stem.ends_with("as")
        || stem.ends_with("os");
    if needs_e {
        format!("{}e", stem)
    } else {
        stem.to_string()
    }
}

/// "stopp" -> "stop", "runn" -> "run".
fn undouble(stem: String) -> String {
    let chars: Vec<char> = stem.chars().collect();
    let n = chars.len();
    if n >= 3 && chars[n - 1] == chars[n - 2] && !"aeiou".contains(chars[n - 1]) {
        chars[..n - 1].iter().collect()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lemmatizer_handles_common_inflection() {
        let service = EmbeddingService::new();
        assert_eq!(service.lemmatize("reduced"), "reduce");
        assert_eq!(service.lemmatize("textures"), "texture");
        assert_eq!(service.lemmatize("berries"), "berry");
        assert_eq!(service.lemmatize("stopped"), "stop");
        assert_eq!(service.lemmatize("running"), "run");
        assert_eq!(service.lemmatize("creamy"), "creamy");
        assert_eq!(service.lemmatize("children"), "child");
    }

    #[test]
    fn encode_is_deterministic_and_cached() {
        let service = EmbeddingService::new();
        let a = service.encode("creamy_texture :: smooth mouthfeel");
        let b = service.encode("creamy_texture :: smooth mouthfeel");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(service.cache_len(), 1);
    }

    #[test]
    fn similar_phrases_beat_dissimilar_ones() {
        let service = EmbeddingService::new();
        let silky = service.encode("silky_foam :: smooth creamy foam texture");
        let creamy = service.encode("creamy_foam :: smooth silky foam texture");
        let price = service.encode("low_price :: costs less than dairy milk");

        let near = cosine_similarity(&silky, &creamy);
        let far = cosine_similarity(&silky, &price);
        assert!(near > far);
        assert!(near > 0.8, "near-paraphrases should be close: {}", near);
    }

    #[test]
    fn identical_text_has_unit_similarity() {
        let service = EmbeddingService::new();
        let a = service.encode("gut health");
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-5);
    }
}
