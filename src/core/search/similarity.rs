//! BM25 scoring, per spec.md §4.8: `idf = ln(1 + (N - df + 0.5)/(df +
//! 0.5))`, per-term weight `idf * (k1 + 1)`, per-doc contribution
//! `weight * tf / (tf + k1 * (1 - b + b * dl / avgdl))`.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Similarity {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Similarity {
    fn default() -> Self {
        Bm25Similarity { k1: 1.2, b: 0.75 }
    }
}

impl Bm25Similarity {
    pub fn new(k1: f32, b: f32) -> Self {
        Bm25Similarity { k1, b }
    }

    /// `idf * (k1 + 1)`, constant for a (term, segment) pair.
    pub fn term_weight(&self, num_docs: i32, doc_freq: i32) -> f32 {
        let n = num_docs.max(1) as f32;
        let df = doc_freq.max(1) as f32;
        let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
        idf * (self.k1 + 1.0)
    }

    /// The per-document score contribution given this term's within-doc
    /// frequency, the doc's quantized field length, and the field's
    /// average length.
    pub fn score(&self, term_weight: f32, tf: i32, dl: u8, avgdl: f32) -> f32 {
        let tf = tf.max(0) as f32;
        let avgdl = if avgdl <= 0.0 { 1.0 } else { avgdl };
        let norm = self.k1 * (1.0 - self.b + self.b * (dl as f32) / avgdl);
        term_weight * tf / (tf + norm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idf_decreases_as_doc_freq_rises() {
        let sim = Bm25Similarity::default();
        let rare = sim.term_weight(1000, 2);
        let common = sim.term_weight(1000, 500);
        assert!(rare > common);
    }

    #[test]
    fn score_rewards_higher_term_frequency() {
        let sim = Bm25Similarity::default();
        let w = sim.term_weight(1000, 10);
        let low = sim.score(w, 1, 10, 10.0);
        let high = sim.score(w, 5, 10, 10.0);
        assert!(high > low);
    }
}
