//! Okapi BM25 scoring, k1/b configurable (defaults 1.5/0.75).

/// `score = sum over query terms of idf(term) * (tf*(k1+1)) / (tf + k1*(1 - b + b*dl/avgdl))`
///
/// `idf` uses the standard BM25 smoothing `ln(1 + (N - df + 0.5)/(df + 0.5))`,
/// which stays non-negative even when a term appears in every document.
pub fn idf(total_docs: usize, doc_freq: usize) -> f64 {
    let n = total_docs as f64;
    let df = doc_freq as f64;
    (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
}

#[allow(clippy::too_many_arguments)]
pub fn term_score(
    term_freq: usize,
    doc_freq: usize,
    doc_length: usize,
    avg_doc_length: f64,
    total_docs: usize,
    k1: f64,
    b: f64,
) -> f64 {
    if term_freq == 0 || total_docs == 0 {
        return 0.0;
    }
    let tf = term_freq as f64;
    let dl = doc_length as f64;
    let norm = if avg_doc_length > 0.0 { dl / avg_doc_length } else { 1.0 };
    let numerator = tf * (k1 + 1.0);
    let denominator = tf + k1 * (1.0 - b + b * norm);
    idf(total_docs, doc_freq) * (numerator / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idf_is_nonnegative_when_term_is_in_every_document() {
        assert!(idf(10, 10) >= 0.0);
    }

    #[test]
    fn longer_documents_score_lower_for_same_term_frequency() {
        let short = term_score(3, 2, 50, 100.0, 20, 1.5, 0.75);
        let long = term_score(3, 2, 400, 100.0, 20, 1.5, 0.75);
        assert!(short > long);
    }

    #[test]
    fn zero_term_frequency_scores_zero() {
        assert_eq!(term_score(0, 2, 50, 100.0, 20, 1.5, 0.75), 0.0);
    }
}
