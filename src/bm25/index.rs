//! BM25 Index: an in-memory inverted index over indexed content, refreshed
//! incrementally.
//!
//! Storage shape generalizes a trigram index's `RwLock`-guarded
//! `HashMap<String, HashSet<DocumentId>>` postings plus a metadata block,
//! from trigram coverage scoring to per-term postings scored with standard
//! BM25. Every operation here is synchronous and holds a single
//! `parking_lot::RwLock` for its duration — never a `tokio::sync::RwLock`,
//! since this must never yield mid-operation.

use std::collections::HashMap;

use parking_lot::RwLock;
use uuid::Uuid;

use super::score::term_score;
use super::tokenize::tokenize;

#[derive(Default)]
struct ProjectIndex {
    postings: HashMap<String, HashMap<Uuid, usize>>,
    doc_terms: HashMap<Uuid, HashMap<String, usize>>,
    doc_lengths: HashMap<Uuid, usize>,
    total_length: u64,
    modifications_since_recompute: usize,
}

impl ProjectIndex {
    fn avg_doc_length(&self) -> f64 {
        if self.doc_lengths.is_empty() {
            0.0
        } else {
            self.total_length as f64 / self.doc_lengths.len() as f64
        }
    }

    fn add(&mut self, doc_id: Uuid, text: &str) {
        let tokens = tokenize(text);
        let mut term_freqs: HashMap<String, usize> = HashMap::new();
        for tok in &tokens {
            *term_freqs.entry(tok.clone()).or_insert(0) += 1;
        }
        for (term, tf) in &term_freqs {
            self.postings.entry(term.clone()).or_default().insert(doc_id, *tf);
        }
        self.total_length += tokens.len() as u64;
        self.doc_lengths.insert(doc_id, tokens.len());
        self.doc_terms.insert(doc_id, term_freqs);
        self.modifications_since_recompute += 1;
    }

    fn remove(&mut self, doc_id: Uuid) {
        if let Some(terms) = self.doc_terms.remove(&doc_id) {
            for term in terms.keys() {
                if let Some(postings) = self.postings.get_mut(term) {
                    postings.remove(&doc_id);
                    if postings.is_empty() {
                        self.postings.remove(term);
                    }
                }
            }
        }
        if let Some(len) = self.doc_lengths.remove(&doc_id) {
            self.total_length = self.total_length.saturating_sub(len as u64);
        }
        self.modifications_since_recompute += 1;
    }

    /// Rebuild `total_length` from the authoritative per-document lengths.
    /// Cheap and exact; called periodically to guard against any
    /// accumulated drift in the incrementally-maintained running total.
    fn recompute_if_due(&mut self, recompute_after: usize) {
        if self.modifications_since_recompute < recompute_after {
            return;
        }
        self.total_length = self.doc_lengths.values().map(|&l| l as u64).sum();
        self.modifications_since_recompute = 0;
    }

    fn query(&self, text: &str, k: usize, k1: f64, b: f64) -> Vec<(Uuid, f64)> {
        if self.doc_lengths.is_empty() || k == 0 {
            return Vec::new();
        }
        let mut query_terms: Vec<String> = tokenize(text);
        query_terms.sort();
        query_terms.dedup();

        let avg_len = self.avg_doc_length();
        let total_docs = self.doc_lengths.len();
        let mut scores: HashMap<Uuid, f64> = HashMap::new();

        for term in &query_terms {
            let Some(postings) = self.postings.get(term) else { continue };
            let doc_freq = postings.len();
            for (&doc_id, &tf) in postings {
                let doc_len = self.doc_lengths.get(&doc_id).copied().unwrap_or(0);
                let score = term_score(tf, doc_freq, doc_len, avg_len, total_docs, k1, b);
                *scores.entry(doc_id).or_insert(0.0) += score;
            }
        }

        let mut ranked: Vec<(Uuid, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(k);
        ranked
    }
}

pub struct Bm25Index {
    k1: f64,
    b: f64,
    recompute_after: usize,
    projects: RwLock<HashMap<String, ProjectIndex>>,
}

impl Bm25Index {
    pub fn new(k1: f64, b: f64, recompute_after: usize) -> Self {
        Self {
            k1,
            b,
            recompute_after,
            projects: RwLock::new(HashMap::new()),
        }
    }

    pub fn add(&self, project: &str, doc_id: Uuid, text: &str) {
        let mut projects = self.projects.write();
        let entry = projects.entry(project.to_string()).or_default();
        entry.add(doc_id, text);
        entry.recompute_if_due(self.recompute_after);
    }

    pub fn update(&self, project: &str, doc_id: Uuid, text: &str) {
        let mut projects = self.projects.write();
        let entry = projects.entry(project.to_string()).or_default();
        entry.remove(doc_id);
        entry.add(doc_id, text);
        entry.recompute_if_due(self.recompute_after);
    }

    pub fn remove(&self, project: &str, doc_id: Uuid) {
        let mut projects = self.projects.write();
        if let Some(entry) = projects.get_mut(project) {
            entry.remove(doc_id);
            entry.recompute_if_due(self.recompute_after);
        }
    }

    /// Drop every document for `project` (used by project deletion).
    pub fn clear_project(&self, project: &str) {
        self.projects.write().remove(project);
    }

    /// `query` on an empty (or absent) project index returns `[]`, not an
    /// error.
    pub fn query(&self, project: &str, text: &str, k: usize) -> Vec<(Uuid, f64)> {
        let projects = self.projects.read();
        match projects.get(project) {
            Some(entry) => entry.query(text, k, self.k1, self.b),
            None => Vec::new(),
        }
    }

    pub fn doc_count(&self, project: &str) -> usize {
        self.projects
            .read()
            .get(project)
            .map(|p| p.doc_lengths.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_index_query_returns_empty() {
        let idx = Bm25Index::new(1.5, 0.75, 1000);
        assert!(idx.query("proj", "anything", 10).is_empty());
    }

    #[test]
    fn exact_term_match_ranks_above_partial() {
        let idx = Bm25Index::new(1.5, 0.75, 1000);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        idx.add("proj", a, "fetch user from database and cache the user record");
        idx.add("proj", b, "render the navigation bar component");
        let hits = idx.query("proj", "user database", 5);
        assert_eq!(hits[0].0, a);
    }

    #[test]
    fn remove_drops_document_from_results() {
        let idx = Bm25Index::new(1.5, 0.75, 1000);
        let a = Uuid::new_v4();
        idx.add("proj", a, "fetch user record");
        assert_eq!(idx.doc_count("proj"), 1);
        idx.remove("proj", a);
        assert_eq!(idx.doc_count("proj"), 0);
        assert!(idx.query("proj", "user", 5).is_empty());
    }

    #[test]
    fn update_replaces_prior_terms() {
        let idx = Bm25Index::new(1.5, 0.75, 1000);
        let a = Uuid::new_v4();
        idx.add("proj", a, "alpha beta");
        idx.update("proj", a, "gamma delta");
        assert!(idx.query("proj", "alpha", 5).is_empty());
        assert_eq!(idx.query("proj", "gamma", 5)[0].0, a);
    }

    #[test]
    fn clear_project_drops_all_its_documents() {
        let idx = Bm25Index::new(1.5, 0.75, 1000);
        idx.add("proj", Uuid::new_v4(), "hello world");
        idx.clear_project("proj");
        assert_eq!(idx.doc_count("proj"), 0);
    }
}
