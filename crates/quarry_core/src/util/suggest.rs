/// Best candidate scoring above this is suggested.
const SIMILARITY_THRESHOLD: f64 = 0.7;

#[derive(Debug)]
struct SimilarEntry<'a> {
    score: f64,
    name: &'a str,
}

impl<'a> SimilarEntry<'a> {
    /// Maybe updates `current` with a new candidate if it scores higher in
    /// similarity with `name`.
    fn maybe_update(current: &mut Option<Self>, candidate: &'a str, name: &str) {
        let score = strsim::jaro(&candidate.to_ascii_lowercase(), &name.to_ascii_lowercase());
        if score <= SIMILARITY_THRESHOLD {
            return;
        }
        match current {
            Some(existing) if existing.score >= score => (),
            _ => {
                *current = Some(SimilarEntry {
                    score,
                    name: candidate,
                })
            }
        }
    }
}

/// Find the candidate most similar to `name`, if any is similar enough.
pub fn did_you_mean<'a>(name: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let mut best = None;
    for candidate in candidates {
        SimilarEntry::maybe_update(&mut best, candidate, name);
    }
    best.map(|e| e.name)
}
