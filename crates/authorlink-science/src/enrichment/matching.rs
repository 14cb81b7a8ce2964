//! Similarity primitives shared by the fuzzy join and the email matcher.

/// Float tolerance for inclusive threshold comparisons.
pub const SCORE_EPSILON: f64 = 1e-9;

/// Character-level Levenshtein distance scaled by the longer string's length.
/// Two empty strings are at distance 0.
pub fn normalized_distance(a: &str, b: &str) -> f64 {
    let len = a.chars().count().max(b.chars().count());
    if len == 0 {
        return 0.0;
    }
    strsim::levenshtein(a, b) as f64 / len as f64
}

/// Case-folded similarity of two names, `1 - normalized_distance`.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    1.0 - normalized_distance(&a.to_lowercase(), &b.to_lowercase())
}

/// Dense `rows x cols` score table. Higher is better; non-finite scores mark
/// pairs that must never be selected.
#[derive(Debug, Clone)]
pub struct SimilarityMatrix {
    rows: usize,
    cols: usize,
    scores: Vec<f64>,
}

impl SimilarityMatrix {
    pub fn build<R, C>(rows: &[R], cols: &[C], score: impl Fn(&R, &C) -> f64) -> Self {
        let mut scores = Vec::with_capacity(rows.len() * cols.len());
        for r in rows {
            for c in cols {
                scores.push(score(r, c));
            }
        }
        Self {
            rows: rows.len(),
            cols: cols.len(),
            scores,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.scores[row * self.cols + col]
    }

    /// Best accepted column of `row`; the first one wins ties.
    pub fn row_argmax(&self, row: usize, accept: impl Fn(f64) -> bool) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for col in 0..self.cols {
            let score = self.get(row, col);
            if !score.is_finite() || !accept(score) {
                continue;
            }
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((col, score)),
            }
        }
        best
    }

    /// Row argmax for every row, then one owner per column: when several rows
    /// pick the same column the highest score keeps it (earliest row on ties)
    /// and the others get `None`.
    pub fn assign_unique(&self, accept: impl Fn(f64) -> bool) -> Vec<Option<(usize, f64)>> {
        let mut picks: Vec<Option<(usize, f64)>> =
            (0..self.rows).map(|row| self.row_argmax(row, &accept)).collect();

        let mut owner: Vec<Option<usize>> = vec![None; self.cols];
        for row in 0..self.rows {
            let Some((col, score)) = picks[row] else {
                continue;
            };
            match owner[col] {
                None => owner[col] = Some(row),
                Some(prev) => {
                    let prev_score = picks[prev].map(|(_, s)| s).unwrap_or(f64::NEG_INFINITY);
                    if score > prev_score {
                        picks[prev] = None;
                        owner[col] = Some(row);
                    } else {
                        picks[row] = None;
                    }
                }
            }
        }
        picks
    }
}
