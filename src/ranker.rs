use crate::compatibility::CompatibilityModel;
use crate::error::Result;
use crate::simulation::MarketState;
use crate::types::*;
use std::collections::HashMap;

/// A candidate scored for one acting user on one day
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredCandidate {
    /// Dense user index of the candidate
    pub candidate: usize,
    pub score: f64,
    pub source: CandidateSource,
    /// Earliest pending like from this candidate, or today for fresh ones
    pub sent_day: Day,
}

/// Builds the daily shown list for a user
pub struct Ranker {
    config: MarketConfig,
}

impl Ranker {
    pub fn new(config: MarketConfig) -> Self {
        Self { config }
    }

    /// Score for a candidate who already liked the acting user
    pub fn incoming_score(&self, forward: f64) -> f64 {
        forward
    }

    /// Score for a fresh candidate:
    /// P(u,c) * 1/(1 + w_q * Q(c)) * P(c,u)^w_r, multiplied in that order
    pub fn fresh_score(&self, forward: f64, candidate_queue_len: usize, reciprocal: f64) -> f64 {
        forward
            * self.config.queue_penalty(candidate_queue_len)
            * self.config.reciprocal_boost(reciprocal)
    }

    /// Score every unmatched opposite-group user for `user` and keep the
    /// top `daily_queue_size`. Equal scores keep pool order. NaN scores take
    /// their place in the IEEE total order, so ranking never panics.
    pub fn rank(
        &self,
        model: &CompatibilityModel,
        state: &MarketState,
        user: usize,
        day: Day,
    ) -> Result<Vec<ScoredCandidate>> {
        let mut scored = self.score_pool(model, state, user, day)?;
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(self.config.daily_queue_size);
        Ok(scored)
    }

    /// Score the full candidate pool in pool order, unsorted
    pub fn score_pool(
        &self,
        model: &CompatibilityModel,
        state: &MarketState,
        user: usize,
        day: Day,
    ) -> Result<Vec<ScoredCandidate>> {
        // sender -> earliest day one of their likes is still pending
        let mut incoming: HashMap<usize, Day> = HashMap::new();
        for entry in state.pending_for(user) {
            incoming
                .entry(entry.sender)
                .and_modify(|d| *d = (*d).min(entry.day_sent))
                .or_insert(entry.day_sent);
        }

        let pool = model
            .group_range(model.group_at(user).opposite())
            .filter(|&c| !state.is_matched(user, c));

        let mut scored = Vec::new();
        for candidate in pool {
            let forward = model.like_probability_at(user, candidate)?;

            let entry = match incoming.get(&candidate) {
                Some(&sent_day) => ScoredCandidate {
                    candidate,
                    score: self.incoming_score(forward),
                    source: CandidateSource::Incoming,
                    sent_day,
                },
                None => {
                    let reciprocal = model.like_probability_at(candidate, user)?;
                    ScoredCandidate {
                        candidate,
                        score: self.fresh_score(
                            forward,
                            state.pending_for(candidate).len(),
                            reciprocal,
                        ),
                        source: CandidateSource::Fresh,
                        sent_day: day,
                    }
                }
            };
            scored.push(entry);
        }

        Ok(scored)
    }
}
