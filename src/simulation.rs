use crate::compatibility::CompatibilityModel;
use crate::error::Result;
use crate::ranker::{Ranker, ScoredCandidate};
use crate::types::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, info};

/// A pending like keyed by dense user index
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingEntry {
    pub sender: usize,
    pub day_sent: Day,
}

/// All mutable per-user state of a run, indexed by dense user index
#[derive(Clone, Debug, Default)]
pub struct MarketState {
    /// Unresolved likes addressed to each user, oldest first
    pending: Vec<Vec<PendingEntry>>,
    matches: Vec<BTreeSet<usize>>,
    likes_sent: Vec<HashSet<usize>>,
}

impl MarketState {
    pub fn new(user_count: usize) -> Self {
        Self {
            pending: vec![Vec::new(); user_count],
            matches: vec![BTreeSet::new(); user_count],
            likes_sent: vec![HashSet::new(); user_count],
        }
    }

    pub fn pending_for(&self, user: usize) -> &[PendingEntry] {
        &self.pending[user]
    }

    pub fn push_pending(&mut self, recipient: usize, sender: usize, day_sent: Day) {
        self.pending[recipient].push(PendingEntry { sender, day_sent });
    }

    /// Remove the oldest pending like from `sender` in `recipient`'s queue
    pub fn resolve_pending(&mut self, recipient: usize, sender: usize) -> Option<PendingEntry> {
        let queue = &mut self.pending[recipient];
        let position = queue.iter().position(|e| e.sender == sender)?;
        Some(queue.remove(position))
    }

    pub fn matches_of(&self, user: usize) -> &BTreeSet<usize> {
        &self.matches[user]
    }

    pub fn is_matched(&self, a: usize, b: usize) -> bool {
        self.matches[a].contains(&b)
    }

    pub fn add_match(&mut self, a: usize, b: usize) {
        self.matches[a].insert(b);
        self.matches[b].insert(a);
    }

    pub fn has_liked(&self, sender: usize, recipient: usize) -> bool {
        self.likes_sent[sender].contains(&recipient)
    }

    pub fn record_like(&mut self, sender: usize, recipient: usize) {
        self.likes_sent[sender].insert(recipient);
    }
}

/// Result of a completed run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunOutcome {
    pub config: MarketConfig,
    /// Every processed decision, in day then login order
    pub event_log: Vec<EventRecord>,
    /// Final match set of every user (empty sets included)
    pub matches: BTreeMap<UserId, BTreeSet<UserId>>,
    /// Likes still waiting in each user's queue at run end
    pub pending: BTreeMap<UserId, Vec<PendingLike>>,
}

impl RunOutcome {
    /// Events of one day, in the order they were produced
    pub fn events_for_day(&self, day: Day) -> &[EventRecord] {
        let start = self.event_log.partition_point(|e| e.day < day);
        let end = self.event_log.partition_point(|e| e.day <= day);
        &self.event_log[start..end]
    }

    /// The log split into one slice per simulated day
    pub fn daily_logs(&self) -> Vec<&[EventRecord]> {
        (1..=self.config.days).map(|day| self.events_for_day(day)).collect()
    }

    /// Matched pairs, each counted once
    pub fn match_pair_count(&self) -> usize {
        self.matches.values().map(|m| m.len()).sum::<usize>() / 2
    }
}

/// Day-by-day simulation over a fixed compatibility model
pub struct MarketSimulation<'a> {
    model: &'a CompatibilityModel,
    config: MarketConfig,
    ranker: Ranker,
    state: MarketState,
    rng: StdRng,
    /// Last completed day (0 before the first day runs)
    pub current_day: Day,
    event_log: Vec<EventRecord>,
}

impl<'a> MarketSimulation<'a> {
    /// Validate inputs and set up empty state. Fails before any event is produced.
    pub fn new(model: &'a CompatibilityModel, config: MarketConfig) -> Result<Self> {
        config.validate()?;
        model.ensure_complete()?;

        Ok(Self {
            model,
            ranker: Ranker::new(config.clone()),
            state: MarketState::new(model.len()),
            rng: StdRng::seed_from_u64(config.seed),
            current_day: 0,
            event_log: Vec::new(),
            config,
        })
    }

    pub fn is_finished(&self) -> bool {
        self.current_day >= self.config.days
    }

    pub fn state(&self) -> &MarketState {
        &self.state
    }

    pub fn event_log(&self) -> &[EventRecord] {
        &self.event_log
    }

    /// Run the next day. Returns false once all configured days have run.
    pub fn step_day(&mut self) -> Result<bool> {
        if self.is_finished() {
            return Ok(false);
        }
        let day = self.current_day + 1;

        let mut login_order: Vec<usize> = (0..self.model.len()).collect();
        login_order.shuffle(&mut self.rng);

        let mut day_records = Vec::new();
        for user in login_order {
            self.process_user(user, day, &mut day_records)?;
        }

        debug!(
            day,
            events = day_records.len(),
            likes = day_records.iter().filter(|e| e.is_like()).count(),
            matches_formed = day_records.iter().filter(|e| e.match_formed).count(),
            "day complete"
        );

        self.event_log.extend(day_records);
        self.current_day = day;
        Ok(true)
    }

    /// Show `user` their ranked list for `day` and resolve each decision
    fn process_user(
        &mut self,
        user: usize,
        day: Day,
        records: &mut Vec<EventRecord>,
    ) -> Result<()> {
        let shown = self.ranker.rank(self.model, &self.state, user, day)?;

        for ScoredCandidate { candidate, score, source, sent_day } in shown {
            let like_probability = self.model.like_probability_at(user, candidate)?;
            let random_roll: f64 = self.rng.gen();

            let mut decision = Decision::Pass;
            let mut match_formed = false;

            if random_roll < like_probability {
                decision = Decision::Like;

                if self.state.has_liked(candidate, user) {
                    match_formed = true;
                    self.state.add_match(user, candidate);
                } else {
                    self.state.record_like(user, candidate);
                    if source == CandidateSource::Fresh {
                        self.state.push_pending(candidate, user, day);
                    }
                }

                // A pass leaves the incoming like pending; it is offered again tomorrow
                if source == CandidateSource::Incoming {
                    self.state.resolve_pending(user, candidate);
                }
            }

            records.push(EventRecord {
                day,
                user_id: self.model.id(user).clone(),
                candidate_id: self.model.id(candidate).clone(),
                score,
                source,
                like_probability,
                random_roll,
                decision,
                match_formed,
                delay: day - sent_day,
            });
        }

        Ok(())
    }

    /// Run all remaining days and hand back the outcome
    pub fn run(mut self) -> Result<RunOutcome> {
        while self.step_day()? {}
        Ok(self.into_outcome())
    }

    /// Snapshot the current state as an outcome, consuming the simulation
    pub fn into_outcome(self) -> RunOutcome {
        let model = self.model;

        let matches = (0..model.len())
            .map(|u| {
                let set: BTreeSet<UserId> =
                    self.state.matches_of(u).iter().map(|&m| model.id(m).clone()).collect();
                (model.id(u).clone(), set)
            })
            .collect();

        let pending = (0..model.len())
            .map(|u| {
                let queue: Vec<PendingLike> = self
                    .state
                    .pending_for(u)
                    .iter()
                    .map(|e| PendingLike {
                        sender: model.id(e.sender).clone(),
                        day_sent: e.day_sent,
                    })
                    .collect();
                (model.id(u).clone(), queue)
            })
            .collect();

        let outcome = RunOutcome {
            config: self.config,
            event_log: self.event_log,
            matches,
            pending,
        };

        info!(
            days = self.current_day,
            events = outcome.event_log.len(),
            matches = outcome.match_pair_count(),
            "simulation run complete"
        );

        outcome
    }
}

/// Run a full simulation: validate, simulate `config.days` days, return the outcome
pub fn run(model: &CompatibilityModel, config: &MarketConfig) -> Result<RunOutcome> {
    MarketSimulation::new(model, config.clone())?.run()
}
