use crate::compatibility::CompatibilityModel;
use crate::error::{MarketError, Result};
use crate::simulation::RunOutcome;
use crate::types::*;
use serde::{Deserialize, Serialize};

impl MarketMetrics {
    /// Derive run-level metrics from the event log and final queues
    pub fn compute(model: &CompatibilityModel, outcome: &RunOutcome) -> Result<Self> {
        let mut metrics = MarketMetrics::default();

        for event in &outcome.event_log {
            if event.is_like() {
                metrics.likes_sent.add(model.group_of(&event.user_id)?);
            }
            if event.is_stale_like() {
                metrics.stale_likes.add(model.group_of(&event.candidate_id)?);
            }
        }

        for queue in outcome.pending.values() {
            for entry in queue {
                metrics.unseen_likes.add(model.group_of(&entry.sender)?);
            }
        }

        // Counted from one side so each pair contributes once
        metrics.unique_matches = model
            .ids(Group::Men)
            .iter()
            .map(|id| outcome.matches.get(id).map_or(0, |m| m.len()))
            .sum();

        Ok(metrics)
    }
}

impl UserMetrics {
    pub fn compute(outcome: &RunOutcome, user_id: &str) -> Self {
        let mut metrics = UserMetrics {
            user_id: user_id.to_string(),
            ..UserMetrics::default()
        };

        for event in &outcome.event_log {
            if !event.is_like() {
                continue;
            }
            if event.user_id == user_id {
                metrics.likes_sent += 1;
            }
            if event.candidate_id == user_id {
                metrics.likes_received += 1;
                if event.is_stale_like() {
                    metrics.stale_likes += 1;
                }
            }
        }

        metrics.matches = outcome.matches.get(user_id).map_or(0, |m| m.len());
        metrics.unseen_likes = outcome
            .pending
            .values()
            .flat_map(|queue| queue.iter())
            .filter(|entry| entry.sender == user_id)
            .count();

        metrics
    }
}

/// The most typical member of each group, chosen by how much the other group likes them
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Representatives {
    pub woman: UserId,
    pub man: UserId,
}

impl Representatives {
    pub fn select(model: &CompatibilityModel) -> Result<Self> {
        Ok(Self {
            woman: representative_of(model, Group::Women)?,
            man: representative_of(model, Group::Men)?,
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.woman == id || self.man == id
    }
}

/// Group member whose mean incoming probability is closest to the group mean.
/// The first such member in list order wins ties.
pub fn representative_of(model: &CompatibilityModel, group: Group) -> Result<UserId> {
    let ids = model.ids(group);
    if ids.is_empty() {
        return Err(MarketError::EmptyGroup(group));
    }

    let appeal = ids
        .iter()
        .map(|id| model.mean_incoming_probability(id))
        .collect::<Result<Vec<f64>>>()?;
    let group_mean = appeal.iter().sum::<f64>() / appeal.len() as f64;

    let mut best = 0;
    for (i, value) in appeal.iter().enumerate() {
        if (value - group_mean).abs() < (appeal[best] - group_mean).abs() {
            best = i;
        }
    }

    Ok(ids[best].clone())
}

/// Per-user metrics of one representative, tagged with the group it stands for
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RepresentativeMetadata {
    pub role: Group,
    #[serde(flatten)]
    pub metrics: UserMetrics,
}

/// Events touching the representative users plus their per-user metrics
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepresentativeTrace {
    pub representatives: Representatives,
    /// The man's row, then the woman's
    pub metadata: Vec<RepresentativeMetadata>,
    pub events: Vec<EventRecord>,
}

impl RepresentativeTrace {
    pub fn build(model: &CompatibilityModel, outcome: &RunOutcome) -> Result<Self> {
        let representatives = Representatives::select(model)?;

        let metadata = [(Group::Men, &representatives.man), (Group::Women, &representatives.woman)]
            .into_iter()
            .map(|(role, id)| RepresentativeMetadata {
                role,
                metrics: UserMetrics::compute(outcome, id),
            })
            .collect();

        let events = outcome
            .event_log
            .iter()
            .filter(|e| {
                representatives.contains(&e.user_id) || representatives.contains(&e.candidate_id)
            })
            .cloned()
            .collect();

        Ok(Self { representatives, metadata, events })
    }
}

/// Per-user match counts for one group, ascending (stable on list order)
pub fn sorted_match_counts(
    model: &CompatibilityModel,
    outcome: &RunOutcome,
    group: Group,
) -> Vec<(UserId, usize)> {
    let mut counts: Vec<(UserId, usize)> = model
        .ids(group)
        .iter()
        .map(|id| (id.clone(), outcome.matches.get(id).map_or(0, |m| m.len())))
        .collect();
    counts.sort_by_key(|(_, count)| *count);
    counts
}

/// Config echo plus metrics, the payload a summary report renders
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub config: MarketConfig,
    pub metrics: MarketMetrics,
    pub total_likes: usize,
    pub total_unseen_likes: usize,
    pub total_stale_likes: usize,
    pub total_events: usize,
}

impl RunSummary {
    pub fn build(model: &CompatibilityModel, outcome: &RunOutcome) -> Result<Self> {
        let metrics = MarketMetrics::compute(model, outcome)?;
        Ok(Self {
            config: outcome.config.clone(),
            total_likes: metrics.likes_sent.total(),
            total_unseen_likes: metrics.unseen_likes.total(),
            total_stale_likes: metrics.stale_likes.total(),
            total_events: outcome.event_log.len(),
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::run;
    use std::collections::{BTreeMap, BTreeSet};

    fn event(
        day: Day,
        user: &str,
        candidate: &str,
        source: CandidateSource,
        like: bool,
        delay: Day,
    ) -> EventRecord {
        EventRecord {
            day,
            user_id: user.to_string(),
            candidate_id: candidate.to_string(),
            score: 0.5,
            source,
            like_probability: 0.5,
            random_roll: if like { 0.1 } else { 0.9 },
            decision: if like { Decision::Like } else { Decision::Pass },
            match_formed: false,
            delay,
        }
    }

    fn two_by_two() -> CompatibilityModel {
        CompatibilityModel::uniform(
            vec!["W1".into(), "W2".into()],
            vec!["M1".into(), "M2".into()],
            0.5,
        )
        .unwrap()
    }

    /// Hand-built outcome: W1 and M1 matched, M2 liked W2 on day 1 and is still pending,
    /// W1 answered M2's day-1 like on day 3.
    fn handmade_outcome() -> RunOutcome {
        let mut matched = event(1, "M1", "W1", CandidateSource::Incoming, true, 0);
        matched.match_formed = true;

        let event_log = vec![
            event(1, "W1", "M1", CandidateSource::Fresh, true, 0),
            matched,
            event(1, "M2", "W2", CandidateSource::Fresh, true, 0),
            event(1, "M2", "W1", CandidateSource::Fresh, true, 0),
            event(2, "W2", "M2", CandidateSource::Incoming, false, 1),
            event(3, "W1", "M2", CandidateSource::Incoming, true, 2),
            event(3, "W2", "M1", CandidateSource::Fresh, false, 0),
        ];

        let mut matches: BTreeMap<UserId, BTreeSet<UserId>> = BTreeMap::new();
        for id in ["W1", "W2", "M1", "M2"] {
            matches.insert(id.to_string(), BTreeSet::new());
        }
        matches.get_mut("W1").unwrap().insert("M1".to_string());
        matches.get_mut("M1").unwrap().insert("W1".to_string());

        let mut pending: BTreeMap<UserId, Vec<PendingLike>> = BTreeMap::new();
        for id in ["W1", "W2", "M1", "M2"] {
            pending.insert(id.to_string(), Vec::new());
        }
        pending
            .get_mut("W2")
            .unwrap()
            .push(PendingLike { sender: "M2".to_string(), day_sent: 1 });

        RunOutcome {
            config: MarketConfig::default(),
            event_log,
            matches,
            pending,
        }
    }

    #[test]
    fn test_market_metrics_from_log() {
        let model = two_by_two();
        let metrics = MarketMetrics::compute(&model, &handmade_outcome()).unwrap();

        assert_eq!(metrics.likes_sent, GroupCounts { women: 2, men: 3 });
        assert_eq!(metrics.unique_matches, 1);
        assert_eq!(metrics.unseen_likes, GroupCounts { women: 0, men: 1 });
        // W1's late answer to M2 counts against the men's side
        assert_eq!(metrics.stale_likes, GroupCounts { women: 0, men: 1 });
    }

    #[test]
    fn test_user_metrics() {
        let outcome = handmade_outcome();

        let m2 = UserMetrics::compute(&outcome, "M2");
        assert_eq!(m2.likes_sent, 2);
        assert_eq!(m2.likes_received, 1);
        assert_eq!(m2.matches, 0);
        assert_eq!(m2.unseen_likes, 1);
        assert_eq!(m2.stale_likes, 1);

        let w1 = UserMetrics::compute(&outcome, "W1");
        assert_eq!(w1.likes_sent, 2);
        assert_eq!(w1.likes_received, 2);
        assert_eq!(w1.matches, 1);
        assert_eq!(w1.stale_likes, 0);
    }

    #[test]
    fn test_representative_is_closest_to_group_mean() {
        let mut model = CompatibilityModel::uniform(
            vec!["W1".into(), "W2".into()],
            vec!["M1".into(), "M2".into(), "M3".into()],
            0.5,
        )
        .unwrap();
        // Mean incoming for M1..M3: 0.9, 0.45, 0.1 -> group mean ~0.483
        for (man, p) in [("M1", 0.9), ("M2", 0.45), ("M3", 0.1)] {
            for woman in ["W1", "W2"] {
                model.set_probability(Direction::WomenToMen, woman, man, p).unwrap();
            }
        }

        assert_eq!(representative_of(&model, Group::Men).unwrap(), "M2");
        // Uniform incoming on the women's side: first in list order wins
        assert_eq!(representative_of(&model, Group::Women).unwrap(), "W1");
    }

    #[test]
    fn test_representative_of_empty_group() {
        let model = CompatibilityModel::new(vec!["W1".into()], vec![]).unwrap();
        assert!(matches!(
            representative_of(&model, Group::Men),
            Err(MarketError::EmptyGroup(Group::Men))
        ));
    }

    #[test]
    fn test_representative_trace_filters_events() {
        let model = two_by_two();
        let outcome = handmade_outcome();
        let trace = RepresentativeTrace::build(&model, &outcome).unwrap();

        assert_eq!(
            trace.representatives,
            Representatives { woman: "W1".into(), man: "M1".into() }
        );
        assert_eq!(trace.metadata.len(), 2);
        assert_eq!(trace.metadata[0].role, Group::Men);
        assert_eq!(trace.metadata[0].metrics.user_id, "M1");
        assert_eq!(trace.metadata[1].role, Group::Women);
        assert_eq!(trace.metadata[1].metrics.user_id, "W1");
        for row in &trace.metadata {
            assert_eq!(model.group_of(&row.metrics.user_id).unwrap(), row.role);
        }
        assert!(trace.events.iter().all(|e| {
            trace.representatives.contains(&e.user_id)
                || trace.representatives.contains(&e.candidate_id)
        }));
        // Only M2 -> W2 and W2 -> M2 skip both representatives
        assert_eq!(trace.events.len(), outcome.event_log.len() - 2);
    }

    #[test]
    fn test_representative_metadata_json_carries_role() {
        let model = two_by_two();
        let trace = RepresentativeTrace::build(&model, &handmade_outcome()).unwrap();
        let json: serde_json::Value = serde_json::to_value(&trace).unwrap();

        let rows = json["metadata"].as_array().unwrap();
        assert_eq!(rows[0]["role"], "Men");
        assert_eq!(rows[0]["user_id"], "M1");
        assert_eq!(rows[1]["role"], "Women");
        assert_eq!(rows[1]["user_id"], "W1");
        assert_eq!(rows[1]["matches"], 1);
    }

    #[test]
    fn test_sorted_match_counts() {
        let model = two_by_two();
        let counts = sorted_match_counts(&model, &handmade_outcome(), Group::Men);
        assert_eq!(counts, vec![("M2".to_string(), 0), ("M1".to_string(), 1)]);
    }

    #[test]
    fn test_summary_totals_agree_with_simulation() {
        let model = two_by_two();
        let config = MarketConfig { days: 4, daily_queue_size: 2, ..MarketConfig::default() };
        let outcome = run(&model, &config).unwrap();
        let summary = RunSummary::build(&model, &outcome).unwrap();

        let likes = outcome.event_log.iter().filter(|e| e.is_like()).count();
        let unseen: usize = outcome.pending.values().map(|q| q.len()).sum();
        assert_eq!(summary.total_likes, likes);
        assert_eq!(summary.total_unseen_likes, unseen);
        assert_eq!(summary.metrics.unique_matches, outcome.match_pair_count());
        assert_eq!(summary.total_events, outcome.event_log.len());
    }
}
