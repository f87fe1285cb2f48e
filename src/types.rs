use crate::error::{MarketError, Result};
use serde::{Deserialize, Serialize};

/// User identifier, unique across both groups
pub type UserId = String;

/// Simulation day, starting at 1
pub type Day = u32;

/// The two disjoint user populations. Matching only happens across groups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Group {
    Women,
    Men,
}

impl Group {
    pub fn opposite(&self) -> Group {
        match self {
            Group::Women => Group::Men,
            Group::Men => Group::Women,
        }
    }

    /// Parse a group name as it appears on the JS side ("women" / "men")
    pub fn from_name(name: &str) -> Option<Group> {
        match name.to_ascii_lowercase().as_str() {
            "women" | "woman" | "w" => Some(Group::Women),
            "men" | "man" | "m" => Some(Group::Men),
            _ => None,
        }
    }
}

/// Which probability table a lookup reads from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    WomenToMen,
    MenToWomen,
}

impl Direction {
    /// Direction of a like sent by a member of `group`
    pub fn from_sender(group: Group) -> Direction {
        match group {
            Group::Women => Direction::WomenToMen,
            Group::Men => Direction::MenToWomen,
        }
    }

    pub fn sender_group(&self) -> Group {
        match self {
            Direction::WomenToMen => Group::Women,
            Direction::MenToWomen => Group::Men,
        }
    }
}

/// How a candidate entered the acting user's shown list
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    /// The candidate already has a like pending in the acting user's queue
    Incoming,
    Fresh,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Like,
    Pass,
}

/// An unresolved like waiting in the recipient's queue
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLike {
    pub sender: UserId,
    pub day_sent: Day,
}

/// One shown-and-processed candidate for one user on one day
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub day: Day,
    pub user_id: UserId,
    pub candidate_id: UserId,
    /// Ranking score the candidate was shown with
    pub score: f64,
    pub source: CandidateSource,
    /// Forward probability P(user, candidate) the decision was drawn against
    pub like_probability: f64,
    pub random_roll: f64,
    pub decision: Decision,
    pub match_formed: bool,
    /// Days between the pending like being sent and this decision (0 for fresh)
    pub delay: Day,
}

impl EventRecord {
    pub fn is_like(&self) -> bool {
        self.decision == Decision::Like
    }

    /// Incoming like acted on at least one day after it was sent
    pub fn is_stale_like(&self) -> bool {
        self.source == CandidateSource::Incoming && self.is_like() && self.delay >= 1
    }

    pub fn involves(&self, id: &str) -> bool {
        self.user_id == id || self.candidate_id == id
    }
}

/// Run configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Number of simulated days
    pub days: Day,
    /// Candidates surfaced per user per day
    pub daily_queue_size: usize,
    /// Weight of the candidate's pending-like queue length in the penalty term
    pub queue_penalty_weight: f64,
    /// Exponent applied to the reciprocal probability P(candidate, user)
    pub reciprocal_weight: f64,
    pub seed: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            days: 3,
            daily_queue_size: 5,
            queue_penalty_weight: 0.5,
            reciprocal_weight: 1.0,
            seed: 42,
        }
    }
}

impl MarketConfig {
    pub fn validate(&self) -> Result<()> {
        if self.days < 1 {
            return Err(MarketError::InvalidConfig("days must be at least 1".to_string()));
        }
        if self.daily_queue_size < 1 {
            return Err(MarketError::InvalidConfig(
                "daily_queue_size must be at least 1".to_string(),
            ));
        }
        if !self.queue_penalty_weight.is_finite() || self.queue_penalty_weight < 0.0 {
            return Err(MarketError::InvalidConfig(format!(
                "queue_penalty_weight must be a non-negative number, got {}",
                self.queue_penalty_weight
            )));
        }
        if !self.reciprocal_weight.is_finite() || self.reciprocal_weight < 0.0 {
            return Err(MarketError::InvalidConfig(format!(
                "reciprocal_weight must be a non-negative number, got {}",
                self.reciprocal_weight
            )));
        }
        Ok(())
    }

    /// Queue penalty factor 1 / (1 + w_q * Q) for a candidate with `queue_len` pending likes
    pub fn queue_penalty(&self, queue_len: usize) -> f64 {
        1.0 / (1.0 + self.queue_penalty_weight * queue_len as f64)
    }

    /// Reciprocal boost P(candidate, user) ^ w_r
    pub fn reciprocal_boost(&self, reciprocal_probability: f64) -> f64 {
        reciprocal_probability.powf(self.reciprocal_weight)
    }
}

/// A count split by group
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCounts {
    pub women: usize,
    pub men: usize,
}

impl GroupCounts {
    pub fn add(&mut self, group: Group) {
        match group {
            Group::Women => self.women += 1,
            Group::Men => self.men += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.women + self.men
    }
}

/// Aggregate outcome metrics for one run
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketMetrics {
    /// Like decisions, split by the acting user's group
    pub likes_sent: GroupCounts,
    /// Matched pairs (each pair counted once)
    pub unique_matches: usize,
    /// Likes still pending at run end, split by the sender's group
    pub unseen_likes: GroupCounts,
    /// Incoming likes resolved with a Like a day or more late, split by the
    /// original sender's group
    pub stale_likes: GroupCounts,
}

/// Outcome metrics for a single user
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetrics {
    pub user_id: UserId,
    pub likes_sent: usize,
    pub likes_received: usize,
    pub matches: usize,
    /// Likes this user sent that nobody resolved
    pub unseen_likes: usize,
    /// Likes this user sent that were answered late
    pub stale_likes: usize,
}
