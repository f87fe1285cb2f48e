use crate::error::{MarketError, Result};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;

/// Raw compatibility data as handed over by a loader (JSON on the wasm side)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CompatibilityData {
    pub women: Vec<UserId>,
    pub men: Vec<UserId>,
    /// woman -> man -> probability the woman likes the man when shown him
    pub women_likes_men: HashMap<UserId, HashMap<UserId, f64>>,
    /// man -> woman -> probability the man likes the woman when shown her
    pub men_likes_women: HashMap<UserId, HashMap<UserId, f64>>,
}

/// Immutable pairwise like probabilities for both directions.
///
/// Users get a dense index: women occupy `0..women.len()`, men follow. That
/// index order is also the fixed union order the engine shuffles each day.
#[derive(Clone, Debug)]
pub struct CompatibilityModel {
    women: Vec<UserId>,
    men: Vec<UserId>,
    index: HashMap<UserId, usize>,
    /// Row per woman, column per man
    women_to_men: Vec<Option<f64>>,
    /// Row per man, column per woman
    men_to_women: Vec<Option<f64>>,
}

impl CompatibilityModel {
    /// Create a model with both groups and empty probability tables
    pub fn new(women: Vec<UserId>, men: Vec<UserId>) -> Result<Self> {
        let mut index = HashMap::with_capacity(women.len() + men.len());
        for (i, id) in women.iter().chain(men.iter()).enumerate() {
            if index.insert(id.clone(), i).is_some() {
                return Err(MarketError::DuplicateUser(id.clone()));
            }
        }

        let cells = women.len() * men.len();
        Ok(Self {
            women,
            men,
            index,
            women_to_men: vec![None; cells],
            men_to_women: vec![None; cells],
        })
    }

    /// Build a model from loader output. Pairs absent from the tables stay
    /// missing and fail on lookup.
    pub fn from_data(data: CompatibilityData) -> Result<Self> {
        let mut model = Self::new(data.women, data.men)?;

        for (direction, table) in [
            (Direction::WomenToMen, &data.women_likes_men),
            (Direction::MenToWomen, &data.men_likes_women),
        ] {
            for (source, row) in table {
                for (candidate, &probability) in row {
                    model.set_probability(direction, source, candidate, probability)?;
                }
            }
        }

        Ok(model)
    }

    /// Model where every pair in both directions has the same probability
    pub fn uniform(women: Vec<UserId>, men: Vec<UserId>, probability: f64) -> Result<Self> {
        let mut model = Self::new(women, men)?;
        model.women_to_men.iter_mut().for_each(|p| *p = Some(probability));
        model.men_to_women.iter_mut().for_each(|p| *p = Some(probability));
        Ok(model)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let data: CompatibilityData = serde_json::from_str(json)?;
        Self::from_data(data)
    }

    pub fn set_probability(
        &mut self,
        direction: Direction,
        source: &str,
        candidate: &str,
        probability: f64,
    ) -> Result<()> {
        let cell = self.cell(direction, source, candidate)?;
        match direction {
            Direction::WomenToMen => self.women_to_men[cell] = Some(probability),
            Direction::MenToWomen => self.men_to_women[cell] = Some(probability),
        }
        Ok(())
    }

    /// Stored probability that `source` likes `candidate`, read from the
    /// `direction` table
    pub fn probability(&self, direction: Direction, source: &str, candidate: &str) -> Result<f64> {
        let cell = self.cell(direction, source, candidate)?;
        let table = match direction {
            Direction::WomenToMen => &self.women_to_men,
            Direction::MenToWomen => &self.men_to_women,
        };
        table[cell].ok_or_else(|| MarketError::MissingProbability {
            user: source.to_string(),
            candidate: candidate.to_string(),
        })
    }

    /// Forward probability, with the table picked from the source's group
    pub fn like_probability(&self, source: &str, candidate: &str) -> Result<f64> {
        let group = self.group_of(source)?;
        self.probability(Direction::from_sender(group), source, candidate)
    }

    /// Forward probability by dense index
    pub(crate) fn like_probability_at(&self, source: usize, candidate: usize) -> Result<f64> {
        let women = self.women.len();
        let men = self.men.len();
        let value = match (source < women, candidate < women) {
            (true, false) => self.women_to_men[source * men + (candidate - women)],
            (false, true) => self.men_to_women[(source - women) * women + candidate],
            _ => None,
        };
        value.ok_or_else(|| MarketError::MissingProbability {
            user: self.id(source).to_string(),
            candidate: self.id(candidate).to_string(),
        })
    }

    /// Fail with the first missing pair, scanning women's table then men's
    pub fn ensure_complete(&self) -> Result<()> {
        for source in 0..self.len() {
            for candidate in self.group_range(self.group_at(source).opposite()) {
                self.like_probability_at(source, candidate)?;
            }
        }
        Ok(())
    }

    /// Average probability that members of the other group like `id`
    pub fn mean_incoming_probability(&self, id: &str) -> Result<f64> {
        let target = self.index_of(id)?;
        let senders = self.group_range(self.group_at(target).opposite());
        if senders.is_empty() {
            return Err(MarketError::EmptyGroup(self.group_at(target).opposite()));
        }

        let count = senders.len();
        let mut total = 0.0;
        for sender in senders {
            total += self.like_probability_at(sender, target)?;
        }
        Ok(total / count as f64)
    }

    pub fn group_of(&self, id: &str) -> Result<Group> {
        self.index_of(id).map(|i| self.group_at(i))
    }

    pub fn ids(&self, group: Group) -> &[UserId] {
        match group {
            Group::Women => &self.women,
            Group::Men => &self.men,
        }
    }

    /// All users in the fixed union order (women first)
    pub fn all_ids(&self) -> impl Iterator<Item = &UserId> {
        self.women.iter().chain(self.men.iter())
    }

    pub fn len(&self) -> usize {
        self.women.len() + self.men.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn index_of(&self, id: &str) -> Result<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| MarketError::UnknownUser(id.to_string()))
    }

    pub(crate) fn id(&self, index: usize) -> &UserId {
        if index < self.women.len() {
            &self.women[index]
        } else {
            &self.men[index - self.women.len()]
        }
    }

    pub(crate) fn group_at(&self, index: usize) -> Group {
        if index < self.women.len() {
            Group::Women
        } else {
            Group::Men
        }
    }

    pub(crate) fn group_range(&self, group: Group) -> Range<usize> {
        match group {
            Group::Women => 0..self.women.len(),
            Group::Men => self.women.len()..self.len(),
        }
    }

    fn cell(&self, direction: Direction, source: &str, candidate: &str) -> Result<usize> {
        let source_index = self.index_of(source)?;
        let candidate_index = self.index_of(candidate)?;
        let sender_group = direction.sender_group();

        // Ids from the wrong group are unknown to this table
        if self.group_at(source_index) != sender_group {
            return Err(MarketError::UnknownUser(source.to_string()));
        }
        if self.group_at(candidate_index) != sender_group.opposite() {
            return Err(MarketError::UnknownUser(candidate.to_string()));
        }

        let women = self.women.len();
        let men = self.men.len();
        Ok(match direction {
            Direction::WomenToMen => source_index * men + (candidate_index - women),
            Direction::MenToWomen => (source_index - women) * women + candidate_index,
        })
    }
}
