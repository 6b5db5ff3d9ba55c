//! Time counter use-case service.
//!
//! # Responsibility
//! - Add, remove and list time counters kept in the preference map.
//! - Split counters into "coming up" and "elapsed" boards for display.
//!
//! # Invariants
//! - The counter list is stored as one JSON array under `TIME_COUNTERS_KEY`.
//! - Coming-up counters are sorted soonest first; elapsed ones most recent first.

use crate::model::counter::{CounterId, CounterValidationError, CountdownParts, TimeCounter};
use crate::repo::preference_repo::PreferenceRepository;
use crate::repo::reminder_repo::RepoError;
use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Preference key holding the serialized counter list.
pub const TIME_COUNTERS_KEY: &str = "time_counters";

#[derive(Debug)]
pub enum CounterServiceError {
    Validation(CounterValidationError),
    CounterNotFound(CounterId),
    Repo(RepoError),
}

impl Display for CounterServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::CounterNotFound(id) => write!(f, "counter not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CounterServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::CounterNotFound(_) => None,
        }
    }
}

impl From<CounterValidationError> for CounterServiceError {
    fn from(value: CounterValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for CounterServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Counter with its breakdown at the board instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterView {
    pub counter: TimeCounter,
    pub parts: CountdownParts,
}

/// Counters split by whether their target has been reached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterBoard {
    pub coming_up: Vec<CounterView>,
    pub elapsed: Vec<CounterView>,
}

pub struct CounterService<R: PreferenceRepository> {
    repo: R,
}

impl<R: PreferenceRepository> CounterService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn add_counter(
        &self,
        title: impl Into<String>,
        description: Option<String>,
        target: DateTime<Utc>,
    ) -> Result<TimeCounter, CounterServiceError> {
        let counter = TimeCounter::new(title, description, target);
        counter.validate()?;

        let mut counters = self.list_counters()?;
        counters.push(counter.clone());
        self.repo.set_json(TIME_COUNTERS_KEY, &counters)?;
        Ok(counter)
    }

    pub fn remove_counter(&self, id: CounterId) -> Result<(), CounterServiceError> {
        let mut counters = self.list_counters()?;
        let before = counters.len();
        counters.retain(|counter| counter.id != id);
        if counters.len() == before {
            return Err(CounterServiceError::CounterNotFound(id));
        }
        self.repo.set_json(TIME_COUNTERS_KEY, &counters)?;
        Ok(())
    }

    /// Returns counters in insertion order.
    pub fn list_counters(&self) -> Result<Vec<TimeCounter>, CounterServiceError> {
        Ok(self
            .repo
            .get_json::<Vec<TimeCounter>>(TIME_COUNTERS_KEY)?
            .unwrap_or_default())
    }

    pub fn board(&self, now: DateTime<Utc>) -> Result<CounterBoard, CounterServiceError> {
        let mut board = CounterBoard::default();
        for counter in self.list_counters()? {
            let view = CounterView {
                parts: counter.parts_at(now),
                counter,
            };
            if view.counter.is_elapsed(now) {
                board.elapsed.push(view);
            } else {
                board.coming_up.push(view);
            }
        }
        board.coming_up.sort_by_key(|view| view.counter.target);
        board
            .elapsed
            .sort_by(|a, b| b.counter.target.cmp(&a.counter.target));
        Ok(board)
    }
}
