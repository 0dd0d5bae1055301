use crate::models::AnswerRecord;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_HISTORY_LIMIT: usize = 5;

/// Caller-owned, bounded list of recent answers, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerHistory {
    limit: usize,
    records: VecDeque<AnswerRecord>,
}

impl Default for AnswerHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl AnswerHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            records: VecDeque::new(),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self.records.truncate(self.limit);
        self
    }

    pub fn record(&mut self, answer: AnswerRecord) {
        self.records.push_front(answer);
        self.records.truncate(self.limit);
    }

    pub fn latest(&self) -> Option<&AnswerRecord> {
        self.records.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnswerRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
