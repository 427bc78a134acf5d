use crate::model::TaskStatus;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: u64,
    pub in_progress: u64,
    pub completed: u64,
}

impl StatusCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.in_progress + self.completed
    }

    pub fn get(&self, status: TaskStatus) -> u64 {
        match status {
            TaskStatus::Pending => self.pending,
            TaskStatus::InProgress => self.in_progress,
            TaskStatus::Completed => self.completed,
        }
    }

    pub fn add(&mut self, status: TaskStatus, count: u64) {
        match status {
            TaskStatus::Pending => self.pending += count,
            TaskStatus::InProgress => self.in_progress += count,
            TaskStatus::Completed => self.completed += count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Statistics {
    pub counts: StatusCounts,
    /// Completed over total, in `[0, 1]`; zero for an empty store.
    pub completion_ratio: f64,
}

impl Statistics {
    pub fn from_counts(counts: StatusCounts) -> Self {
        let total = counts.total();
        let completion_ratio = if total == 0 {
            0.0
        } else {
            counts.completed as f64 / total as f64
        };

        Self {
            counts,
            completion_ratio,
        }
    }

    pub fn total(&self) -> u64 {
        self.counts.total()
    }

    /// Completion ratio as a percentage rounded to two decimals.
    pub fn completion_percent(&self) -> f64 {
        (self.completion_ratio * 10_000.0).round() / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::{Statistics, StatusCounts};
    use crate::model::TaskStatus;

    #[test]
    fn empty_counts_have_zero_ratio() {
        let stats = Statistics::from_counts(StatusCounts::default());
        assert_eq!(stats.total(), 0);
        assert_eq!(stats.completion_ratio, 0.0);
        assert_eq!(stats.completion_percent(), 0.0);
    }

    #[test]
    fn percent_rounds_to_two_decimals() {
        let mut counts = StatusCounts::default();
        counts.add(TaskStatus::Completed, 1);
        counts.add(TaskStatus::Pending, 2);

        let stats = Statistics::from_counts(counts);
        assert_eq!(stats.total(), 3);
        assert_eq!(stats.completion_percent(), 33.33);
        assert_eq!(stats.counts.get(TaskStatus::Pending), 2);
    }
}
