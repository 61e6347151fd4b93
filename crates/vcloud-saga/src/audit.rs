use std::time::Instant;

/// Status of a step in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StepStatus {
    /// Step is running or completed successfully.
    Executed,
    /// Step failed during execution.
    Failed,
    /// Step was rolled back successfully.
    Compensated,
    /// Step rollback failed.
    CompensationFailed,
}

/// Record of one step run in a transaction.
#[derive(Debug)]
pub struct StepRecord {
    /// Name of the step.
    pub name: String,
    /// Current status.
    pub status: StepStatus,
    /// When the step started executing.
    pub started_at: Instant,
    /// When the step completed (execution or rollback).
    pub completed_at: Option<Instant>,
    /// Description of rollback (if the step completed).
    pub compensation_description: Option<String>,
}

/// Audit log tracking every step run in a transaction.
///
/// Records are addressed by position, so a step type that appears several
/// times in one transaction (waiting on tasks, for instance) keeps a separate
/// record per run.
#[derive(Debug, Default)]
pub struct SagaAuditLog {
    records: Vec<StepRecord>,
}

impl SagaAuditLog {
    /// Create a new empty audit log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a step execution starting, returning its position.
    pub(crate) fn record_start(&mut self, name: &str) -> usize {
        self.records.push(StepRecord {
            name: name.to_string(),
            status: StepStatus::Executed,
            started_at: Instant::now(),
            completed_at: None,
            compensation_description: None,
        });
        self.records.len() - 1
    }

    pub(crate) fn record_failure(&mut self, index: usize) {
        if let Some(record) = self.records.get_mut(index) {
            record.status = StepStatus::Failed;
            record.completed_at = Some(Instant::now());
        }
    }

    pub(crate) fn record_success(&mut self, index: usize, compensation_description: String) {
        if let Some(record) = self.records.get_mut(index) {
            record.status = StepStatus::Executed;
            record.completed_at = Some(Instant::now());
            record.compensation_description = Some(compensation_description);
        }
    }

    pub(crate) fn record_compensated(&mut self, index: usize) {
        if let Some(record) = self.records.get_mut(index) {
            record.status = StepStatus::Compensated;
            record.completed_at = Some(Instant::now());
        }
    }

    pub(crate) fn record_compensation_failed(&mut self, index: usize) {
        if let Some(record) = self.records.get_mut(index) {
            record.status = StepStatus::CompensationFailed;
            record.completed_at = Some(Instant::now());
        }
    }

    /// Get all records in the audit log.
    #[must_use]
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Step names in the order they ran.
    #[must_use]
    pub fn step_names(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.name.as_str()).collect()
    }

    /// Get a summary of the transaction for display.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for record in &self.records {
            let status = match record.status {
                StepStatus::Executed => "✓",
                StepStatus::Failed => "✗",
                StepStatus::Compensated => "↩",
                StepStatus::CompensationFailed => "⚠",
            };
            lines.push(format!("{status} {}", record.name));
        }
        lines.join("\n")
    }
}
