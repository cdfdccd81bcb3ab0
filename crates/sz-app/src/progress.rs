use std::ops::ControlFlow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStage {
    Reconciling,
    Completed,
    Cancelled,
}

/// Emitted after every chunk of a commit.
#[derive(Debug, Clone)]
pub struct CommitProgressEvent {
    pub stage: CommitStage,
    pub rows_processed: usize,
    pub rows_total: usize,
    pub inserted: usize,
    pub updated: usize,
    pub errors: usize,
}

impl CommitProgressEvent {
    pub fn fraction_complete(&self) -> f64 {
        if self.rows_total == 0 {
            1.0
        } else {
            self.rows_processed as f64 / self.rows_total as f64
        }
    }
}

/// Progress callback; `ControlFlow::Break` abandons the commit after the
/// current chunk.
pub type CommitProgress<'a> = &'a mut dyn FnMut(&CommitProgressEvent) -> ControlFlow<()>;
