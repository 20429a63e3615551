// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::collections::HashMap;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::command::{CommandJob, JobId};
use crate::response::CommandResult;

/// A job that has been written to the device and awaits its ACK.
#[derive(Debug)]
pub struct PendingJob {
    pub body: String,
    pub is_system: bool,
    pub sent_at: Instant,
    respond_to: oneshot::Sender<CommandResult>,
}

impl PendingJob {
    pub fn from_job(job: CommandJob, sent_at: Instant) -> (JobId, Self) {
        (
            job.id,
            Self {
                body: job.body,
                is_system: job.is_system,
                sent_at,
                respond_to: job.respond_to,
            },
        )
    }

    /// Deliver the result. Consumes the job so it can only happen once.
    ///
    /// Returns false when the caller stopped waiting.
    pub fn complete(self, result: CommandResult) -> bool {
        self.respond_to.send(result).is_ok()
    }
}

/// Jobs awaiting acknowledgement, keyed by correlation id.
#[derive(Debug, Default)]
pub struct JobTable {
    entries: HashMap<JobId, PendingJob>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: JobId, job: PendingJob) {
        self.entries.insert(id, job);
    }

    pub fn remove(&mut self, id: JobId) -> Option<PendingJob> {
        self.entries.remove(&id)
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every entry without delivering results.
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{CommandResponse, DeviceStatus};

    fn pending(id: JobId) -> (PendingJob, oneshot::Receiver<CommandResult>) {
        let (tx, rx) = oneshot::channel();
        let job = CommandJob {
            id,
            body: " 1;\n".to_string(),
            is_system: false,
            respond_to: tx,
        };
        (PendingJob::from_job(job, Instant::now()).1, rx)
    }

    #[test]
    fn test_insert_remove() {
        let mut table = JobTable::new();
        let (job, _rx) = pending(5);
        table.insert(5, job);
        assert!(table.contains(5));
        assert!(table.remove(5).is_some());
        assert!(table.remove(5).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_complete_delivers_once() {
        let (job, mut rx) = pending(1);
        assert!(job.complete(Ok(CommandResponse::synthetic(DeviceStatus::Ok))));
        let res = rx.try_recv().expect("result delivered");
        assert_eq!(res.map(|r| r.status), Ok(0));
    }

    #[test]
    fn test_clear_does_not_deliver() {
        let mut table = JobTable::new();
        let (job, mut rx) = pending(1);
        table.insert(1, job);
        assert_eq!(table.clear(), 1);
        assert!(matches!(
            rx.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
    }
}
