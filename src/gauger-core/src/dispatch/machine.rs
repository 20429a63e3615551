// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::command::{CommandJob, CommandQueue, JobId, JobIdAllocator};
use crate::response::{CommandResponse, CommandResult, DeviceStatus, GaugerError};

use super::table::{JobTable, PendingJob};

/// Whether a command is currently on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flight {
    Idle,
    AwaitingAck { id: JobId, deadline: Instant },
}

/// What the dispatch loop should do on this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchStep {
    /// A command is outstanding.
    Busy,
    /// Nothing queued.
    Empty,
    /// Write `frame` to the device; the job is already registered.
    Send { id: JobId, frame: String },
}

/// Queue, job table and flight state of one gauger connection.
///
/// Invariant: the job table holds an entry iff the flight state is
/// `AwaitingAck` for that id, so at most one command is ever unacknowledged.
#[derive(Debug)]
pub struct Dispatcher {
    ids: JobIdAllocator,
    queue: CommandQueue,
    table: JobTable,
    flight: Flight,
    command_timeout: Duration,
}

impl Dispatcher {
    pub fn new(command_timeout: Duration) -> Self {
        Self {
            ids: JobIdAllocator::new(),
            queue: CommandQueue::new(),
            table: JobTable::new(),
            flight: Flight::Idle,
            command_timeout,
        }
    }

    pub fn flight(&self) -> Flight {
        self.flight
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.flight, Flight::AwaitingAck { .. })
    }

    pub fn outstanding(&self) -> Option<JobId> {
        match self.flight {
            Flight::AwaitingAck { id, .. } => Some(id),
            Flight::Idle => None,
        }
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn pending(&self) -> usize {
        self.table.len()
    }

    /// Append a command to the tail of the queue.
    pub fn enqueue(
        &mut self,
        body: impl Into<String>,
        is_system: bool,
    ) -> (JobId, oneshot::Receiver<CommandResult>) {
        let (job, rx) = self.new_job(body.into(), is_system);
        let id = job.id;
        debug!("Enqueuing gauger command {}", job.framed().trim());
        self.queue.push_back(job);
        (id, rx)
    }

    /// Put a command at the head of the queue.
    pub fn enqueue_front(
        &mut self,
        body: impl Into<String>,
        is_system: bool,
    ) -> (JobId, oneshot::Receiver<CommandResult>) {
        let (job, rx) = self.new_job(body.into(), is_system);
        let id = job.id;
        debug!("Enqueuing gauger command {} at head", job.framed().trim());
        self.queue.push_front(job);
        (id, rx)
    }

    fn new_job(
        &mut self,
        body: String,
        is_system: bool,
    ) -> (CommandJob, oneshot::Receiver<CommandResult>) {
        let (tx, rx) = oneshot::channel();
        let job = CommandJob {
            id: self.ids.next_id(),
            body,
            is_system,
            respond_to: tx,
        };
        (job, rx)
    }

    /// One dispatch tick: expire an overdue job, then take the next one if idle.
    pub fn poll(&mut self, now: Instant) -> DispatchStep {
        self.expire(now);

        if self.is_busy() {
            return DispatchStep::Busy;
        }

        let Some(job) = self.queue.pop_front() else {
            return DispatchStep::Empty;
        };

        let frame = job.framed();
        let (id, pending) = PendingJob::from_job(job, now);
        self.table.insert(id, pending);
        self.flight = Flight::AwaitingAck {
            id,
            deadline: now + self.command_timeout,
        };
        DispatchStep::Send { id, frame }
    }

    /// Complete the outstanding job with a synthesized timeout if its deadline passed.
    pub fn expire(&mut self, now: Instant) -> Option<JobId> {
        let Flight::AwaitingAck { id, deadline } = self.flight else {
            return None;
        };
        if now < deadline {
            return None;
        }
        warn!(
            "Gauger job {} timed out after {:?}",
            id, self.command_timeout
        );
        self.complete(
            id,
            Ok(CommandResponse::synthetic(DeviceStatus::CommandTimeout)),
        );
        Some(id)
    }

    /// Deliver a result for `id`.
    ///
    /// Returns false when no such job is pending; the flight state is left
    /// alone in that case.
    pub fn complete(&mut self, id: JobId, result: CommandResult) -> bool {
        let Some(job) = self.table.remove(id) else {
            return false;
        };
        if let Flight::AwaitingAck { id: current, .. } = self.flight {
            if current == id {
                self.flight = Flight::Idle;
            }
        }
        debug!(
            "Gauger job {} ({}) answered after {:?}",
            id,
            job.body.trim(),
            job.sent_at.elapsed()
        );
        let is_system = job.is_system;
        if !job.complete(result) && !is_system {
            debug!("Gauger job {} completed but nobody is waiting", id);
        }
        true
    }

    /// Fail the outstanding job, e.g. after a write error.
    pub fn fail_outstanding(&mut self, error: GaugerError) -> Option<JobId> {
        let id = self.outstanding()?;
        self.complete(id, Err(error));
        Some(id)
    }

    /// Drop every queued and outstanding job without delivering results.
    ///
    /// Waiting callers observe the dropped sender.
    pub fn abandon_all(&mut self) -> usize {
        let dropped = self.queue.clear() + self.table.clear();
        self.flight = Flight::Idle;
        dropped
    }
}
