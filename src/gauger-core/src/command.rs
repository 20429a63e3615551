// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::collections::VecDeque;

use tokio::sync::oneshot;

use crate::protocol::frame_command;
use crate::response::CommandResult;

/// Correlation id carried by a framed command and its ACK.
pub type JobId = u32;

/// Ids restart at 1 once this value has been handed out.
pub const MAX_JOB_ID: JobId = 2_000_000_000;

/// Monotonic job id counter.
#[derive(Debug, Clone, Default)]
pub struct JobIdAllocator {
    last: JobId,
}

impl JobIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> JobId {
        self.last = if self.last >= MAX_JOB_ID {
            1
        } else {
            self.last + 1
        };
        self.last
    }
}

/// One command waiting to be sent, plus where its result goes.
#[derive(Debug)]
pub struct CommandJob {
    pub id: JobId,
    pub body: String,
    pub is_system: bool,
    pub respond_to: oneshot::Sender<CommandResult>,
}

impl CommandJob {
    pub fn framed(&self) -> String {
        frame_command(self.id, &self.body)
    }
}

/// FIFO of jobs not yet written to the device.
#[derive(Debug, Default)]
pub struct CommandQueue {
    jobs: VecDeque<CommandJob>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, job: CommandJob) {
        self.jobs.push_back(job);
    }

    /// Jump the queue; used for the post-open handshake.
    pub fn push_front(&mut self, job: CommandJob) {
        self.jobs.push_front(job);
    }

    pub fn pop_front(&mut self) -> Option<CommandJob> {
        self.jobs.pop_front()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Drop every queued job without sending a result. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.jobs.len();
        self.jobs.clear();
        dropped
    }
}
