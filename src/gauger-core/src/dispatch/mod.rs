// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Single-flight command dispatch.
//!
//! The [`Dispatcher`] owns the command queue, the table of jobs awaiting an
//! ACK and the flight state. It performs no I/O: the caller asks it for the
//! next frame to write and reports results back.

pub mod machine;
pub mod table;

pub use machine::{DispatchStep, Dispatcher, Flight};
pub use table::{JobTable, PendingJob};
