// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use echo_types::Submission;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Default SQ capacity (§4.1).
pub const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SqError {
    #[error("submission queue is closed")]
    Closed,
    #[error("submit cancelled")]
    Cancelled,
}

/// A bounded FIFO of [`Submission`]s.
///
/// `submit` blocks until a slot frees or the caller's cancellation token
/// fires; `receive` blocks until a submission is available or the queue is
/// closed. `close` is idempotent.
pub struct SubmissionQueue {
    tx: mpsc::Sender<Submission>,
    rx: mpsc::Receiver<Submission>,
}

impl SubmissionQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self { tx, rx }
    }

    /// A cloneable handle that can submit without owning the receiver side.
    pub fn sender(&self) -> SqSender {
        SqSender { tx: self.tx.clone() }
    }

    pub async fn receive(&mut self) -> Result<Submission, SqError> {
        self.rx.recv().await.ok_or(SqError::Closed)
    }

    /// Idempotent: closes the receiving half so all senders observe `Closed`.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

#[derive(Clone)]
pub struct SqSender {
    tx: mpsc::Sender<Submission>,
}

impl SqSender {
    pub async fn submit(&self, sub: Submission, cancel: &CancellationToken) -> Result<(), SqError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SqError::Cancelled),
            res = self.tx.send(sub) => res.map_err(|_| SqError::Closed),
        }
    }
}
