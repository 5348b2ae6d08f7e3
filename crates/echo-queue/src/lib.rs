// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The Submission Queue (SQ) and Event Queue (EQ): the two channels every
//! surface of the agent funnels through.

mod eq;
mod sq;

pub use eq::EventQueue;
pub use sq::{SqError, SqSender, SubmissionQueue};
