// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

//! End-to-end workflow tests for the groupsync-core crate.
//!
//! These tests run whole passes against a scripted remote store and an
//! in-memory local store, across several passes where the behaviour depends
//! on state carried from one pass to the next.

mod concurrency;
mod failures;
mod idempotence;
mod pull;
