// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

//! Three-way reconciliation of collections and of the items they contain.

mod collections;
mod items;

pub use crate::reconcile::collections::reconcile_collections;
pub use crate::reconcile::items::{Freshness, ItemReconciler};
