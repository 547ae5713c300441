// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

//! Scriptable in-memory groupware server for integration tests.
//!
//! Holds collections and items the way the real server would, assigns
//! secondary and canonical identifiers on create, and lets tests inject
//! failures per operation, pause an operation, and inspect the calls made.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use jiff::Timestamp;
use tokio::sync::Notify;

use groupsync_core::{
    CollectionKind, ItemPayload, RemoteCollection, RemoteError, RemoteItem, RemoteStore, Window,
    to_local_range,
};

/// Remote operations, used to script failures and count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Login,
    ListCollections,
    ListItems,
    Create,
    Update,
    Delete,
    Resolve,
}

/// Pauses an operation until the test releases it.
#[derive(Debug, Default)]
pub struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    /// Waits until the paused operation has been reached.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Lets the paused operation continue.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[derive(Debug, Default)]
struct State {
    collections: Vec<RemoteCollection>,
    /// Items keyed by canonical id.
    items: BTreeMap<String, RemoteItem>,
    next_id: u64,
    clock_ms: i64,
    queued_ids: VecDeque<(String, String)>,
    failures: HashMap<Op, VecDeque<RemoteError>>,
    gates: HashMap<Op, Arc<Gate>>,
    calls: Vec<Op>,
    updates: Vec<(String, ItemPayload)>,
}

#[derive(Debug)]
pub struct ScriptedRemote {
    state: Mutex<State>,
}

impl Default for ScriptedRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(dead_code)]
impl ScriptedRemote {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                clock_ms: 1_735_689_600_000, // 2025-01-01T00:00:00Z
                ..Default::default()
            }),
        }
    }

    pub fn add_collection(&self, id: &str, name: &str, read_only: bool, kind: CollectionKind) {
        self.lock().collections.push(RemoteCollection {
            id: id.to_string(),
            display_name: name.to_string(),
            owner: "owner@example.com".to_string(),
            read_only,
            kind,
        });
    }

    pub fn set_collection(&self, collection: RemoteCollection) {
        let mut state = self.lock();
        state.collections.retain(|c| c.id != collection.id);
        state.collections.push(collection);
    }

    pub fn remove_collection(&self, id: &str) {
        self.lock().collections.retain(|c| c.id != id);
    }

    /// Stores an item as if created by another client.
    pub fn put_item(&self, item: RemoteItem) {
        let key = item.canonical_id.clone().unwrap_or_default();
        self.lock().items.insert(key, item);
    }

    /// Deletes an item as if deleted by another client.
    pub fn remove_item(&self, canonical: &str) -> Option<RemoteItem> {
        self.lock().items.remove(canonical)
    }

    /// Edits an item as if edited by another client, bumping its modification time.
    pub fn edit_item(&self, canonical: &str, edit: impl FnOnce(&mut RemoteItem)) {
        let mut state = self.lock();
        let modified = state.tick();
        if let Some(item) = state.items.get_mut(canonical) {
            edit(item);
            item.last_modified = Some(modified);
        }
    }

    pub fn item(&self, canonical: &str) -> Option<RemoteItem> {
        self.lock().items.get(canonical).cloned()
    }

    pub fn items_in(&self, collection_id: &str) -> Vec<RemoteItem> {
        self.lock()
            .items
            .values()
            .filter(|i| i.collection_id == collection_id)
            .cloned()
            .collect()
    }

    /// Identifiers handed out by the next create, instead of generated ones.
    pub fn queue_ids(&self, secondary: &str, canonical: &str) {
        self.lock()
            .queued_ids
            .push_back((secondary.to_string(), canonical.to_string()));
    }

    /// Makes the next call of `op` fail with `err`. Failures queue up.
    pub fn fail_next(&self, op: Op, err: RemoteError) {
        self.lock().failures.entry(op).or_default().push_back(err);
    }

    /// Pauses the next call of `op` until the returned gate is released.
    pub fn pause_next(&self, op: Op) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.lock().gates.insert(op, gate.clone());
        gate
    }

    pub fn calls(&self, op: Op) -> usize {
        self.lock().calls.iter().filter(|c| **c == op).count()
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.len()
    }

    /// Payloads sent by update calls, in order.
    pub fn updates(&self) -> Vec<(String, ItemPayload)> {
        self.lock().updates.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("remote state poisoned")
    }

    async fn enter(&self, op: Op) -> Result<(), RemoteError> {
        let gate = {
            let mut state = self.lock();
            state.calls.push(op);
            state.gates.remove(&op)
        };
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let mut state = self.lock();
        match state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl State {
    fn tick(&mut self) -> Timestamp {
        self.clock_ms += 1_000;
        Timestamp::from_millisecond(self.clock_ms).expect("valid test clock")
    }
}

#[async_trait]
impl RemoteStore for ScriptedRemote {
    async fn login(&self) -> Result<(), RemoteError> {
        self.enter(Op::Login).await
    }

    async fn list_collections(&self) -> Result<Vec<RemoteCollection>, RemoteError> {
        self.enter(Op::ListCollections).await?;
        Ok(self.lock().collections.clone())
    }

    async fn list_items(
        &self,
        collection_id: &str,
        window: &Window,
    ) -> Result<Vec<RemoteItem>, RemoteError> {
        self.enter(Op::ListItems).await?;
        let state = self.lock();
        Ok(state
            .items
            .values()
            .filter(|i| i.collection_id == collection_id)
            .filter(|i| match &i.range {
                Some(range) => to_local_range(range).is_ok_and(|r| window.contains(&r)),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn create_item(
        &self,
        collection_id: &str,
        payload: &ItemPayload,
    ) -> Result<String, RemoteError> {
        self.enter(Op::Create).await?;
        let mut state = self.lock();
        if !state.collections.iter().any(|c| c.id == collection_id) {
            return Err(RemoteError::NotFound(collection_id.to_string()));
        }

        state.next_id += 1;
        let n = state.next_id;
        let (secondary, canonical) = state
            .queued_ids
            .pop_front()
            .unwrap_or_else(|| (format!("E{n}"), format!("keriostorage://occurrence/{n}")));
        let modified = state.tick();
        state.items.insert(
            canonical.clone(),
            RemoteItem {
                canonical_id: Some(canonical),
                secondary_id: Some(secondary.clone()),
                collection_id: collection_id.to_string(),
                fields: payload.fields.clone(),
                last_modified: Some(modified),
                range: payload.range,
            },
        );
        Ok(secondary)
    }

    async fn update_item(&self, canonical_id: &str, payload: &ItemPayload) -> Result<(), RemoteError> {
        self.enter(Op::Update).await?;
        let mut state = self.lock();
        let modified = state.tick();
        let item = state
            .items
            .get_mut(canonical_id)
            .ok_or_else(|| RemoteError::NotFound(canonical_id.to_string()))?;
        item.fields = payload.fields.clone();
        item.range = payload.range;
        item.last_modified = Some(modified);
        state.updates.push((canonical_id.to_string(), payload.clone()));
        Ok(())
    }

    async fn delete_item(&self, canonical_id: &str) -> Result<(), RemoteError> {
        self.enter(Op::Delete).await?;
        self.lock()
            .items
            .remove(canonical_id)
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound(canonical_id.to_string()))
    }

    async fn resolve_canonical_id(
        &self,
        collection_id: &str,
        secondary_id: &str,
        approx_start: Option<Timestamp>,
    ) -> Result<Option<String>, RemoteError> {
        self.enter(Op::Resolve).await?;
        let state = self.lock();
        Ok(state
            .items
            .values()
            .filter(|i| i.collection_id == collection_id)
            .filter(|i| i.secondary_id.as_deref() == Some(secondary_id))
            .find(|i| match (approx_start, i.range.as_ref()) {
                (Some(start), Some(range)) => range
                    .approx_start()
                    .is_ok_and(|s| s.as_millisecond() == start.as_millisecond()),
                _ => true,
            })
            .and_then(|i| i.canonical_id.clone()))
    }
}
