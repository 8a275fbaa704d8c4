//! Selection session: one index snapshot, one selection, one notifier
//!
//! Mutations are serialised by a writer lock and applied under the state
//! write lock, so `resolve` never observes a half-applied selection. Change
//! events are delivered after the state lock is released, which lets
//! listeners read the session while being notified. A listener that tries to
//! mutate the session from inside its notification is rejected.

mod settings;

use std::sync::Arc;
use anyhow::Context;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};

pub use settings::SessionSettings;

use crate::data::DataLoader;
use crate::error::{Result, SelectionError};
use crate::events::{ChangeNotifier, EventHandler, FieldChanged, SelectionSubscriber, SessionId, SubscriptionId};
use crate::index::AssociationIndex;
use crate::model::{FieldId, State, ValueId};
use crate::resolver::{ResolvedField, Resolver};
use crate::selection::{SelectMode, SelectionDelta, SelectionSet};

/// One entry of the current-selections summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentSelection {
    pub field: String,
    pub values: Vec<String>,
}

/// Sequence, selections and resolved fields read under one lock
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub sequence: u64,
    pub selections: Vec<CurrentSelection>,
    pub resolved: Vec<Arc<ResolvedField>>,
}

struct SessionState {
    index: Arc<AssociationIndex>,
    selection: SelectionSet,
    /// Cached resolution per field, in load order
    resolved: Vec<Arc<ResolvedField>>,
    sequence: u64,
}

/// An isolated selection session over one data model
pub struct Session {
    id: SessionId,
    settings: SessionSettings,
    state: RwLock<SessionState>,
    /// Serialises mutations, including their notification dispatch
    writer: Mutex<()>,
    notifier: ChangeNotifier,
}

impl Session {
    pub fn new(index: AssociationIndex) -> Self {
        Self::with_settings(index, SessionSettings::default())
    }

    pub fn with_settings(index: AssociationIndex, settings: SessionSettings) -> Self {
        let index = Arc::new(index);
        let selection = SelectionSet::new();
        let resolved = resolve_all(&index, &selection, &settings);
        let id = uuid::Uuid::new_v4();
        debug!(session = %id, fields = resolved.len(), "session created");

        Self {
            id,
            settings,
            state: RwLock::new(SessionState {
                index,
                selection,
                resolved,
                sequence: 0,
            }),
            writer: Mutex::new(()),
            notifier: ChangeNotifier::new(),
        }
    }

    /// A session with no data loaded yet
    pub fn empty() -> Self {
        Self::new(AssociationIndex::empty())
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Number of mutations that changed the selection or the data
    pub fn sequence(&self) -> u64 {
        self.state.read().sequence
    }

    /// The current index snapshot
    pub fn index(&self) -> Arc<AssociationIndex> {
        self.state.read().index.clone()
    }

    /// A copy of the current selection
    pub fn selection(&self) -> SelectionSet {
        self.state.read().selection.clone()
    }

    // ---- Mutations ----

    /// Select values of `field` by text
    pub fn select<S: AsRef<str>>(&self, field: &str, values: &[S], mode: SelectMode) -> Result<SelectionDelta> {
        self.mutate(|index, selection| {
            let field_id = lookup_field(index, field)?;
            let ids = values
                .iter()
                .map(|text| {
                    index
                        .value_id(field_id, text.as_ref())
                        .ok_or_else(|| SelectionError::InvalidValue {
                            field: field.to_string(),
                            value: text.as_ref().to_string(),
                        })
                })
                .collect::<Result<Vec<_>>>()?;
            selection.select(index, field_id, &ids, mode)
        })
    }

    /// Select values by id
    pub fn select_ids(&self, field: FieldId, values: &[ValueId], mode: SelectMode) -> Result<SelectionDelta> {
        self.mutate(|index, selection| selection.select(index, field, values, mode))
    }

    pub fn clear(&self, field: &str) -> Result<SelectionDelta> {
        self.mutate(|index, selection| {
            let field_id = lookup_field(index, field)?;
            Ok(selection.clear(field_id))
        })
    }

    pub fn clear_all(&self) -> Result<SelectionDelta> {
        self.mutate(|_, selection| Ok(selection.clear_all()))
    }

    /// Select every value of `field`
    pub fn select_all(&self, field: &str) -> Result<SelectionDelta> {
        self.select_by_state(field, |_| true)
    }

    /// Select every value of `field` reachable under the other fields' selections
    pub fn select_possible(&self, field: &str) -> Result<SelectionDelta> {
        self.select_by_state(field, State::is_reachable)
    }

    /// Select the alternative values of `field` in place of its current selection
    pub fn select_alternative(&self, field: &str) -> Result<SelectionDelta> {
        self.select_by_state(field, |state| state == State::Alternative)
    }

    /// Select the excluded values of `field` in place of its current selection
    pub fn select_excluded(&self, field: &str) -> Result<SelectionDelta> {
        self.select_by_state(field, |state| state == State::Excluded)
    }

    /// Swap in a reloaded index. Every field is notified.
    pub fn reload(&self, index: AssociationIndex) -> Result<()> {
        self.guard_reentrancy()?;
        let _writer = self.writer.lock();

        let events = {
            let mut state = self.state.write();
            let index = Arc::new(index);
            let selection = if self.settings.retain_selections_on_reload {
                state.selection.remap(&state.index, &index)
            } else {
                SelectionSet::new()
            };
            let resolved = resolve_all(&index, &selection, &self.settings);

            state.sequence += 1;
            state.index = index;
            state.selection = selection;
            state.resolved = resolved;

            info!(
                session = %self.id,
                fields = state.index.field_count(),
                records = state.index.record_count(),
                retained = state.selection.active_fields().len(),
                "index reloaded"
            );
            self.events_for(state.sequence, state.resolved.iter())
        };

        self.notifier.dispatch(&events);
        Ok(())
    }

    /// Load data through `loader` and swap it in
    pub async fn load_from(&self, loader: &dyn DataLoader) -> anyhow::Result<()> {
        let index = loader
            .load()
            .await
            .with_context(|| format!("failed to load '{}'", loader.source_name()))?;
        info!(session = %self.id, source = loader.source_name(), "data loaded");
        self.reload(index)?;
        Ok(())
    }

    // ---- Reads ----

    /// Current states of every value of `field`, in load order
    pub fn resolve(&self, field: &str) -> Result<Arc<ResolvedField>> {
        let state = self.state.read();
        let id = lookup_field(&state.index, field)?;
        cached(&state, id)
    }

    pub fn resolve_id(&self, field: FieldId) -> Result<Arc<ResolvedField>> {
        cached(&self.state.read(), field)
    }

    pub fn resolve_all(&self) -> Vec<Arc<ResolvedField>> {
        self.state.read().resolved.clone()
    }

    /// Names of fields with a selection, most recently modified first
    pub fn active_fields(&self) -> Vec<String> {
        let state = self.state.read();
        state
            .selection
            .active_fields()
            .iter()
            .filter_map(|id| state.index.field(*id))
            .map(|field| field.name.to_string())
            .collect()
    }

    /// Selected value texts per active field, most recently modified first
    pub fn current_selections(&self) -> Vec<CurrentSelection> {
        current_selections(&self.state.read())
    }

    /// Everything a view needs, consistent with a single sequence number
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read();
        SessionSnapshot {
            sequence: state.sequence,
            selections: current_selections(&state),
            resolved: state.resolved.clone(),
        }
    }

    // ---- Subscriptions ----

    pub fn subscribe(&self, handler: Box<dyn EventHandler>) -> SubscriptionId {
        self.notifier.subscribe(handler)
    }

    pub fn subscribe_fn<F>(&self, f: F) -> SubscriptionId
    where
        F: FnMut(&FieldChanged) + Send + 'static,
    {
        self.notifier.subscribe_fn(f)
    }

    pub fn add_subscriber(&self, subscriber: Arc<dyn SelectionSubscriber>) -> SubscriptionId {
        self.notifier.add_subscriber(subscriber)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.notifier.unsubscribe(id);
    }

    // ---- Internals ----

    fn select_by_state<P>(&self, field: &str, keep: P) -> Result<SelectionDelta>
    where
        P: Fn(State) -> bool,
    {
        self.mutate(|index, selection| {
            let field_id = lookup_field(index, field)?;
            let resolved = Resolver::with_settings(index, selection, self.settings.resolver).resolve(field_id)?;
            let ids: Vec<ValueId> = resolved
                .values
                .iter()
                .filter(|v| keep(v.state))
                .map(|v| v.value)
                .collect();
            selection.select(index, field_id, &ids, SelectMode::Replace)
        })
    }

    fn guard_reentrancy(&self) -> Result<()> {
        if self.notifier.is_dispatching_on_current_thread() {
            warn!(session = %self.id, "rejected selection change from inside a change notification");
            return Err(SelectionError::ReentrantMutation);
        }
        Ok(())
    }

    /// Apply `op` to the selection, re-resolve, and notify changed fields
    fn mutate<F>(&self, op: F) -> Result<SelectionDelta>
    where
        F: FnOnce(&AssociationIndex, &mut SelectionSet) -> Result<SelectionDelta>,
    {
        self.guard_reentrancy()?;
        let _writer = self.writer.lock();

        let (delta, events) = {
            let mut guard = self.state.write();
            let state = &mut *guard;
            let delta = op(&*state.index, &mut state.selection)?;
            if delta.is_empty() {
                return Ok(delta);
            }

            let fresh = resolve_all(&state.index, &state.selection, &self.settings);
            let mut changed = Vec::new();
            let resolved: Vec<Arc<ResolvedField>> = fresh
                .into_iter()
                .enumerate()
                .map(|(idx, field)| match state.resolved.get(idx) {
                    Some(previous) if previous.same_states(&field) => previous.clone(),
                    _ => {
                        changed.push(idx);
                        field
                    }
                })
                .collect();

            state.sequence += 1;
            state.resolved = resolved;
            debug!(
                session = %self.id,
                sequence = state.sequence,
                changed = changed.len(),
                "selection changed"
            );

            let events = self.events_for(state.sequence, changed.iter().filter_map(|idx| state.resolved.get(*idx)));
            (delta, events)
        };

        self.notifier.dispatch(&events);
        Ok(delta)
    }

    fn events_for<'a, I>(&self, sequence: u64, fields: I) -> Vec<FieldChanged>
    where
        I: Iterator<Item = &'a Arc<ResolvedField>>,
    {
        fields
            .map(|resolved| FieldChanged {
                session: self.id,
                sequence,
                field: resolved.field,
                resolved: resolved.clone(),
            })
            .collect()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("sequence", &self.sequence())
            .finish()
    }
}

fn lookup_field(index: &AssociationIndex, name: &str) -> Result<FieldId> {
    index
        .field_id(name)
        .ok_or_else(|| SelectionError::UnknownField(name.to_string()))
}

fn current_selections(state: &SessionState) -> Vec<CurrentSelection> {
    state
        .selection
        .active_fields()
        .iter()
        .filter_map(|id| {
            let field = state.index.field(*id)?;
            let values = state
                .selection
                .selected(*id)
                .filter_map(|value| field.value(value))
                .map(|value| value.text.to_string())
                .collect();
            Some(CurrentSelection {
                field: field.name.to_string(),
                values,
            })
        })
        .collect()
}

fn cached(state: &SessionState, field: FieldId) -> Result<Arc<ResolvedField>> {
    state
        .resolved
        .get(field.index())
        .cloned()
        .ok_or_else(|| SelectionError::UnknownField(field.to_string()))
}

fn resolve_all(index: &AssociationIndex, selection: &SelectionSet, settings: &SessionSettings) -> Vec<Arc<ResolvedField>> {
    Resolver::with_settings(index, selection, settings.resolver)
        .resolve_all()
        .into_iter()
        .map(Arc::new)
        .collect()
}
