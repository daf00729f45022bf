//! Flush, commit and abort.

use super::state::{SessionState, SessionStatus};
use super::TransientSession;
use crate::change_feed::ChangeEvent;
use crate::constraint::ConstraintViolation;
use crate::error::{CoreError, CoreResult};
use std::collections::HashMap;
use tracing::{debug, warn};

impl TransientSession {
    /// Writes the pending changes to the persistent store.
    ///
    /// Listeners see the pending changes first. Then every touched entity is
    /// validated against its model; any violation is reported to listeners
    /// and returned, and the session stays open with its changes. Valid
    /// changes are applied in one persistent transaction under the store's
    /// flush lock.
    ///
    /// Flushing a read-only session or one without changes does nothing.
    pub fn flush(&self) -> CoreResult<()> {
        let pending = {
            let state = self.lock_open()?;
            if self.readonly || !state.has_changes() {
                return Ok(());
            }
            state.change_events()
        };
        self.store
            .for_all_listeners(|listener| listener.before_flush(self, &pending));

        let mut state = self.lock_open()?;
        let violations = self.validate(&state)?;
        if !violations.is_empty() {
            drop(state);
            debug!(
                session = %self.id,
                violations = violations.len(),
                "flush rejected by constraints"
            );
            self.store.stats().record_constraint_failure();
            self.store
                .for_all_listeners(|listener| listener.after_constraints_fail(self, &violations));
            return Err(CoreError::ConstraintsViolated { violations });
        }

        let changes = state.change_events();
        let applied = state.changes.len();
        {
            let _gate = self.store.flush_lock().lock();
            let mut txn = self.persistent().begin_transaction()?;
            let mut ids = HashMap::new();
            let result = state
                .changes
                .iter()
                .try_for_each(|change| change.apply(txn.as_mut(), &mut ids));
            if let Err(err) = result {
                txn.abort();
                warn!(session = %self.id, error = %err, "persistent transaction aborted");
                return Err(err.into());
            }
            txn.commit()?;

            for entity in &state.created {
                if let Some(id) = ids.get(&entity.transient_id()) {
                    entity.assign_persistent_id(*id);
                }
            }
        }
        state.clear();
        drop(state);

        self.store.stats().record_flush();
        debug!(session = %self.id, changes = applied, "session flushed");

        self.store
            .for_all_listeners(|listener| listener.flushed(self, &changes));
        if let Some(multiplexer) = self.store.events_multiplexer() {
            multiplexer.flushed(self, &changes);
        }
        Ok(())
    }

    /// Flushes and closes the session.
    ///
    /// A read-only session is just closed. On a failed flush the session
    /// stays open.
    pub fn commit(&self) -> CoreResult<()> {
        if !self.readonly {
            self.flush()?;
        }
        self.finish(SessionStatus::Committed)?;
        self.store.stats().record_session_commit();
        Ok(())
    }

    /// Discards the pending changes and closes the session.
    pub fn abort(&self) -> CoreResult<()> {
        self.finish(SessionStatus::Aborted)?;
        self.store.stats().record_session_abort();
        Ok(())
    }

    fn finish(&self, status: SessionStatus) -> CoreResult<()> {
        {
            let mut state = self.lock_open()?;
            state.clear();
            state.status = status;
        }
        self.store.unregister_session(self.id);
        debug!(session = %self.id, ?status, "session finished");
        Ok(())
    }

    /// Checks required values and constraints of every touched entity.
    fn validate(&self, state: &SessionState) -> CoreResult<Vec<ConstraintViolation>> {
        let model = self.store.model();
        let mut violations = Vec::new();

        for (key, event) in state.touched() {
            if state.removed.contains(&key) {
                continue;
            }
            let Some(entity_model) = model.get(event.entity.entity_type()) else {
                continue;
            };

            for property in entity_model.properties() {
                let value = self.read_property(state, key, property.name())?;
                if property.is_required() && value.is_none() {
                    violations.push(required(event, property.name()));
                }
                for constraint in property.property_constraints().failures(value.as_ref()) {
                    violations.push(ConstraintViolation {
                        entity: event.entity.clone(),
                        property: property.name().to_string(),
                        message: constraint.exception_message(property.name(), value.as_ref()),
                        display_message: constraint
                            .display_message(property.name(), value.as_ref()),
                    });
                }
            }

            for link in entity_model.links() {
                let spec = link.spec();
                if spec.cardinality.is_required()
                    && self
                        .read_links(state, key, spec.db_property_name())?
                        .is_empty()
                {
                    violations.push(required(event, link.property()));
                }
            }
        }
        Ok(violations)
    }
}

fn required(event: &ChangeEvent, property: &str) -> ConstraintViolation {
    ConstraintViolation {
        entity: event.entity.clone(),
        property: property.to_string(),
        message: format!("Value for {property} is required"),
        display_message: "required".to_string(),
    }
}
