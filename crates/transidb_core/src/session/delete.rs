//! Entity deletion with on-delete policies.

use super::state::{Change, SessionState};
use super::TransientSession;
use crate::entity::{EntityKey, TransientEntity};
use crate::error::{CoreError, CoreResult};
use crate::link::OnDeletePolicy;
use crate::model::EntityTypeModel;
use std::collections::{HashSet, VecDeque};
use tracing::trace;

/// A `Fail` policy that found linked entities.
struct Restriction {
    entity: TransientEntity,
    property: String,
    blockers: Vec<EntityKey>,
}

impl TransientSession {
    /// Deletes an entity and applies the on-delete policies of every link
    /// touching it.
    ///
    /// Links declared on the entity's type apply their `on_delete` policy to
    /// the linked entities. Links declared on other types that point at this
    /// type apply their `on_target_delete` policy to the entities pointing
    /// here. Cascades are followed transitively. All links of the deleted
    /// entities are removed on both ends.
    ///
    /// # Errors
    ///
    /// Fails with `DeleteRestricted`, leaving the session unchanged, if a
    /// `Fail` policy finds an entity that is not deleted as well.
    pub fn delete_entity(&self, entity: &TransientEntity) -> CoreResult<()> {
        let mut state = self.lock_writable()?;
        let entity = self.attach(&state, entity)?;
        let doomed = self.plan_delete(&state, entity)?;
        for victim in &doomed {
            self.remove_entity(&mut state, victim)?;
        }
        Ok(())
    }

    /// Collects the entity and everything its cascades reach.
    fn plan_delete(
        &self,
        state: &SessionState,
        entity: TransientEntity,
    ) -> CoreResult<Vec<TransientEntity>> {
        let model = self.store.model();
        let mut doomed = Vec::new();
        let mut seen = HashSet::from([entity.key()]);
        let mut queue = VecDeque::from([entity]);
        let mut restrictions = Vec::new();

        while let Some(victim) = queue.pop_front() {
            let owner = model.get(victim.entity_type());
            let mut reached = Vec::new();

            for link in owner.map(EntityTypeModel::links).unwrap_or_default() {
                let targets = self.read_links(state, victim.key(), link.spec().db_property_name())?;
                match link.spec().on_delete {
                    OnDeletePolicy::Cascade => reached.extend(targets),
                    OnDeletePolicy::Fail if !targets.is_empty() => restrictions.push(Restriction {
                        entity: victim.clone(),
                        property: link.property().to_string(),
                        blockers: targets,
                    }),
                    OnDeletePolicy::Fail | OnDeletePolicy::Clear => {}
                }
            }

            for (_, incoming) in model.links_targeting(victim.entity_type()) {
                let sources = self.read_links(state, victim.key(), incoming.opposite_db_name(model))?;
                match incoming.spec().on_target_delete {
                    OnDeletePolicy::Cascade => reached.extend(sources),
                    OnDeletePolicy::Fail if !sources.is_empty() => restrictions.push(Restriction {
                        entity: victim.clone(),
                        property: incoming.property().to_string(),
                        blockers: sources,
                    }),
                    OnDeletePolicy::Fail | OnDeletePolicy::Clear => {}
                }
            }

            for key in reached {
                if !state.removed.contains(&key) && seen.insert(key) {
                    queue.push_back(self.handle(state, key)?);
                }
            }
            doomed.push(victim);
        }

        if let Some(restriction) = restrictions
            .iter()
            .find(|r| r.blockers.iter().any(|b| !seen.contains(b)))
        {
            return Err(CoreError::DeleteRestricted {
                entity: restriction.entity.to_string(),
                property: restriction.property.clone(),
            });
        }
        Ok(doomed)
    }

    fn remove_entity(&self, state: &mut SessionState, victim: &TransientEntity) -> CoreResult<()> {
        let model = self.store.model();
        let owner = model.get(victim.entity_type());

        let mut pairs: Vec<(String, String)> = Vec::new();
        for link in owner.map(EntityTypeModel::links).unwrap_or_default() {
            pairs.push((
                link.spec().db_property_name().to_string(),
                link.opposite_db_name(model).to_string(),
            ));
        }
        for (_, incoming) in model.links_targeting(victim.entity_type()) {
            pairs.push((
                incoming.opposite_db_name(model).to_string(),
                incoming.spec().db_property_name().to_string(),
            ));
        }
        pairs.sort();
        pairs.dedup();

        for (ours, theirs) in &pairs {
            for target in self.read_links(state, victim.key(), ours)? {
                if state.removed.contains(&target) {
                    continue;
                }
                let target = self.handle(state, target)?;
                self.link_delete(state, &target, theirs, victim)?;
            }
            self.links_clear(state, victim, ours)?;
        }

        state.removed.insert(victim.key());
        state.changes.push(Change::DeleteEntity {
            entity: victim.key(),
        });
        state.touch_removed(victim);
        trace!(session = %self.id, entity = %victim, "entity deleted");
        Ok(())
    }
}
