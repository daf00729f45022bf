//! Bidirectional association primitives.
//!
//! Link delegates express every association change through the four public
//! primitives here. Each one updates both ends so that a link and its
//! opposite always agree within the session.

use super::state::{Change, SessionState};
use super::TransientSession;
use crate::entity::{EntityKey, TransientEntity};
use crate::error::CoreResult;

impl TransientSession {
    /// Makes `child` a child of `parent`.
    ///
    /// The child leaves the collection of its previous parent, if it had a
    /// different one.
    pub fn add_child(
        &self,
        parent: &TransientEntity,
        parent_to_child: &str,
        child_to_parent: &str,
        child: &TransientEntity,
    ) -> CoreResult<()> {
        let mut state = self.lock_writable()?;
        let parent = self.attach(&state, parent)?;
        let child = self.attach(&state, child)?;

        let old = self.read_link(&state, child.key(), child_to_parent)?;
        if let Some(old) = old.filter(|old| *old != parent.key()) {
            let old = self.handle(&state, old)?;
            self.link_delete(&mut state, &old, parent_to_child, &child)?;
        }
        self.link_set(&mut state, &child, child_to_parent, &parent)?;
        self.link_add(&mut state, &parent, parent_to_child, &child)
    }

    /// Removes `child` from `parent` on both ends.
    pub fn remove_child(
        &self,
        parent: &TransientEntity,
        parent_to_child: &str,
        child_to_parent: &str,
        child: &TransientEntity,
    ) -> CoreResult<()> {
        let mut state = self.lock_writable()?;
        let parent = self.attach(&state, parent)?;
        let child = self.attach(&state, child)?;

        self.link_delete(&mut state, &parent, parent_to_child, &child)?;
        if self.points_at(&state, &child, child_to_parent, &parent)? {
            self.links_clear(&mut state, &child, child_to_parent)?;
        }
        Ok(())
    }

    /// Points the to-one link of `many` at `one` and adds `many` to the
    /// collection of `one`.
    ///
    /// `many` leaves the collection of its previous owner.
    pub fn set_many_to_one(
        &self,
        many: &TransientEntity,
        many_to_one: &str,
        one_to_many: &str,
        one: &TransientEntity,
    ) -> CoreResult<()> {
        let mut state = self.lock_writable()?;
        let many = self.attach(&state, many)?;
        let one = self.attach(&state, one)?;

        let old = self.read_link(&state, many.key(), many_to_one)?;
        if let Some(old) = old.filter(|old| *old != one.key()) {
            let old = self.handle(&state, old)?;
            self.link_delete(&mut state, &old, one_to_many, &many)?;
        }
        self.link_set(&mut state, &many, many_to_one, &one)?;
        self.link_add(&mut state, &one, one_to_many, &many)
    }

    /// Removes `many` from the collection of `one` and clears its to-one
    /// link if it pointed at `one`.
    pub fn remove_one_to_many(
        &self,
        one: &TransientEntity,
        one_to_many: &str,
        many_to_one: &str,
        many: &TransientEntity,
    ) -> CoreResult<()> {
        let mut state = self.lock_writable()?;
        let one = self.attach(&state, one)?;
        let many = self.attach(&state, many)?;

        self.link_delete(&mut state, &one, one_to_many, &many)?;
        if self.points_at(&state, &many, many_to_one, &one)? {
            self.links_clear(&mut state, &many, many_to_one)?;
        }
        Ok(())
    }

    fn points_at(
        &self,
        state: &SessionState,
        entity: &TransientEntity,
        name: &str,
        target: &TransientEntity,
    ) -> CoreResult<bool> {
        Ok(self.read_link(state, entity.key(), name)? == Some(target.key()))
    }

    fn store_links(state: &mut SessionState, entity: EntityKey, name: &str, targets: Vec<EntityKey>) {
        state
            .links
            .entry(entity)
            .or_default()
            .insert(name.to_string(), targets);
    }

    pub(super) fn link_add(
        &self,
        state: &mut SessionState,
        entity: &TransientEntity,
        name: &str,
        target: &TransientEntity,
    ) -> CoreResult<()> {
        let mut targets = self.read_links(state, entity.key(), name)?;
        if targets.contains(&target.key()) {
            return Ok(());
        }
        targets.push(target.key());
        Self::store_links(state, entity.key(), name, targets);
        state.changes.push(Change::AddLink {
            entity: entity.key(),
            name: name.to_string(),
            target: target.key(),
        });
        state.touch_link(entity, name);
        Ok(())
    }

    /// Returns `true` if the link existed.
    pub(super) fn link_delete(
        &self,
        state: &mut SessionState,
        entity: &TransientEntity,
        name: &str,
        target: &TransientEntity,
    ) -> CoreResult<bool> {
        let mut targets = self.read_links(state, entity.key(), name)?;
        let Some(position) = targets.iter().position(|t| *t == target.key()) else {
            return Ok(false);
        };
        targets.remove(position);
        Self::store_links(state, entity.key(), name, targets);
        state.changes.push(Change::DeleteLink {
            entity: entity.key(),
            name: name.to_string(),
            target: target.key(),
        });
        state.touch_link(entity, name);
        Ok(true)
    }

    fn link_set(
        &self,
        state: &mut SessionState,
        entity: &TransientEntity,
        name: &str,
        target: &TransientEntity,
    ) -> CoreResult<()> {
        let current = self.read_links(state, entity.key(), name)?;
        if current == [target.key()] {
            return Ok(());
        }
        Self::store_links(state, entity.key(), name, vec![target.key()]);
        state.changes.push(Change::SetLink {
            entity: entity.key(),
            name: name.to_string(),
            target: target.key(),
        });
        state.touch_link(entity, name);
        Ok(())
    }

    pub(super) fn links_clear(
        &self,
        state: &mut SessionState,
        entity: &TransientEntity,
        name: &str,
    ) -> CoreResult<()> {
        if self.read_links(state, entity.key(), name)?.is_empty() {
            return Ok(());
        }
        Self::store_links(state, entity.key(), name, Vec::new());
        state.changes.push(Change::DeleteLinks {
            entity: entity.key(),
            name: name.to_string(),
        });
        state.touch_link(entity, name);
        Ok(())
    }
}
