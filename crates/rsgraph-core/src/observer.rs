//! # Update Observers
//!
//! The observer protocol for scene mutations.
//!
//! Every mutating operation on a [`Scene`](crate::scene::Scene) ends
//! with a synchronous notification round: each attached observer
//! receives the operation's parameters plus the boolean outcome, in
//! attachment order, on the caller's thread. Rejected operations are
//! reported too unless the scene is configured otherwise, so an
//! observer can count attempts as well as effects.
//!
//! Observers must not call back into the scene from within a callback.

use crate::pose::{Covariance6, Pose};
use crate::time::TimeStamp;
use crate::types::{Attribute, Id, Shape};

// =============================================================================
// OBSERVER TRAIT
// =============================================================================

/// Callbacks for scene mutations, one per operation kind.
///
/// All methods default to no-ops; implement the subset of interest.
/// `success` reports whether the operation was applied.
#[allow(unused_variables)]
pub trait UpdateObserver: Send {
    fn on_add_node(&mut self, parent: Id, id: Id, attributes: &[Attribute], success: bool) {}

    fn on_add_group(&mut self, parent: Id, id: Id, attributes: &[Attribute], success: bool) {}

    fn on_add_transform_node(
        &mut self,
        parent: Id,
        id: Id,
        attributes: &[Attribute],
        pose: &Pose,
        stamp: TimeStamp,
        success: bool,
    ) {
    }

    fn on_add_uncertain_transform_node(
        &mut self,
        parent: Id,
        id: Id,
        attributes: &[Attribute],
        pose: &Pose,
        covariance: &Covariance6,
        stamp: TimeStamp,
        success: bool,
    ) {
    }

    fn on_add_geometric_node(
        &mut self,
        parent: Id,
        id: Id,
        attributes: &[Attribute],
        shape: &Shape,
        stamp: TimeStamp,
        success: bool,
    ) {
    }

    fn on_add_remote_root_node(&mut self, id: Id, attributes: &[Attribute], success: bool) {}

    fn on_add_connection(
        &mut self,
        parent: Id,
        id: Id,
        attributes: &[Attribute],
        sources: &[Id],
        targets: &[Id],
        start: TimeStamp,
        end: TimeStamp,
        success: bool,
    ) {
    }

    fn on_set_node_attributes(
        &mut self,
        id: Id,
        attributes: &[Attribute],
        stamp: TimeStamp,
        success: bool,
    ) {
    }

    fn on_set_transform(&mut self, id: Id, pose: &Pose, stamp: TimeStamp, success: bool) {}

    fn on_set_uncertain_transform(
        &mut self,
        id: Id,
        pose: &Pose,
        covariance: &Covariance6,
        stamp: TimeStamp,
        success: bool,
    ) {
    }

    fn on_add_parent(&mut self, id: Id, parent: Id, success: bool) {}

    fn on_remove_parent(&mut self, id: Id, parent: Id, success: bool) {}

    fn on_delete_node(&mut self, id: Id, success: bool) {}
}

// =============================================================================
// UPDATE RECORDER
// =============================================================================

/// Observer that counts every callback, per operation kind.
///
/// Counts attempts, not effects: with notify-on-failure enabled a
/// rejected update still increments its counter. Comparing recorders
/// attached to an origin and a replica scene is the standard
/// replication parity check.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateRecorder {
    pub add_node_counter: usize,
    pub add_group_counter: usize,
    pub add_transform_counter: usize,
    pub add_uncertain_transform_counter: usize,
    pub add_geometric_node_counter: usize,
    pub add_remote_root_counter: usize,
    pub add_connection_counter: usize,
    pub set_node_attributes_counter: usize,
    pub set_transform_counter: usize,
    pub set_uncertain_transform_counter: usize,
    pub add_parent_counter: usize,
    pub remove_parent_counter: usize,
    pub delete_node_counter: usize,
}

impl UpdateRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum over all per-kind counters.
    #[must_use]
    pub fn total(&self) -> usize {
        self.add_node_counter
            + self.add_group_counter
            + self.add_transform_counter
            + self.add_uncertain_transform_counter
            + self.add_geometric_node_counter
            + self.add_remote_root_counter
            + self.add_connection_counter
            + self.set_node_attributes_counter
            + self.set_transform_counter
            + self.set_uncertain_transform_counter
            + self.add_parent_counter
            + self.remove_parent_counter
            + self.delete_node_counter
    }
}

impl UpdateObserver for UpdateRecorder {
    fn on_add_node(&mut self, _parent: Id, _id: Id, _attributes: &[Attribute], _success: bool) {
        self.add_node_counter += 1;
    }

    fn on_add_group(&mut self, _parent: Id, _id: Id, _attributes: &[Attribute], _success: bool) {
        self.add_group_counter += 1;
    }

    fn on_add_transform_node(
        &mut self,
        _parent: Id,
        _id: Id,
        _attributes: &[Attribute],
        _pose: &Pose,
        _stamp: TimeStamp,
        _success: bool,
    ) {
        self.add_transform_counter += 1;
    }

    fn on_add_uncertain_transform_node(
        &mut self,
        _parent: Id,
        _id: Id,
        _attributes: &[Attribute],
        _pose: &Pose,
        _covariance: &Covariance6,
        _stamp: TimeStamp,
        _success: bool,
    ) {
        self.add_uncertain_transform_counter += 1;
    }

    fn on_add_geometric_node(
        &mut self,
        _parent: Id,
        _id: Id,
        _attributes: &[Attribute],
        _shape: &Shape,
        _stamp: TimeStamp,
        _success: bool,
    ) {
        self.add_geometric_node_counter += 1;
    }

    fn on_add_remote_root_node(&mut self, _id: Id, _attributes: &[Attribute], _success: bool) {
        self.add_remote_root_counter += 1;
    }

    fn on_add_connection(
        &mut self,
        _parent: Id,
        _id: Id,
        _attributes: &[Attribute],
        _sources: &[Id],
        _targets: &[Id],
        _start: TimeStamp,
        _end: TimeStamp,
        _success: bool,
    ) {
        self.add_connection_counter += 1;
    }

    fn on_set_node_attributes(
        &mut self,
        _id: Id,
        _attributes: &[Attribute],
        _stamp: TimeStamp,
        _success: bool,
    ) {
        self.set_node_attributes_counter += 1;
    }

    fn on_set_transform(&mut self, _id: Id, _pose: &Pose, _stamp: TimeStamp, _success: bool) {
        self.set_transform_counter += 1;
    }

    fn on_set_uncertain_transform(
        &mut self,
        _id: Id,
        _pose: &Pose,
        _covariance: &Covariance6,
        _stamp: TimeStamp,
        _success: bool,
    ) {
        self.set_uncertain_transform_counter += 1;
    }

    fn on_add_parent(&mut self, _id: Id, _parent: Id, _success: bool) {
        self.add_parent_counter += 1;
    }

    fn on_remove_parent(&mut self, _id: Id, _parent: Id, _success: bool) {
        self.remove_parent_counter += 1;
    }

    fn on_delete_node(&mut self, _id: Id, _success: bool) {
        self.delete_node_counter += 1;
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_counts_per_kind() {
        let mut recorder = UpdateRecorder::new();
        recorder.on_add_node(Id(1), Id(2), &[], true);
        recorder.on_add_node(Id(1), Id(3), &[], false);
        recorder.on_delete_node(Id(3), true);

        assert_eq!(recorder.add_node_counter, 2);
        assert_eq!(recorder.delete_node_counter, 1);
        assert_eq!(recorder.add_group_counter, 0);
        assert_eq!(recorder.total(), 3);
    }

    #[test]
    fn default_observer_methods_are_noops() {
        struct Silent;
        impl UpdateObserver for Silent {}

        let mut silent = Silent;
        silent.on_add_node(Id(1), Id(2), &[], true);
        silent.on_delete_node(Id(2), false);
    }
}
