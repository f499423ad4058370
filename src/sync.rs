//! Apply Driver
//!
//! Executes a merged tree's actions against the remote service in
//! dependency-safe order: creates and updates run top-down so every parent
//! identifier is resolved before its children need it, deletes run bottom-up
//! so no parent is removed before its children. Strictly sequential — later
//! operations depend on identifiers produced by earlier ones.

use tracing::info;

use crate::error::SyncError;
use crate::service::{CaseWrite, SuiteWrite, WriteService};
use crate::tree::node::{Action, Entity, NodeId};
use crate::tree::Tree;

/// Summary of one apply run.
#[derive(Debug, Clone, Default)]
pub struct PushReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Write calls the service rejected as "no actual change", counted as
    /// success.
    pub noop_recoveries: usize,
    /// Description of each operation, in execution order.
    pub operations: Vec<String>,
}

impl PushReport {
    pub fn summary(&self) -> String {
        format!(
            "Created {}, updated {}, deleted {} ({} no-op recoveries)",
            self.created, self.updated, self.deleted, self.noop_recoveries
        )
    }
}

/// Apply every Create/Update action top-down, then every Delete action
/// deepest-first. The root never receives a write call; its identifier is
/// bound to `root_suite_id`. In dry-run mode the intended calls are only
/// described and no tree state changes. A failure other than the recognized
/// no-op halts remaining operations; already-applied operations stay applied.
pub fn push(
    tree: &mut Tree,
    service: &dyn WriteService,
    root_suite_id: u64,
    dry_run: bool,
) -> Result<PushReport, SyncError> {
    let mut report = PushReport::default();

    if !dry_run {
        let root = tree.root();
        tree.set_remote_id(root, root_suite_id);
    }

    // Creates and updates: parents strictly before children.
    for id in tree.pre_order() {
        match tree.node(id).action {
            Action::Create | Action::Update => {
                perform_write(tree, id, root_suite_id, service, dry_run, &mut report)?;
            }
            Action::None | Action::Delete => {}
        }
    }

    // Deletes: deepest level first so children go before their parents.
    let levels = tree.group_by_level();
    for level in levels.iter().rev() {
        for id in level {
            if tree.node(*id).action == Action::Delete {
                perform_delete(tree, *id, service, dry_run, &mut report)?;
            }
        }
    }

    Ok(report)
}

/// Delete every non-root node of a remote tree, deepest level first.
pub fn delete_remotely(tree: &mut Tree, service: &dyn WriteService) -> Result<usize, SyncError> {
    let mut deleted = 0;
    let root = tree.root();
    let levels = tree.group_by_level();
    for level in levels.iter().rev() {
        for id in level {
            if *id == root {
                continue;
            }
            let node = tree.node(*id);
            let Some(remote_id) = node.remote_id else {
                continue;
            };
            match node.entity {
                Entity::Case => service.delete_case(remote_id)?,
                Entity::Suite | Entity::Repository => service.delete_suite(remote_id)?,
            }
            tree.remove_node(*id);
            deleted += 1;
        }
    }
    Ok(deleted)
}

fn describe(tree: &Tree, id: NodeId) -> String {
    let node = tree.node(id);
    let remote_id = node
        .remote_id
        .map(|remote_id| format!("[{remote_id}] "))
        .unwrap_or_default();
    format!(
        "{} {} node {}{}",
        node.action.render(false),
        node.entity,
        remote_id,
        node.key()
    )
}

fn perform_write(
    tree: &mut Tree,
    id: NodeId,
    root_suite_id: u64,
    service: &dyn WriteService,
    dry_run: bool,
    report: &mut PushReport,
) -> Result<(), SyncError> {
    let description = describe(tree, id);
    report.operations.push(description.clone());
    if dry_run {
        return Ok(());
    }
    info!("{description}");

    if tree.node(id).is_root_path() {
        // No write call for the root; bind the caller-supplied identifier.
        tree.set_remote_id(id, root_suite_id);
        return Ok(());
    }

    let node = tree.node(id);
    let action = node.action;
    let parent_id = node
        .parent()
        .and_then(|parent| tree.node(parent).remote_id)
        .ok_or_else(|| {
            SyncError::Validation(format!("parent identifier unresolved for {}", node.key()))
        })?;

    let result = match node.entity {
        Entity::Repository => return Ok(()),
        Entity::Suite => {
            let write = SuiteWrite {
                title: node.name.clone(),
                parent_id: Some(parent_id),
            };
            match action {
                Action::Create => service.create_suite(&write),
                _ => match node.remote_id {
                    Some(remote_id) => service.update_suite(remote_id, &write),
                    None => {
                        return Err(SyncError::Validation(format!(
                            "update without a remote identifier for {}",
                            node.key()
                        )))
                    }
                },
            }
        }
        Entity::Case => {
            let write = CaseWrite {
                title: node.name.clone(),
                suite_id: parent_id,
                custom_field: node.custom_fields.clone(),
                description: node.attributes.description.clone(),
                extra: node.attributes.extra.clone(),
            };
            match action {
                Action::Create => service.create_case(&write),
                _ => match node.remote_id {
                    Some(remote_id) => service.update_case(remote_id, &write),
                    None => {
                        return Err(SyncError::Validation(format!(
                            "update without a remote identifier for {}",
                            node.key()
                        )))
                    }
                },
            }
        }
    };

    match result {
        Ok(new_id) => {
            tree.set_remote_id(id, new_id);
            match action {
                Action::Create => report.created += 1,
                _ => report.updated += 1,
            }
            Ok(())
        }
        Err(err) if err.is_no_change() => {
            report.noop_recoveries += 1;
            Ok(())
        }
        Err(err) => Err(SyncError::Service(err)),
    }
}

fn perform_delete(
    tree: &mut Tree,
    id: NodeId,
    service: &dyn WriteService,
    dry_run: bool,
    report: &mut PushReport,
) -> Result<(), SyncError> {
    let description = describe(tree, id);
    report.operations.push(description.clone());
    if dry_run {
        return Ok(());
    }
    info!("{description}");

    let node = tree.node(id);
    let remote_id = node.remote_id.ok_or_else(|| {
        SyncError::Validation(format!("delete without a remote identifier for {}", node.key()))
    })?;
    let result = match node.entity {
        Entity::Case => service.delete_case(remote_id),
        Entity::Suite | Entity::Repository => service.delete_suite(remote_id),
    };

    match result {
        Ok(()) => {
            tree.remove_node(id);
            report.deleted += 1;
            Ok(())
        }
        Err(err) if err.is_no_change() => {
            report.noop_recoveries += 1;
            Ok(())
        }
        Err(err) => Err(SyncError::Service(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::tree::diff::diff_trees;
    use crate::tree::node::{CaseAttributes, CaseNode};
    use std::cell::{Cell, RefCell};
    use std::collections::BTreeMap;
    use std::path::Path;

    /// Service double recording every call in execution order.
    #[derive(Default)]
    struct RecordingService {
        calls: RefCell<Vec<String>>,
        next_id: Cell<u64>,
        updates_are_noops: bool,
        fail_case_creates: bool,
    }

    impl RecordingService {
        fn new() -> Self {
            RecordingService {
                next_id: Cell::new(100),
                ..Default::default()
            }
        }

        fn log(&self, entry: String) {
            self.calls.borrow_mut().push(entry);
        }

        fn fresh_id(&self) -> u64 {
            let id = self.next_id.get() + 1;
            self.next_id.set(id);
            id
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    fn noop_rejection() -> ServiceError {
        ServiceError::Rejected {
            status: 400,
            code: Some("no_changes".to_string()),
            message: "There are no changes".to_string(),
        }
    }

    impl WriteService for RecordingService {
        fn create_suite(&self, suite: &SuiteWrite) -> Result<u64, ServiceError> {
            let id = self.fresh_id();
            self.log(format!(
                "create_suite:{}:parent={:?}:id={}",
                suite.title, suite.parent_id, id
            ));
            Ok(id)
        }

        fn update_suite(&self, id: u64, suite: &SuiteWrite) -> Result<u64, ServiceError> {
            if self.updates_are_noops {
                return Err(noop_rejection());
            }
            self.log(format!("update_suite:{}:{}", id, suite.title));
            Ok(id)
        }

        fn delete_suite(&self, id: u64) -> Result<(), ServiceError> {
            self.log(format!("delete_suite:{id}"));
            Ok(())
        }

        fn create_case(&self, case: &CaseWrite) -> Result<u64, ServiceError> {
            if self.fail_case_creates {
                return Err(ServiceError::Rejected {
                    status: 400,
                    code: Some("invalid_suite".to_string()),
                    message: "Suite not found".to_string(),
                });
            }
            let id = self.fresh_id();
            self.log(format!(
                "create_case:{}:suite={}:id={}",
                case.title, case.suite_id, id
            ));
            Ok(id)
        }

        fn update_case(&self, id: u64, case: &CaseWrite) -> Result<u64, ServiceError> {
            if self.updates_are_noops {
                return Err(noop_rejection());
            }
            self.log(format!("update_case:{}:{}", id, case.title));
            Ok(id)
        }

        fn delete_case(&self, id: u64) -> Result<(), ServiceError> {
            self.log(format!("delete_case:{id}"));
            Ok(())
        }
    }

    /// Local: A { X }, B { Y }. Remote: root 1 { A(2) { X(10) }, C(3) { Z(11) } }.
    fn merged_fixture() -> Tree {
        let mut local = Tree::new(CaseNode::repository_root());
        let a = local.add_local_suite(local.root(), Path::new("A.feature"));
        local
            .add_local_case(a, Path::new("A.feature"), "X", CaseAttributes::default(), false)
            .unwrap();
        let b = local.add_local_suite(local.root(), Path::new("B.feature"));
        local
            .add_local_case(b, Path::new("B.feature"), "Y", CaseAttributes::default(), false)
            .unwrap();

        let mut remote = Tree::new(CaseNode::root_suite(1, "Root"));
        remote.add_remote_suite(2, "A", Some(1));
        remote
            .add_remote_case(10, "X", Some(2), Vec::new(), &BTreeMap::new())
            .unwrap();
        remote.add_remote_suite(3, "C", Some(1));
        remote
            .add_remote_case(11, "Z", Some(3), Vec::new(), &BTreeMap::new())
            .unwrap();

        diff_trees(&local, &remote, &BTreeMap::new())
    }

    fn position(calls: &[String], prefix: &str) -> usize {
        calls
            .iter()
            .position(|call| call.starts_with(prefix))
            .unwrap_or_else(|| panic!("no call starting with {prefix}: {calls:?}"))
    }

    #[test]
    fn test_push_orders_creates_parent_first_and_deletes_child_first() {
        let mut merged = merged_fixture();
        let service = RecordingService::new();
        let report = push(&mut merged, &service, 1, false).unwrap();

        let calls = service.calls();
        assert!(position(&calls, "create_suite:B") < position(&calls, "create_case:Y"));
        assert!(position(&calls, "delete_case:11") < position(&calls, "delete_suite:3"));
        assert_eq!(report.created, 2);
        assert_eq!(report.updated, 2);
        assert_eq!(report.deleted, 2);
        assert_eq!(report.noop_recoveries, 0);
    }

    #[test]
    fn test_push_resolves_child_parent_id_from_created_suite() {
        let mut merged = merged_fixture();
        let service = RecordingService::new();
        push(&mut merged, &service, 1, false).unwrap();

        let calls = service.calls();
        let suite_call = &calls[position(&calls, "create_suite:B")];
        let suite_id: u64 = suite_call.rsplit("id=").next().unwrap().parse().unwrap();
        let case_call = &calls[position(&calls, "create_case:Y")];
        assert!(case_call.contains(&format!("suite={suite_id}")));

        let b = merged.get_by_key("B").unwrap();
        assert_eq!(merged.node(b).remote_id, Some(suite_id));
    }

    #[test]
    fn test_push_binds_root_to_target_suite_and_uses_it_for_top_level_creates() {
        let mut merged = merged_fixture();
        let service = RecordingService::new();
        push(&mut merged, &service, 1, false).unwrap();

        assert_eq!(merged.node(merged.root()).remote_id, Some(1));
        let calls = service.calls();
        let suite_call = &calls[position(&calls, "create_suite:B")];
        assert!(suite_call.contains("parent=Some(1)"));
    }

    #[test]
    fn test_push_removes_deleted_nodes_from_indices() {
        let mut merged = merged_fixture();
        let service = RecordingService::new();
        push(&mut merged, &service, 1, false).unwrap();

        assert!(merged.get_by_key("C").is_none());
        assert!(merged.get_by_key("C::Z").is_none());
        assert!(merged.get_by_remote_id(3).is_none());
        assert!(merged.get_by_remote_id(11).is_none());
    }

    #[test]
    fn test_push_recovers_no_op_rejections_as_success() {
        let mut merged = merged_fixture();
        let service = RecordingService {
            updates_are_noops: true,
            ..RecordingService::new()
        };
        let report = push(&mut merged, &service, 1, false).unwrap();

        assert_eq!(report.noop_recoveries, 2);
        assert_eq!(report.updated, 0);
        // Creates and deletes still ran to completion.
        assert_eq!(report.created, 2);
        assert_eq!(report.deleted, 2);
    }

    #[test]
    fn test_push_halts_on_other_failures_without_rollback() {
        let mut merged = merged_fixture();
        let service = RecordingService {
            fail_case_creates: true,
            ..RecordingService::new()
        };
        let result = push(&mut merged, &service, 1, false);

        assert!(matches!(result, Err(SyncError::Service(_))));
        let calls = service.calls();
        // The suite create before the failing case create stays applied.
        assert!(calls.iter().any(|call| call.starts_with("create_suite:B")));
        // Nothing after the failure ran.
        assert!(!calls.iter().any(|call| call.starts_with("delete_")));
    }

    #[test]
    fn test_dry_run_describes_operations_without_calls_or_mutation() {
        let mut merged = merged_fixture();
        let service = RecordingService::new();
        let report = push(&mut merged, &service, 1, true).unwrap();

        assert!(service.calls().is_empty());
        assert_eq!(report.operations.len(), 6);
        assert_eq!(report.created + report.updated + report.deleted, 0);
        // Indices untouched: the deleted branch is still in the tree and the
        // root identifier was not rebound.
        assert!(merged.get_by_key("C::Z").is_some());
        assert!(merged.node(merged.get_by_key("B").unwrap()).remote_id.is_none());
    }

    #[test]
    fn test_delete_remotely_removes_everything_but_the_root() {
        let mut remote = Tree::new(CaseNode::root_suite(1, "Root"));
        remote.add_remote_suite(2, "A", Some(1));
        remote
            .add_remote_case(10, "X", Some(2), Vec::new(), &BTreeMap::new())
            .unwrap();

        let service = RecordingService::new();
        let deleted = delete_remotely(&mut remote, &service).unwrap();

        assert_eq!(deleted, 2);
        let calls = service.calls();
        assert!(position(&calls, "delete_case:10") < position(&calls, "delete_suite:2"));
        assert!(remote.get_by_remote_id(1).is_some());
        assert_eq!(remote.len(), 1);
    }
}
