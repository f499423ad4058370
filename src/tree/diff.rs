//! Tree Diffing
//!
//! Reconciles a local tree against a remote tree. `diff_trees` produces a
//! merged tree — a deep copy of the local tree extended with remote-only
//! branches — where every node carries the action needed to make the remote
//! side match the local side. `flat_diff_trees` produces the same
//! classification as plain operation lists without building a merged tree.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::Value;

use super::node::Action;
use super::{RenderAttr, Tree};

/// One reconciliation operation from the flat diff.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub action: Action,
    pub key: String,
    pub name: String,
    pub path: PathBuf,
    pub remote_id: Option<u64>,
}

/// Build the merged, action-annotated tree.
///
/// Matched nodes take the remote identifier and custom-field values (the
/// remote side is authoritative for both) and become `Update`, except the
/// root, which stays `None`. Unmatched local nodes become `Create` with
/// custom fields seeded from `defaults`. Remote-only nodes are grafted in
/// childless, under the merged counterpart of their remote parent, as
/// `Delete`; the remote pre-order guarantees that counterpart already exists.
pub fn diff_trees(local: &Tree, remote: &Tree, defaults: &BTreeMap<String, Value>) -> Tree {
    let mut merged = local.clone();

    for id in merged.pre_order() {
        let key = merged.node(id).key().to_string();
        match remote.get_by_key(&key) {
            Some(counterpart) => {
                let remote_node = remote.node(counterpart);
                let remote_id = remote_node.remote_id;
                let custom_fields = remote_node.custom_fields.clone();
                {
                    let node = merged.node_mut(id);
                    node.custom_fields = custom_fields;
                    node.action = if node.is_root_path() {
                        Action::None
                    } else {
                        Action::Update
                    };
                }
                if let Some(remote_id) = remote_id {
                    merged.set_remote_id(id, remote_id);
                }
            }
            None => {
                let node = merged.node_mut(id);
                node.custom_fields = defaults.clone();
                node.action = Action::Create;
            }
        }
    }

    for id in remote.pre_order() {
        let remote_node = remote.node(id);
        if merged.get_by_key(remote_node.key()).is_some() {
            continue;
        }

        // The roots of both trees share the `.` key, so an unmatched remote
        // node always has a parent, and that parent's merged counterpart was
        // grafted (or matched) before this node was visited.
        let Some(parent) = remote_node.parent() else {
            continue;
        };
        let parent_key = remote.node(parent).key().to_string();
        let Some(merged_parent) = merged.get_by_key(&parent_key) else {
            continue;
        };

        let mut copy = remote_node.detached_copy();
        copy.action = Action::Delete;
        merged.add_child(merged_parent, copy);
    }

    merged
}

/// Classify every non-root key into update/create/delete operations without
/// building a merged tree. Agrees with `diff_trees` on every shared key.
pub fn flat_diff_trees(local: &Tree, remote: &Tree) -> Vec<Operation> {
    let mut to_update = Vec::new();
    let mut to_create = Vec::new();
    let mut to_delete = Vec::new();

    for id in local.pre_order() {
        let node = local.node(id);
        if node.is_root_path() {
            continue;
        }
        match remote.get_by_key(node.key()) {
            Some(counterpart) => to_update.push(Operation {
                action: Action::Update,
                key: node.key().to_string(),
                name: node.name.clone(),
                path: node.path.clone(),
                remote_id: remote.node(counterpart).remote_id,
            }),
            None => to_create.push(Operation {
                action: Action::Create,
                key: node.key().to_string(),
                name: node.name.clone(),
                path: node.path.clone(),
                remote_id: None,
            }),
        }
    }

    for id in remote.pre_order() {
        let node = remote.node(id);
        if node.is_root_path() {
            continue;
        }
        if local.get_by_key(node.key()).is_none() {
            // Key exists remotely but not locally: the entity was deleted.
            to_delete.push(Operation {
                action: Action::Delete,
                key: node.key().to_string(),
                name: node.name.clone(),
                path: node.path.clone(),
                remote_id: node.remote_id,
            });
        }
    }

    to_update
        .into_iter()
        .chain(to_create)
        .chain(to_delete)
        .collect()
}

/// Flat per-operation listing: one `[Action] attribute` line per operation.
pub fn render_operations(operations: &[Operation], attr: RenderAttr) -> String {
    let mut out = String::new();
    for operation in operations {
        let value = match attr {
            RenderAttr::Name => operation.name.clone(),
            RenderAttr::Key => operation.key.clone(),
            RenderAttr::Path => operation.path.display().to_string(),
        };
        out.push_str(&format!("{} {value}\n", operation.action.render(false)));
    }
    out
}
