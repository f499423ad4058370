//! Case Tree
//!
//! Arena-backed container for one node hierarchy with two lookup indices
//! (matching key, remote identifier) and the traversal utilities the diff
//! and apply stages rely on.

pub mod diff;
pub mod node;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;

use serde_json::Value;

use crate::error::SyncError;
use node::{compute_key, CaseAttributes, CaseNode, Entity, NodeId};

/// Node attribute selectable for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderAttr {
    Name,
    Key,
    Path,
}

impl FromStr for RenderAttr {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(RenderAttr::Name),
            "key" => Ok(RenderAttr::Key),
            "path" => Ok(RenderAttr::Path),
            other => Err(SyncError::Config(format!(
                "unknown render attribute '{other}' (expected name, key or path)"
            ))),
        }
    }
}

/// One node hierarchy with its lookup indices.
///
/// The arena never shrinks; removed nodes are detached from the hierarchy and
/// dropped from both indices, which takes them out of every traversal.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<CaseNode>,
    root: NodeId,
    /// Matching key → node. Total: one entry per attached node.
    key_map: HashMap<String, NodeId>,
    /// Remote identifier → node. Partial: only nodes with a known identifier.
    id_map: HashMap<u64, NodeId>,
}

impl Tree {
    pub fn new(root: CaseNode) -> Self {
        let mut key_map = HashMap::new();
        key_map.insert(root.key().to_string(), 0);
        let mut id_map = HashMap::new();
        if let Some(remote_id) = root.remote_id {
            id_map.insert(remote_id, 0);
        }
        Tree {
            nodes: vec![root],
            root: 0,
            key_map,
            id_map,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &CaseNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut CaseNode {
        &mut self.nodes[id]
    }

    /// Number of attached nodes, root included.
    pub fn len(&self) -> usize {
        self.key_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key_map.is_empty()
    }

    pub fn get_by_key(&self, key: &str) -> Option<NodeId> {
        self.key_map.get(key).copied()
    }

    pub fn get_by_remote_id(&self, remote_id: u64) -> Option<NodeId> {
        self.id_map.get(&remote_id).copied()
    }

    /// Attach `node` under `parent` and index it. Key uniqueness is the
    /// caller's responsibility; inserting a duplicate key is not supported.
    pub fn add_child(&mut self, parent: NodeId, mut node: CaseNode) -> NodeId {
        let id = self.nodes.len();
        node.parent = Some(parent);
        self.key_map.insert(node.key().to_string(), id);
        if let Some(remote_id) = node.remote_id {
            self.id_map.insert(remote_id, id);
        }
        self.nodes.push(node);
        self.nodes[parent].children.push(id);
        id
    }

    pub fn add_local_suite(&mut self, parent: NodeId, path: &Path) -> NodeId {
        self.add_child(parent, CaseNode::local_suite(path))
    }

    pub fn add_local_case(
        &mut self,
        parent: NodeId,
        path: &Path,
        name: &str,
        attributes: CaseAttributes,
        strip_titles: bool,
    ) -> Result<NodeId, SyncError> {
        let node = CaseNode::local_case(path, name, attributes, strip_titles)?;
        Ok(self.add_child(parent, node))
    }

    /// Attach a remote suite under the node owning `parent_id`, or under the
    /// root when the parent is unknown.
    pub fn add_remote_suite(
        &mut self,
        remote_id: u64,
        title: &str,
        parent_id: Option<u64>,
    ) -> NodeId {
        let parent = parent_id
            .and_then(|pid| self.get_by_remote_id(pid))
            .unwrap_or(self.root);
        let parent_path = self.nodes[parent].path.clone();
        self.add_child(parent, CaseNode::remote_suite(remote_id, title, &parent_path))
    }

    /// Attach a remote case under the suite owning `suite_id`, or under the
    /// root when the suite is unknown.
    pub fn add_remote_case(
        &mut self,
        remote_id: u64,
        title: &str,
        suite_id: Option<u64>,
        custom_fields: impl IntoIterator<Item = (String, Value)>,
        defaults: &BTreeMap<String, Value>,
    ) -> Result<NodeId, SyncError> {
        let parent = suite_id
            .and_then(|sid| self.get_by_remote_id(sid))
            .unwrap_or(self.root);
        let parent_path = self.nodes[parent].path.clone();
        let node = CaseNode::remote_case(remote_id, title, &parent_path, custom_fields, defaults)?;
        Ok(self.add_child(parent, node))
    }

    /// Bind a remote identifier to a node and index it.
    pub fn set_remote_id(&mut self, id: NodeId, remote_id: u64) {
        self.nodes[id].remote_id = Some(remote_id);
        self.id_map.insert(remote_id, id);
    }

    /// Remove a node from both indices and detach it from its parent. Does
    /// not cascade; descendants must be removed first.
    pub fn remove_node(&mut self, id: NodeId) {
        let key = self.nodes[id].key().to_string();
        self.key_map.remove(&key);
        if let Some(remote_id) = self.nodes[id].remote_id {
            self.id_map.remove(&remote_id);
        }
        if let Some(parent) = self.nodes[id].parent {
            self.nodes[parent].children.retain(|child| *child != id);
        }
        self.nodes[id].parent = None;
    }

    /// Stack-based depth-first pre-order: every parent is visited before any
    /// of its children.
    pub fn pre_order(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.key_map.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            out.push(id);
            for child in self.nodes[id].children.iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// Breadth-first depth groups, shallowest first. Reversing the sequence
    /// yields a safe deletion order (deepest first).
    pub fn group_by_level(&self) -> Vec<Vec<NodeId>> {
        let mut levels = Vec::new();
        let mut current = vec![self.root];
        while !current.is_empty() {
            let next: Vec<NodeId> = current
                .iter()
                .flat_map(|id| self.nodes[*id].children.iter().copied())
                .collect();
            levels.push(current);
            current = next;
        }
        levels
    }

    fn attr_of(&self, id: NodeId, attr: RenderAttr) -> String {
        let node = &self.nodes[id];
        match attr {
            RenderAttr::Name => node.name.clone(),
            RenderAttr::Key => node.key().to_string(),
            RenderAttr::Path => node.path.display().to_string(),
        }
    }

    /// Depth-first pre-order rendering: one line per node with box-drawing
    /// branch prefixes, the remote identifier when known, and an optional
    /// action annotation.
    pub fn render(&self, attr: RenderAttr, show_actions: bool) -> String {
        let mut out = String::new();
        self.render_node(self.root, "", "", attr, show_actions, &mut out);
        out
    }

    fn render_node(
        &self,
        id: NodeId,
        lead: &str,
        child_lead: &str,
        attr: RenderAttr,
        show_actions: bool,
        out: &mut String,
    ) {
        let node = &self.nodes[id];
        let action = if show_actions {
            format!("{} ", node.action.render(false))
        } else {
            String::new()
        };
        let remote_id = node
            .remote_id
            .map(|remote_id| format!("[{remote_id}] "))
            .unwrap_or_default();
        out.push_str(&format!(
            "{lead}{action}{remote_id}{}\n",
            self.attr_of(id, attr)
        ));

        let count = node.children.len();
        for (index, child) in node.children.iter().enumerate() {
            let last = index + 1 == count;
            let branch = if last { "└── " } else { "├── " };
            let next_lead = format!("{child_lead}{branch}");
            let next_child_lead = format!("{child_lead}{}", if last { "    " } else { "│   " });
            self.render_node(*child, &next_lead, &next_child_lead, attr, show_actions, out);
        }
    }
}

/// Key a directory or feature-file path would map to, without building a
/// node. Used when growing a local tree branch by branch.
pub(crate) fn suite_key(path: &Path) -> String {
    compute_key(path, Entity::Suite, "")
}
