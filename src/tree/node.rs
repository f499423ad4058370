//! Case tree nodes: entity kinds, reconciliation actions and key derivation.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use owo_colors::OwoColorize;
use serde_json::Value;

use crate::error::SyncError;
use crate::title::normalize_title;

/// Quote symbols stripped from case titles, in application order.
pub const TITLE_QUOTE_SYMBOLS: &str = "'\"";

/// Index of a node within its tree's arena.
pub type NodeId = usize;

/// Kind of entity a node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Repository,
    Suite,
    Case,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Repository => "repository",
            Entity::Suite => "suite",
            Entity::Case => "case",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation needed to reconcile the remote side of a node with the local
/// side. `None` only ever applies to the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    #[default]
    None,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::None => "-None-",
            Action::Create => "Create",
            Action::Update => "Update",
            Action::Delete => "Delete",
        }
    }

    /// Colored `[Action]` tag for rendering. Empty when `ignore_none` is set
    /// and there is nothing to do.
    pub fn render(&self, ignore_none: bool) -> String {
        if *self == Action::None && ignore_none {
            return String::new();
        }
        let tag = format!("[{}]", self.label());
        match self {
            Action::Create => tag.green().to_string(),
            Action::Update => tag.cyan().to_string(),
            Action::Delete => tag.red().to_string(),
            Action::None => tag.bold().to_string(),
        }
    }
}

/// Free-form payload carried by case nodes: the known description field plus
/// a string-keyed extension map merged verbatim into write calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseAttributes {
    pub description: Option<String>,
    pub extra: BTreeMap<String, Value>,
}

/// Matching key: path with the `.feature` suffix stripped, plus `::<name>`
/// for case nodes. Pure function of its inputs, computed once at node
/// construction and never recomputed afterwards.
pub(crate) fn compute_key(path: &Path, entity: Entity, name: &str) -> String {
    let base = path.to_string_lossy();
    let base = base.strip_suffix(".feature").unwrap_or(&base);
    match entity {
        Entity::Case => format!("{base}::{name}"),
        _ => base.to_string(),
    }
}

/// One node of a case tree: repository root, suite or case.
#[derive(Debug, Clone)]
pub struct CaseNode {
    pub entity: Entity,
    /// Relative path for local nodes; synthetic path reconstructed from the
    /// parent chain for remote nodes. The tree root sits at `.`.
    pub path: PathBuf,
    pub name: String,
    pub action: Action,
    /// Identifier on the remote side, known once resolved.
    pub remote_id: Option<u64>,
    /// Write-shape custom field map (field id → value). Populated from
    /// remote values overlaid on configured defaults before any write call.
    pub custom_fields: BTreeMap<String, Value>,
    /// Case payload; empty for suites and the root.
    pub attributes: CaseAttributes,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    key: String,
}

impl CaseNode {
    fn new(entity: Entity, path: PathBuf, name: String) -> Self {
        let key = compute_key(&path, entity, &name);
        CaseNode {
            entity,
            path,
            name,
            action: Action::None,
            remote_id: None,
            custom_fields: BTreeMap::new(),
            attributes: CaseAttributes::default(),
            parent: None,
            children: Vec::new(),
            key,
        }
    }

    /// Synthetic repository root at path `.`.
    pub fn repository_root() -> Self {
        CaseNode::new(
            Entity::Repository,
            PathBuf::from("."),
            "Repository".to_string(),
        )
    }

    /// Root bound to an existing remote suite. Keeps the synthetic `.` path
    /// so local and remote root keys stay comparable.
    pub fn root_suite(remote_id: u64, title: &str) -> Self {
        let mut node = CaseNode::new(Entity::Suite, PathBuf::from("."), title.to_string());
        node.remote_id = Some(remote_id);
        node
    }

    /// Local suite for a directory or a feature file; the display name is
    /// the file stem.
    pub fn local_suite(path: &Path) -> Self {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        CaseNode::new(Entity::Suite, path.to_path_buf(), name)
    }

    /// Local case under the feature file at `path`. The title is normalized
    /// when `strip_titles` is set. Fails on an empty name.
    pub fn local_case(
        path: &Path,
        name: &str,
        attributes: CaseAttributes,
        strip_titles: bool,
    ) -> Result<Self, SyncError> {
        if name.is_empty() {
            return Err(SyncError::Validation(format!(
                "cannot create a case node under {} without a name",
                path.display()
            )));
        }
        let name = if strip_titles {
            normalize_title(name, TITLE_QUOTE_SYMBOLS)
        } else {
            name.to_string()
        };
        if name.is_empty() {
            return Err(SyncError::Validation(format!(
                "case title under {} is empty after normalization",
                path.display()
            )));
        }
        let mut node = CaseNode::new(Entity::Case, path.to_path_buf(), name);
        node.attributes = attributes;
        Ok(node)
    }

    /// Remote suite attached under a parent at `parent_path`.
    pub fn remote_suite(remote_id: u64, title: &str, parent_path: &Path) -> Self {
        let path = if parent_path == Path::new(".") {
            PathBuf::from(title)
        } else {
            parent_path.join(title)
        };
        let mut node = CaseNode::new(Entity::Suite, path, title.to_string());
        node.remote_id = Some(remote_id);
        node
    }

    /// Remote case under a suite at `parent_path`. The retrieve-shape custom
    /// field list is folded over `defaults` into the write-shape map, so the
    /// map is fully populated from the moment the node exists.
    pub fn remote_case(
        remote_id: u64,
        title: &str,
        parent_path: &Path,
        custom_fields: impl IntoIterator<Item = (String, Value)>,
        defaults: &BTreeMap<String, Value>,
    ) -> Result<Self, SyncError> {
        if title.is_empty() {
            return Err(SyncError::Validation(format!(
                "remote case {remote_id} has an empty title"
            )));
        }
        let mut node = CaseNode::new(Entity::Case, parent_path.to_path_buf(), title.to_string());
        node.remote_id = Some(remote_id);
        node.custom_fields = defaults.clone();
        for (field_id, value) in custom_fields {
            node.custom_fields.insert(field_id, value);
        }
        Ok(node)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Whether this node sits at the synthetic tree root path.
    pub fn is_root_path(&self) -> bool {
        self.path == Path::new(".")
    }

    /// Copy of this node without its hierarchy links; used when grafting
    /// remote-only nodes into a merged tree.
    pub fn detached_copy(&self) -> CaseNode {
        let mut copy = self.clone();
        copy.parent = None;
        copy.children.clear();
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_suite_key_strips_feature_suffix() {
        let node = CaseNode::local_suite(Path::new("auth/login.feature"));
        assert_eq!(node.key(), "auth/login");
        assert_eq!(node.name, "login");
    }

    #[test]
    fn test_local_directory_suite_key() {
        let node = CaseNode::local_suite(Path::new("auth"));
        assert_eq!(node.key(), "auth");
        assert_eq!(node.name, "auth");
    }

    #[test]
    fn test_local_case_key_includes_name() {
        let node = CaseNode::local_case(
            Path::new("auth/login.feature"),
            "Successful login",
            CaseAttributes::default(),
            false,
        )
        .unwrap();
        assert_eq!(node.key(), "auth/login::Successful login");
    }

    #[test]
    fn test_local_case_key_uses_normalized_name() {
        let node = CaseNode::local_case(
            Path::new("a.feature"),
            "'Search non-existent team'",
            CaseAttributes::default(),
            true,
        )
        .unwrap();
        assert_eq!(node.name, "Search non-existent team");
        assert_eq!(node.key(), "a::Search non-existent team");
    }

    #[test]
    fn test_local_case_without_name_fails() {
        let result = CaseNode::local_case(
            Path::new("a.feature"),
            "",
            CaseAttributes::default(),
            false,
        );
        assert!(matches!(result, Err(SyncError::Validation(_))));
    }

    #[test]
    fn test_remote_suite_path_under_root_has_no_dot_prefix() {
        let node = CaseNode::remote_suite(7, "auth", Path::new("."));
        assert_eq!(node.path, PathBuf::from("auth"));
        assert_eq!(node.key(), "auth");
    }

    #[test]
    fn test_remote_suite_path_is_reconstructed_from_parent_chain() {
        let node = CaseNode::remote_suite(8, "login", Path::new("auth"));
        assert_eq!(node.key(), "auth/login");
    }

    #[test]
    fn test_remote_case_key_matches_local_case_key() {
        let local = CaseNode::local_case(
            Path::new("auth/login.feature"),
            "Successful login",
            CaseAttributes::default(),
            false,
        )
        .unwrap();
        let remote = CaseNode::remote_case(
            10,
            "Successful login",
            Path::new("auth/login"),
            Vec::new(),
            &BTreeMap::new(),
        )
        .unwrap();
        assert_eq!(local.key(), remote.key());
    }

    #[test]
    fn test_remote_case_custom_fields_fold_over_defaults() {
        let mut defaults = BTreeMap::new();
        defaults.insert("1".to_string(), Value::from("default"));
        defaults.insert("2".to_string(), Value::from("kept"));
        let node = CaseNode::remote_case(
            10,
            "X",
            Path::new("a"),
            vec![("1".to_string(), Value::from("remote"))],
            &defaults,
        )
        .unwrap();
        assert_eq!(node.custom_fields.get("1"), Some(&Value::from("remote")));
        assert_eq!(node.custom_fields.get("2"), Some(&Value::from("kept")));
    }

    #[test]
    fn test_key_is_pure_function_of_inputs() {
        let node = CaseNode::local_case(
            Path::new("auth/login.feature"),
            "Successful login",
            CaseAttributes::default(),
            false,
        )
        .unwrap();
        let recomputed = compute_key(&node.path, node.entity, &node.name);
        assert_eq!(node.key(), recomputed);
    }

    #[test]
    fn test_action_render_labels() {
        assert!(Action::Create.render(false).contains("[Create]"));
        assert!(Action::Delete.render(false).contains("[Delete]"));
        assert_eq!(Action::None.render(true), "");
        assert!(Action::None.render(false).contains("[-None-]"));
    }
}
