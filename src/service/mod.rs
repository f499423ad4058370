//! Remote Service Layer
//!
//! Traits and data types for the test management service: paginated read
//! side (`RemoteSource`), write side (`WriteService`) with typed payloads,
//! and the remote tree builder. The fetch loop is sequential and completes
//! before any diffing starts, so the diff always sees one internally
//! consistent snapshot.

pub mod qase;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ServiceError, SyncError};
use crate::tree::node::CaseNode;
use crate::tree::Tree;

/// One page of a paginated listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    pub count: usize,
    #[serde(default)]
    pub entities: Vec<T>,
}

/// Suite as listed by the remote service.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSuite {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub parent_id: Option<u64>,
}

/// Case as listed by the remote service.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteCase {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub suite_id: Option<u64>,
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldValue>,
}

/// Retrieve-shape custom field entry. Write calls use the id → value map
/// instead; see `CaseWrite::custom_field`.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomFieldValue {
    pub id: u64,
    pub value: Value,
}

/// Write payload for a suite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuiteWrite {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u64>,
}

/// Write payload for a case: known fields plus a string-keyed extension map
/// flattened into the serialized body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseWrite {
    pub title: String,
    pub suite_id: u64,
    pub custom_field: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Paginated read access to the remote tree.
pub trait RemoteSource {
    fn suites_page(&self, limit: usize, offset: usize) -> Result<Page<RemoteSuite>, ServiceError>;

    fn cases_page(
        &self,
        suite_id: u64,
        limit: usize,
        offset: usize,
    ) -> Result<Page<RemoteCase>, ServiceError>;
}

/// Write access to the remote tree. Implementations must report the
/// "no actual change" rejection distinguishably; see
/// [`ServiceError::is_no_change`].
pub trait WriteService {
    fn create_suite(&self, suite: &SuiteWrite) -> Result<u64, ServiceError>;
    fn update_suite(&self, id: u64, suite: &SuiteWrite) -> Result<u64, ServiceError>;
    fn delete_suite(&self, id: u64) -> Result<(), ServiceError>;
    fn create_case(&self, case: &CaseWrite) -> Result<u64, ServiceError>;
    fn update_case(&self, id: u64, case: &CaseWrite) -> Result<u64, ServiceError>;
    fn delete_case(&self, id: u64) -> Result<(), ServiceError>;
}

/// Fetch every suite, page by page, until the service returns an empty page.
pub fn fetch_all_suites(
    source: &dyn RemoteSource,
    page_size: usize,
) -> Result<Vec<RemoteSuite>, ServiceError> {
    let mut offset = 0;
    let mut entities = Vec::new();
    loop {
        let page = source.suites_page(page_size, offset)?;
        if page.count == 0 {
            break;
        }
        offset += page_size;
        entities.extend(page.entities);
    }
    Ok(entities)
}

/// Fetch every case of one suite, page by page.
pub fn fetch_all_cases(
    source: &dyn RemoteSource,
    suite_id: u64,
    page_size: usize,
) -> Result<Vec<RemoteCase>, ServiceError> {
    let mut offset = 0;
    let mut entities = Vec::new();
    loop {
        let page = source.cases_page(suite_id, page_size, offset)?;
        if page.count == 0 {
            break;
        }
        offset += page_size;
        entities.extend(page.entities);
    }
    Ok(entities)
}

/// Build the remote case tree from one complete paginated snapshot.
///
/// With `root_suite_id` the target suite becomes the tree root (synthetic
/// path `.`), other top-level suites are skipped, and so is every branch
/// whose parent was skipped. Without it, a synthetic repository root holds
/// all top-level suites.
pub fn build_remote_tree(
    source: &dyn RemoteSource,
    root_suite_id: Option<u64>,
    defaults: &BTreeMap<String, Value>,
    page_size: usize,
) -> Result<Tree, SyncError> {
    let mut tree = match root_suite_id {
        Some(_) => None,
        None => Some(Tree::new(CaseNode::repository_root())),
    };

    let suites = fetch_all_suites(source, page_size)?;
    for suite in &suites {
        if let Some(target) = root_suite_id {
            if suite.parent_id.is_none() && suite.id != target {
                // Top-level suite outside the target branch.
                continue;
            }
            if let Some(parent_id) = suite.parent_id {
                let parent_known = tree
                    .as_ref()
                    .map(|tree| tree.get_by_remote_id(parent_id).is_some())
                    .unwrap_or(false);
                if !parent_known {
                    // Branch we are not syncing.
                    continue;
                }
            }
        }

        if tree.is_none() {
            tree = Some(Tree::new(CaseNode::root_suite(suite.id, &suite.title)));
        } else if let Some(tree) = tree.as_mut() {
            tree.add_remote_suite(suite.id, &suite.title, suite.parent_id);
        }

        if let Some(tree) = tree.as_mut() {
            for case in fetch_all_cases(source, suite.id, page_size)? {
                let fields = case
                    .custom_fields
                    .iter()
                    .map(|field| (field.id.to_string(), field.value.clone()));
                tree.add_remote_case(case.id, &case.title, case.suite_id, fields, defaults)?;
            }
        }
    }

    tree.ok_or_else(|| match root_suite_id {
        Some(id) => SyncError::Config(format!("root suite {id} not found on the remote side")),
        None => SyncError::Config("remote tree could not be constructed".to_string()),
    })
}
