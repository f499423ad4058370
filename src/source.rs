//! Local Feature Source
//!
//! Walks a directory for Gherkin `.feature` files and turns them into local
//! case tree branches: one suite per directory level, one suite per feature
//! file, one case per scenario. Scenario text is composed into a Markdown
//! description; a file's Background is prepended to every case in that file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use comfy_table::presets::ASCII_MARKDOWN;
use comfy_table::Table as MarkdownTable;
use gherkin::{Background, Examples, Feature, GherkinEnv, Scenario, Step};
use tracing::warn;
use walkdir::WalkDir;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::tree::node::{CaseAttributes, CaseNode};
use crate::tree::{suite_key, Tree};

/// One parsed scenario, ready to become a case node.
#[derive(Debug, Clone)]
pub struct CaseRecord {
    pub name: String,
    pub attributes: CaseAttributes,
}

/// Yield (relative, absolute) paths for every `.feature` file under `root`,
/// in sorted order so tree construction is deterministic.
pub fn find_feature_files(root: &Path) -> Result<Vec<(PathBuf, PathBuf)>, SyncError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|err| SyncError::Io(err.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_feature = entry
            .path()
            .extension()
            .map(|ext| ext == "feature")
            .unwrap_or(false);
        if !is_feature {
            continue;
        }
        let absolute = entry.into_path();
        let relative = absolute
            .strip_prefix(root)
            .unwrap_or(absolute.as_path())
            .to_path_buf();
        files.push((relative, absolute));
    }
    Ok(files)
}

/// Markdown description for a scenario or background: bold keyword, free
/// text, one bold-keyword line per step, one table per examples block.
fn compose_description(
    keyword: &str,
    text: Option<&str>,
    steps: &[Step],
    examples: &[Examples],
) -> String {
    let mut description = format!("**{keyword}**");

    if let Some(text) = text {
        if !text.is_empty() {
            description = format!("{description}\n\n{text}");
        }
    }

    if !steps.is_empty() {
        description.push('\n');
        for step in steps {
            // The parser may keep a trailing space on the keyword.
            description.push_str(&format!("\n**{}** {}", step.keyword.trim(), step.value));
        }
    }

    for block in examples {
        let Some(table) = &block.table else {
            continue;
        };
        let Some((header, body)) = table.rows.split_first() else {
            continue;
        };
        let mut rendered = MarkdownTable::new();
        rendered.load_preset(ASCII_MARKDOWN);
        rendered.set_header(header.clone());
        for row in body {
            rendered.add_row(row.clone());
        }
        description.push_str(&format!("\n\n{rendered}"));
    }

    description
}

fn compose_background(background: &Background) -> String {
    compose_description(
        &background.keyword,
        background.description.as_deref(),
        &background.steps,
        &[],
    )
}

fn scenario_record(scenario: &Scenario, background: Option<&str>) -> CaseRecord {
    let description = compose_description(
        &scenario.keyword,
        scenario.description.as_deref(),
        &scenario.steps,
        &scenario.examples,
    );
    let description = match background {
        Some(background) => format!("{background}\n\n{description}"),
        None => description,
    };
    CaseRecord {
        name: scenario.name.clone(),
        attributes: CaseAttributes {
            description: Some(description),
            extra: BTreeMap::new(),
        },
    }
}

/// Parse one feature file into case records. Unparseable files are fatal, or
/// skipped with a warning when `skip_unparsable` is set.
pub fn parse_feature_file(path: &Path, skip_unparsable: bool) -> Result<Vec<CaseRecord>, SyncError> {
    let feature = match Feature::parse_path(path, GherkinEnv::default()) {
        Ok(feature) => feature,
        Err(err) => {
            if skip_unparsable {
                warn!(path = %path.display(), error = %err, "skipping unparseable feature file");
                return Ok(Vec::new());
            }
            return Err(SyncError::Parse {
                path: path.to_path_buf(),
                reason: err.to_string(),
            });
        }
    };

    let background = feature.background.as_ref().map(compose_background);
    Ok(feature
        .scenarios
        .iter()
        .map(|scenario| scenario_record(scenario, background.as_deref()))
        .collect())
}

/// Create the intermediate directory suites for `relative` (ancestor order),
/// then the file suite and its case nodes.
fn add_branch(
    tree: &mut Tree,
    relative: &Path,
    absolute: &Path,
    config: &SyncConfig,
) -> Result<(), SyncError> {
    let mut directories: Vec<PathBuf> = relative
        .ancestors()
        .skip(1)
        .filter(|ancestor| !ancestor.as_os_str().is_empty())
        .map(|ancestor| ancestor.to_path_buf())
        .collect();
    directories.reverse();

    let mut parent = tree.root();
    for directory in &directories {
        parent = match tree.get_by_key(&suite_key(directory)) {
            Some(existing) => existing,
            None => tree.add_local_suite(parent, directory),
        };
    }

    if tree.get_by_key(&suite_key(relative)).is_none() {
        let suite = tree.add_local_suite(parent, relative);
        for record in parse_feature_file(absolute, config.skip_unparsable)? {
            tree.add_local_case(
                suite,
                relative,
                &record.name,
                record.attributes,
                config.strip_titles,
            )?;
        }
    }
    Ok(())
}

/// Build the local case tree for every feature file under `root`.
pub fn build_local_tree(root: &Path, config: &SyncConfig) -> Result<Tree, SyncError> {
    let mut tree = Tree::new(CaseNode::repository_root());
    for (relative, absolute) in find_feature_files(root)? {
        add_branch(&mut tree, &relative, &absolute, config)?;
    }
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const LOGIN_FEATURE: &str = "\
Feature: Login

  Background:
    Given a registered user

  Scenario: Successful login
    When the user signs in
    Then the dashboard is shown

  Scenario Outline: Failed login
    When the user signs in with <password>
    Then an error is shown

    Examples:
      | password |
      | wrong    |
      | empty    |
";

    fn write_feature(dir: &Path, relative: &str, content: &str) -> PathBuf {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_find_feature_files_is_sorted_and_relative() {
        let temp_dir = TempDir::new().unwrap();
        write_feature(temp_dir.path(), "b/second.feature", "Feature: B\n");
        write_feature(temp_dir.path(), "a/first.feature", "Feature: A\n");
        write_feature(temp_dir.path(), "a/notes.txt", "not a feature");

        let files = find_feature_files(temp_dir.path()).unwrap();
        let relative: Vec<&Path> = files.iter().map(|(rel, _)| rel.as_path()).collect();
        assert_eq!(
            relative,
            vec![Path::new("a/first.feature"), Path::new("b/second.feature")]
        );
    }

    #[test]
    fn test_parse_feature_file_yields_one_record_per_scenario() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_feature(temp_dir.path(), "login.feature", LOGIN_FEATURE);

        let records = parse_feature_file(&path, false).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Successful login");
        assert_eq!(records[1].name, "Failed login");
    }

    #[test]
    fn test_description_composes_keyword_steps_and_examples() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_feature(temp_dir.path(), "login.feature", LOGIN_FEATURE);

        let records = parse_feature_file(&path, false).unwrap();
        let description = records[1].attributes.description.clone().unwrap();
        assert!(description.contains("**Scenario Outline**"));
        assert!(description.contains("**When** the user signs in with <password>"));
        assert!(description.contains("password"));
        assert!(description.contains("wrong"));
    }

    #[test]
    fn test_background_is_prepended_to_every_case() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_feature(temp_dir.path(), "login.feature", LOGIN_FEATURE);

        let records = parse_feature_file(&path, false).unwrap();
        for record in &records {
            let description = record.attributes.description.clone().unwrap();
            assert!(description.starts_with("**Background**"));
            assert!(description.contains("**Given** a registered user"));
        }
    }

    #[test]
    fn test_unparseable_file_is_fatal_by_default() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_feature(temp_dir.path(), "broken.feature", "not gherkin at all");

        let result = parse_feature_file(&path, false);
        assert!(matches!(result, Err(SyncError::Parse { .. })));
    }

    #[test]
    fn test_unparseable_file_is_skipped_when_configured() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_feature(temp_dir.path(), "broken.feature", "not gherkin at all");

        let records = parse_feature_file(&path, true).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_build_local_tree_creates_directory_and_file_suites() {
        let temp_dir = TempDir::new().unwrap();
        write_feature(temp_dir.path(), "auth/login.feature", LOGIN_FEATURE);

        let tree = build_local_tree(temp_dir.path(), &SyncConfig::default()).unwrap();
        assert!(tree.get_by_key("auth").is_some());
        assert!(tree.get_by_key("auth/login").is_some());
        assert!(tree.get_by_key("auth/login::Successful login").is_some());
        assert!(tree.get_by_key("auth/login::Failed login").is_some());

        let auth = tree.get_by_key("auth").unwrap();
        assert_eq!(tree.node(auth).parent(), Some(tree.root()));
    }

    #[test]
    fn test_build_local_tree_shares_directory_suites_between_files() {
        let temp_dir = TempDir::new().unwrap();
        write_feature(temp_dir.path(), "auth/login.feature", "Feature: Login\n\n  Scenario: A\n    Given a\n");
        write_feature(temp_dir.path(), "auth/logout.feature", "Feature: Logout\n\n  Scenario: B\n    Given b\n");

        let tree = build_local_tree(temp_dir.path(), &SyncConfig::default()).unwrap();
        let auth = tree.get_by_key("auth").unwrap();
        assert_eq!(tree.node(auth).children().len(), 2);
    }
}
