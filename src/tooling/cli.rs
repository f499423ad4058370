//! Suitesync CLI - render, diff and push case trees.
//!
//! Every command handler returns its formatted output as a string; the
//! binary prints it. Remote commands merge their arguments over the loaded
//! base configuration before building trees.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::service::qase::QaseClient;
use crate::service;
use crate::source;
use crate::sync;
use crate::tree::diff::{diff_trees, flat_diff_trees, render_operations};
use crate::tree::Tree;

/// Suitesync CLI - parse .feature files and sync them to the remote service
#[derive(Parser)]
#[command(name = "suitesync")]
#[command(about = "Sync Gherkin feature files to a remote test case management service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Be verbose (info-level logging)
    #[arg(short, long)]
    pub verbose: bool,

    /// Print lots of debugging statements
    #[arg(short, long)]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render the local case tree
    RenderLocal {
        /// Path to the directory containing .feature files
        path: PathBuf,
        /// Node attribute to render (name, key, path)
        #[arg(short, long, default_value = "name")]
        attr: String,
        /// Strip quotes and extra spaces from scenario titles
        #[arg(short, long)]
        strip_titles: bool,
        /// Exit when a .feature file cannot be parsed
        #[arg(short, long)]
        exit_on_empty_files: bool,
    },
    /// Render the remote case tree
    RenderRemote {
        /// API token
        #[arg(short, long)]
        token: Option<String>,
        /// Code of the target project
        #[arg(short = 'c', long)]
        project_code: Option<String>,
        /// ID of the remote suite the tree is rooted at
        #[arg(short = 'i', long)]
        root_suite_id: Option<u64>,
        /// Node attribute to render (name, key, path)
        #[arg(short, long, default_value = "name")]
        attr: String,
    },
    /// Render the merged tree annotated with reconciliation actions
    RenderDiff {
        /// Path to the directory containing .feature files
        path: PathBuf,
        /// API token
        #[arg(short, long)]
        token: Option<String>,
        /// Code of the target project
        #[arg(short = 'c', long)]
        project_code: Option<String>,
        /// ID of the remote suite the tree is rooted at
        #[arg(short = 'i', long)]
        root_suite_id: Option<u64>,
        /// Node attribute to render (name, key, path)
        #[arg(short, long, default_value = "name")]
        attr: String,
        /// Strip quotes and extra spaces from scenario titles
        #[arg(short, long)]
        strip_titles: bool,
        /// Exit when a .feature file cannot be parsed
        #[arg(short, long)]
        exit_on_empty_files: bool,
    },
    /// List reconciliation operations without building a merged tree
    RenderFlatDiff {
        /// Path to the directory containing .feature files
        path: PathBuf,
        /// API token
        #[arg(short, long)]
        token: Option<String>,
        /// Code of the target project
        #[arg(short = 'c', long)]
        project_code: Option<String>,
        /// ID of the remote suite the tree is rooted at
        #[arg(short = 'i', long)]
        root_suite_id: Option<u64>,
        /// Node attribute to render (name, key, path)
        #[arg(short, long, default_value = "name")]
        attr: String,
        /// Strip quotes and extra spaces from scenario titles
        #[arg(short, long)]
        strip_titles: bool,
        /// Exit when a .feature file cannot be parsed
        #[arg(short, long)]
        exit_on_empty_files: bool,
    },
    /// Push local changes to the remote service
    Push {
        /// Path to the directory containing .feature files
        path: PathBuf,
        /// API token
        #[arg(short, long)]
        token: Option<String>,
        /// Code of the target project
        #[arg(short = 'c', long)]
        project_code: Option<String>,
        /// ID of the remote suite the tree is rooted at
        #[arg(short = 'i', long)]
        root_suite_id: Option<u64>,
        /// Path to a JSON file with default custom field values
        #[arg(short = 'f', long)]
        custom_fields_path: Option<PathBuf>,
        /// Print intended operations instead of calling the service
        #[arg(long)]
        dry_run: bool,
        /// Strip quotes and extra spaces from scenario titles
        #[arg(short, long)]
        strip_titles: bool,
        /// Exit when a .feature file cannot be parsed
        #[arg(short, long)]
        exit_on_empty_files: bool,
    },
    /// Delete the whole remote tree under the root suite
    DeleteRemote {
        /// API token
        #[arg(short, long)]
        token: Option<String>,
        /// Code of the target project
        #[arg(short = 'c', long)]
        project_code: Option<String>,
        /// ID of the remote suite the tree is rooted at
        #[arg(short = 'i', long)]
        root_suite_id: Option<u64>,
        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

/// CLI context holding the loaded base configuration.
pub struct CliContext {
    config: SyncConfig,
}

impl CliContext {
    pub fn new(config: SyncConfig) -> Self {
        CliContext { config }
    }

    /// Execute a CLI command and return its rendered output.
    pub fn execute(&self, command: &Commands) -> Result<String, SyncError> {
        match command {
            Commands::RenderLocal {
                path,
                attr,
                strip_titles,
                exit_on_empty_files,
            } => {
                let config = self.scan_config(*strip_titles, *exit_on_empty_files);
                let tree = source::build_local_tree(path, &config)?;
                Ok(tree.render(attr.parse()?, false))
            }
            Commands::RenderRemote {
                token,
                project_code,
                root_suite_id,
                attr,
            } => {
                let config = self.remote_config(token, project_code, *root_suite_id);
                let tree = self.fetch_remote_tree(&config)?;
                Ok(tree.render(attr.parse()?, false))
            }
            Commands::RenderDiff {
                path,
                token,
                project_code,
                root_suite_id,
                attr,
                strip_titles,
                exit_on_empty_files,
            } => {
                let mut config = self.remote_config(token, project_code, *root_suite_id);
                config = merge_scan_flags(config, *strip_titles, *exit_on_empty_files);
                let local = source::build_local_tree(path, &config)?;
                let remote = self.fetch_remote_tree(&config)?;
                let merged = diff_trees(&local, &remote, &config.custom_field_defaults);
                Ok(merged.render(attr.parse()?, true))
            }
            Commands::RenderFlatDiff {
                path,
                token,
                project_code,
                root_suite_id,
                attr,
                strip_titles,
                exit_on_empty_files,
            } => {
                let mut config = self.remote_config(token, project_code, *root_suite_id);
                config = merge_scan_flags(config, *strip_titles, *exit_on_empty_files);
                let local = source::build_local_tree(path, &config)?;
                let remote = self.fetch_remote_tree(&config)?;
                let operations = flat_diff_trees(&local, &remote);
                Ok(render_operations(&operations, attr.parse()?))
            }
            Commands::Push {
                path,
                token,
                project_code,
                root_suite_id,
                custom_fields_path,
                dry_run,
                strip_titles,
                exit_on_empty_files,
            } => {
                let mut config = self.remote_config(token, project_code, *root_suite_id);
                config = merge_scan_flags(config, *strip_titles, *exit_on_empty_files);
                if let Some(fields_path) = custom_fields_path {
                    config.load_custom_field_defaults(fields_path)?;
                }
                let root_suite_id = config.root_suite_id.ok_or_else(|| {
                    SyncError::Config(
                        "root suite id is required for push (use --root-suite-id)".to_string(),
                    )
                })?;

                let client = QaseClient::new(&config)?;
                let local = source::build_local_tree(path, &config)?;
                let remote = service::build_remote_tree(
                    &client,
                    config.root_suite_id,
                    &config.custom_field_defaults,
                    config.page_size,
                )?;
                let mut merged = diff_trees(&local, &remote, &config.custom_field_defaults);
                let report = sync::push(&mut merged, &client, root_suite_id, *dry_run)?;

                if *dry_run {
                    Ok(report.operations.join("\n"))
                } else {
                    Ok(report.summary())
                }
            }
            Commands::DeleteRemote {
                token,
                project_code,
                root_suite_id,
                force,
            } => {
                let config = self.remote_config(token, project_code, *root_suite_id);
                if !*force && !confirm_remote_deletion(&config)? {
                    return Ok("Deletion cancelled".to_string());
                }
                let client = QaseClient::new(&config)?;
                let mut tree = service::build_remote_tree(
                    &client,
                    config.root_suite_id,
                    &config.custom_field_defaults,
                    config.page_size,
                )?;
                let deleted = sync::delete_remotely(&mut tree, &client)?;
                Ok(format!("Deleted {deleted} remote nodes"))
            }
        }
    }

    fn fetch_remote_tree(&self, config: &SyncConfig) -> Result<Tree, SyncError> {
        let client = QaseClient::new(config)?;
        service::build_remote_tree(
            &client,
            config.root_suite_id,
            &config.custom_field_defaults,
            config.page_size,
        )
    }

    fn scan_config(&self, strip_titles: bool, exit_on_empty_files: bool) -> SyncConfig {
        merge_scan_flags(self.config.clone(), strip_titles, exit_on_empty_files)
    }

    fn remote_config(
        &self,
        token: &Option<String>,
        project_code: &Option<String>,
        root_suite_id: Option<u64>,
    ) -> SyncConfig {
        let mut config = self.config.clone();
        if let Some(token) = token {
            config.api_token = token.clone();
        }
        if let Some(code) = project_code {
            config.project_code = code.clone();
        }
        if let Some(id) = root_suite_id {
            config.root_suite_id = Some(id);
        }
        config
    }
}

fn merge_scan_flags(
    mut config: SyncConfig,
    strip_titles: bool,
    exit_on_empty_files: bool,
) -> SyncConfig {
    config.strip_titles = config.strip_titles || strip_titles;
    if exit_on_empty_files {
        config.skip_unparsable = false;
    }
    config
}

fn confirm_remote_deletion(config: &SyncConfig) -> Result<bool, SyncError> {
    let target = match config.root_suite_id {
        Some(id) => format!("suite {id}"),
        None => "the whole project".to_string(),
    };
    dialoguer::Confirm::new()
        .with_prompt(format!(
            "Delete every remote suite and case under {target}?"
        ))
        .default(false)
        .interact()
        .map_err(|err| SyncError::Config(format!("failed to get user input: {err}")))
}
