use std::path::PathBuf;

use clap::Parser;

/// Resolves module versions against a chain of repositories.
#[derive(Debug, Parser)]
#[clap(version)]
pub struct CliArgs {
    #[clap(subcommand)]
    pub cmd: Command,
    /// Configuration file; missing is fine
    #[clap(short, long, default_value = "modresolve.toml")]
    pub config: PathBuf,
    /// Persistent cache location, overriding the configuration
    #[clap(long)]
    pub cache_directory: Option<PathBuf>,
    /// Extra local repository as `name=path`, searched after the configured ones
    #[clap(short, long = "repository")]
    pub repositories: Vec<String>,
}

#[derive(Debug, Parser)]
pub enum Command {
    /// Resolves each `group:name:selector` to a concrete version
    Resolve {
        #[clap(required = true)]
        dependencies: Vec<String>,
        /// Versions matching this selector are never chosen
        #[clap(long)]
        reject: Option<String>,
        /// Consumer attribute as `key=value`
        #[clap(short, long = "attribute")]
        attributes: Vec<String>,
        /// Stop at the first repository offering a match
        #[clap(long)]
        first_match: bool,
        /// Ignore cached repository answers
        #[clap(long)]
        refresh_dependencies: bool,
        /// How many dependencies are resolved at once
        #[clap(short, long, default_value_t = 4)]
        jobs: usize,
    },
    /// Lists the versions each repository offers for `group:name`
    ListVersions { module: String },
    /// Deletes the persistent cache
    ClearCache,
}
