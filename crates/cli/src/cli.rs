use clap::{Args, Parser, Subcommand};
use keyhint_index::ScopeId;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "keyhint")]
#[command(about = "Autocomplete index for configuration property keys", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Project description (modules and their classpath roots)
    #[arg(long, short, global = true, default_value = "keyhint.toml")]
    pub config: PathBuf,

    /// Emit machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Index every module and report what changed
    Index,
    /// Suggest keys (or allowed values) for a partially typed key
    Suggest(SuggestArgs),
    /// Show the entry at an exact key
    Lookup(LookupArgs),
    /// Show index sizes per scope
    Stats,
    /// Keep the index current and report every reindex until interrupted
    Watch,
}

#[derive(Args, Debug)]
pub struct ScopeArgs {
    /// Module to query (whole project when omitted)
    #[arg(long, short)]
    pub module: Option<String>,
}

impl ScopeArgs {
    pub fn scope(&self) -> ScopeId {
        self.module
            .as_ref()
            .map_or(ScopeId::Project, |name| ScopeId::module(name.clone()))
    }
}

#[derive(Args, Debug)]
pub struct SuggestArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Enclosing key, outermost first; repeat for each nesting level
    #[arg(long = "ancestor", short = 'a', value_name = "KEY")]
    pub ancestors: Vec<String>,

    /// Partially typed key or value
    #[arg(default_value = "")]
    pub query: String,
}

#[derive(Args, Debug)]
pub struct LookupArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Key segments (dotted keys are split)
    #[arg(value_name = "KEY", required = true)]
    pub keys: Vec<String>,
}
