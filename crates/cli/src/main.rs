//! Keyhint command-line interface
//!
//! Indexes the configuration metadata found on a project's classpath and
//! answers autocomplete queries against it.
//!
//! ## Usage
//!
//! ```text
//! keyhint index
//! keyhint suggest --ancestor server po
//! keyhint lookup --module app spring.datasource.url
//! keyhint stats --json
//! keyhint watch
//! ```

mod cli;
mod output;
mod project;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command, LookupArgs, SuggestArgs};
use keyhint_index::{
    BackgroundIndexer, ClasspathEnvironment, ClasspathWatcher, IndexConfig, IndexCoordinator,
    ReindexTarget,
};
use project::ProjectConfig;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let project = ProjectConfig::load(&cli.config)?;
    let config = project.index_config();
    let environment: Arc<dyn ClasspathEnvironment> = Arc::new(project.classpath(config.clone()));
    let coordinator = Arc::new(IndexCoordinator::new(environment));

    match &cli.command {
        Command::Index => index(&coordinator, cli.json),
        Command::Suggest(args) => suggest(&coordinator, args, cli.json),
        Command::Lookup(args) => lookup(&coordinator, args, cli.json),
        Command::Stats => stats(&coordinator, cli.json),
        Command::Watch => watch(coordinator, &config, cli.json).await,
    }
}

fn index(coordinator: &IndexCoordinator, json: bool) -> Result<()> {
    let stats = coordinator
        .reindex_now(&ReindexTarget::All)
        .context("Indexing failed")?;
    if json {
        output::print_json(&stats)
    } else {
        println!("{}", output::render_index_stats(&stats));
        Ok(())
    }
}

fn suggest(coordinator: &IndexCoordinator, args: &SuggestArgs, json: bool) -> Result<()> {
    coordinator
        .reindex_now(&ReindexTarget::All)
        .context("Indexing failed")?;

    let ancestors: Vec<&str> = args.ancestors.iter().map(String::as_str).collect();
    let ancestors = (!ancestors.is_empty()).then_some(ancestors.as_slice());
    let suggestions = coordinator.compute_suggestions(&args.scope.scope(), ancestors, &args.query);

    if json {
        output::print_json(&suggestions)
    } else {
        println!("{}", output::render_suggestions(suggestions.as_deref()));
        Ok(())
    }
}

fn lookup(coordinator: &IndexCoordinator, args: &LookupArgs, json: bool) -> Result<()> {
    coordinator
        .reindex_now(&ReindexTarget::All)
        .context("Indexing failed")?;

    let keys: Vec<&str> = args.keys.iter().map(String::as_str).collect();
    let info = coordinator.find_deepest_exact_match(&args.scope.scope(), &keys);

    if json {
        output::print_json(&info)
    } else {
        println!("{}", output::render_lookup(info.as_ref()));
        Ok(())
    }
}

fn stats(coordinator: &IndexCoordinator, json: bool) -> Result<()> {
    coordinator
        .reindex_now(&ReindexTarget::All)
        .context("Indexing failed")?;

    let stats = coordinator.scope_stats();
    if json {
        let named: Vec<_> = stats
            .iter()
            .map(|(scope, stats)| serde_json::json!({ "scope": scope, "stats": stats }))
            .collect();
        output::print_json(&named)
    } else {
        println!("{}", output::render_scope_stats(&stats));
        Ok(())
    }
}

async fn watch(coordinator: Arc<IndexCoordinator>, config: &IndexConfig, json: bool) -> Result<()> {
    let indexer = BackgroundIndexer::start(coordinator, config);
    let watcher = ClasspathWatcher::start(&indexer, config)?;
    log::info!("Watching {} classpath location(s)", watcher.watched_paths().len());

    let mut updates = indexer.subscribe_updates();
    indexer.request(ReindexTarget::All, "startup").await?;

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(update) => {
                    if json {
                        println!("{}", serde_json::to_string(&update)?);
                    } else {
                        println!("{}", output::render_update(&update));
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("Missed {skipped} index update(s)");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted; stopping");
                break;
            }
        }
    }
    Ok(())
}
