mod cli;
mod logging;
mod reporter;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use colored::*;
use dotenv::dotenv;
use past_files::config::{self, AppConfig};
use past_files::model::InstanceRecord;
use past_files::platform;
use past_files::storage::Database;
use past_files::ScanEngine;
use reporter::CliReporter;
use std::path::Path;
use std::process;
use tracing::{error, info};

fn main() -> Result<()> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let mut config = match config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();
    if let Some(db) = args.db {
        config.database_path = db;
    }

    match args.command {
        Some(Commands::Scan {
            roots,
            ignore,
            sequential,
        }) => {
            if !roots.is_empty() {
                config.root_paths = roots;
            }
            config.ignore_patterns.extend(ignore);
            if sequential {
                config.parallel = false;
            }
            run_scan(config)?;
        }
        Some(Commands::Status) => run_status(&config)?,
        Some(Commands::History { path }) => run_history(&config, &path)?,
        Some(Commands::Content { hash }) => run_content(&config, &hash)?,
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:#?}", config);
        }
        None => {
            let _ = Cli::command().print_long_help();
        }
    }

    Ok(())
}

fn open_database(config: &AppConfig) -> Result<Database> {
    Database::open(&config.database_path)
        .with_context(|| format!("opening tracking database {}", config.database_path))
}

fn run_scan(config: AppConfig) -> Result<()> {
    let engine = ScanEngine::new(config);
    let reporter = CliReporter::new();
    let result = engine.scan_with_progress(&reporter)?;
    let stats = result.stats;

    println!();
    info!(
        "Scanned {} files under {} roots in {}",
        format!("{}", stats.files_seen).cyan(),
        result.roots.len(),
        format!("{:.2}s", result.duration.as_secs_f64()).green(),
    );
    info!(
        "{} new ({} duplicates), {} updated ({} renamed, {} moved, {} edited), {} unchanged",
        format!("{}", stats.created).green(),
        stats.duplicates,
        format!("{}", stats.updated).yellow(),
        stats.renamed,
        stats.moved,
        stats.content_changed,
        stats.unchanged,
    );
    if stats.skipped + stats.failed + stats.anomalies > 0 {
        info!(
            "{} skipped, {} failed, {} anomalies",
            format!("{}", stats.skipped).yellow(),
            format!("{}", stats.failed).red(),
            format!("{}", stats.anomalies).red(),
        );
    }
    info!(
        "{} commits, {} failed commits",
        result.commits,
        format!("{}", result.failed_commits).red()
    );
    if !result.completed {
        error!("Scan did not complete: final commit failed");
        process::exit(2);
    }

    Ok(())
}

fn run_status(config: &AppConfig) -> Result<()> {
    let mut db = open_database(config)?;
    let metadata = db.scan_metadata()?;
    let counts = db.counts()?;

    match metadata.last_scan_start_time {
        Some(started) => println!(
            "Last scan started {} ({})",
            started.format("%Y-%m-%d %H:%M:%S UTC"),
            if metadata.last_scan_completed {
                "completed".green()
            } else {
                "incomplete".red()
            }
        ),
        None => println!("No scan recorded yet"),
    }
    println!("Contents:          {}", counts.contents);
    println!("Instances:         {}", counts.instances);
    println!("Location entries:  {}", counts.location_entries);
    println!("Name entries:      {}", counts.name_entries);
    Ok(())
}

fn run_history(config: &AppConfig, path: &Path) -> Result<()> {
    let provider = platform::default_identity_provider();
    let key = provider.identity_of(path)?;
    let mut db = open_database(config)?;

    let Some(instance) = db.find_instance(&key)? else {
        println!("{} is not tracked yet ({})", path.display(), key);
        return Ok(());
    };

    println!("{} {}", "Instance".bold(), instance.id);
    println!("  identity:   {}", key);
    println!("  path:       {}", instance.current_path);
    println!(
        "  first seen: {}",
        instance.first_seen_instance.format("%Y-%m-%d %H:%M:%S")
    );
    println!(
        "  last seen:  {}",
        instance.last_seen_instance.format("%Y-%m-%d %H:%M:%S")
    );

    println!("{}", "Names".bold());
    for entry in &instance.name_history {
        println!(
            "  {}  {}",
            entry.change_noticed_time.format("%Y-%m-%d %H:%M:%S"),
            entry.file_name
        );
    }
    println!("{}", "Locations".bold());
    for entry in &instance.location_history {
        println!(
            "  {}  {}",
            entry.change_noticed_time.format("%Y-%m-%d %H:%M:%S"),
            entry.directory_path
        );
    }

    if let Some(content) = db.content_by_id(instance.content_id)? {
        println!("{} {} ({} bytes)", "Content".bold(), content.hash, content.size);
        let others: Vec<InstanceRecord> = db
            .instances_with_content(content.id)?
            .into_iter()
            .filter(|other| other.id != instance.id)
            .collect();
        if others.is_empty() {
            println!("  no other copies");
        }
        for other in others {
            println!("  also at {}", other.current_path.yellow());
        }
    }
    Ok(())
}

fn run_content(config: &AppConfig, hash: &str) -> Result<()> {
    let mut db = open_database(config)?;
    let Some(content) = db.content_by_hash(hash)? else {
        println!("Unknown content {}", hash);
        return Ok(());
    };

    println!(
        "{} {} ({} bytes, first seen {}, last seen {})",
        "Content".bold(),
        content.hash,
        content.size,
        content.first_seen_global.format("%Y-%m-%d %H:%M:%S"),
        content.last_seen_global.format("%Y-%m-%d %H:%M:%S")
    );
    for instance in db.instances_with_content(content.id)? {
        println!("  {}  {}", instance.id, instance.current_path);
    }
    Ok(())
}
