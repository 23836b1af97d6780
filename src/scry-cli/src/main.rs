//! Scry - command-line search over a local tree and an object store.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use scry_search::{SearchEngine, SearchOutcome, SearchQuery};

mod cli;
mod settings;

use cli::{Cli, Command, SearchArgs};
use settings::{Settings, parse_datetime};

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(&cli.log_level, cli.json_logs);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    settings.apply_env()?;
    settings.apply_flags(cli.root.clone(), cli.bucket_dir.clone());
    let engine = settings.engine();

    match cli.command {
        Command::Search(args) => search(&engine, args, cli.json).await,
        Command::Resolve { key } => {
            let (cancel, interrupt) = cancel_on_interrupt();
            let candidates = engine.resolve_key_with_cancel(&key, cancel).await;
            interrupt.abort();
            let candidates = candidates?;
            if cli.json {
                print_json(&candidates)
            } else {
                if candidates.is_empty() {
                    eprintln!("no candidates for '{key}'");
                }
                for candidate in candidates {
                    println!("{}\t{:?}", candidate.key, candidate.reason);
                }
                Ok(())
            }
        }
        Command::Get { key, output, resolve } => {
            let fetched = engine.actions()?.fetch(&key, resolve.policy()).await?;
            info!("Fetched '{}' ({} bytes)", fetched.key, fetched.bytes.len());
            match output {
                Some(path) => std::fs::write(&path, &fetched.bytes)
                    .with_context(|| format!("writing {}", path.display())),
                None => std::io::stdout()
                    .write_all(&fetched.bytes)
                    .context("writing to stdout"),
            }
        }
        Command::Put {
            file,
            to,
            name,
            overwrite,
        } => {
            let name = match name {
                Some(name) => name,
                None => upload_name(&file)?,
            };
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let key = engine.actions()?.upload(&to, &name, bytes.into(), overwrite).await?;
            if cli.json {
                print_json(&serde_json::json!({ "uploaded": key }))
            } else {
                println!("uploaded {key}");
                Ok(())
            }
        }
        Command::Mv {
            key,
            new_name,
            resolve,
        } => {
            let outcome = engine.actions()?.rename(&key, &new_name, resolve.policy()).await?;
            if cli.json {
                print_json(&outcome)
            } else {
                println!("{} -> {}", outcome.from, outcome.to);
                Ok(())
            }
        }
        Command::Rm { key, resolve } => {
            let deleted = engine.actions()?.delete(&key, resolve.policy()).await?;
            if cli.json {
                print_json(&serde_json::json!({ "deleted": deleted }))
            } else {
                println!("deleted {deleted}");
                Ok(())
            }
        }
    }
}

fn build_query(args: SearchArgs) -> anyhow::Result<SearchQuery> {
    let mut query = SearchQuery::new(args.text)
        .search_type(args.search_type.into())
        .sources(args.source.into_iter().map(Into::into))
        .case_sensitive(args.case_sensitive)
        .regex(args.regex)
        .folders(!args.no_folders)
        .include_hidden(args.hidden)
        .extensions(args.extensions)
        .want_preview(args.preview)
        .search_path(args.path);

    if args.min_size.is_some() || args.max_size.is_some() {
        query = query.size_range(args.min_size, args.max_size);
    }
    if args.after.is_some() || args.before.is_some() {
        let after = args.after.as_deref().map(parse_datetime).transpose()?;
        let before = args.before.as_deref().map(parse_datetime).transpose()?;
        query = query.modified_range(after, before);
    }
    if let Some(limit) = args.limit {
        query = query.max_results(limit);
    }
    if let Some(secs) = args.timeout {
        query = query.deadline(Duration::from_secs(secs));
    }
    Ok(query)
}

async fn search(engine: &SearchEngine, args: SearchArgs, json: bool) -> anyhow::Result<()> {
    let query = build_query(args)?;

    let (cancel, interrupt) = cancel_on_interrupt();
    let outcome = engine.search_with_cancel(&query, cancel).await;
    interrupt.abort();
    let outcome = outcome?;

    if json {
        return print_json(&serde_json::json!({
            "outcome": outcome,
            "extension_breakdown": outcome.extension_breakdown(),
        }));
    }
    print_outcome(&outcome);
    Ok(())
}

/// A token cancelled by Ctrl-C; abort the handle once the work is done.
fn cancel_on_interrupt() -> (CancellationToken, JoinHandle<()>) {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, returning partial results");
            on_interrupt.cancel();
        }
    });
    (cancel, interrupt)
}

fn upload_name(file: &Path) -> anyhow::Result<String> {
    file.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name; pass --name", file.display()))
}

fn print_outcome(outcome: &SearchOutcome) {
    for result in &outcome.results {
        let record = &result.record;
        match result.match_count {
            Some(count) => println!("{}\t{}\t{} matches", record.source, record.path, count),
            None => println!("{}\t{}", record.source, record.path),
        }
        if let Some(preview) = &result.preview {
            println!("\t{preview}");
        }
    }

    for failure in &outcome.failures {
        eprintln!("warning: {} source: {}", failure.source, failure.message);
    }
    eprintln!(
        "{} results ({} local, {} remote) from {} scanned{}{}",
        outcome.results.len(),
        outcome.per_source_counts.local,
        outcome.per_source_counts.remote,
        outcome.total_scanned,
        if outcome.truncated { ", truncated" } else { "" },
        if outcome.partial { ", partial" } else { "" },
    );
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
