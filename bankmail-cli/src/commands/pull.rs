//! Pull command - ingest bank notifications from the email reader

use anyhow::{bail, Result};
use bankmail_core::{IngestionOutcome, IngestionStatus, PullOptions, SourceStatus};
use clap::Args;
use colored::Colorize;

use super::{date_range, get_context};
use crate::output::{self, create_spinner, create_table, format_elapsed};

#[derive(Args, Debug)]
pub struct PullArgs {
    /// Only messages received on or after this date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub start: Option<String>,
    /// Only messages received on or before this date
    #[arg(long)]
    pub end: Option<String>,
    /// Source id to pull (repeatable; all sources if omitted)
    #[arg(long = "source")]
    pub sources: Vec<String>,
    /// Messages per page requested from the email reader
    #[arg(long)]
    pub page_size: Option<u32>,
    /// Concurrent page fetches per source
    #[arg(long)]
    pub threads: Option<usize>,
    /// Show what would be stored without writing anything
    #[arg(long)]
    pub dry_run: bool,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: PullArgs) -> Result<()> {
    let ctx = get_context()?;
    let range = date_range(args.start.as_deref(), args.end.as_deref())?;

    let service = ctx.ingestion_service(&PullOptions {
        page_size: args.page_size,
        thread_count: args.threads,
        dry_run: args.dry_run,
    })?;

    let spinner = (!args.json).then(|| create_spinner("Pulling bank notifications..."));
    let result = if args.sources.is_empty() {
        Ok(service.run(&range))
    } else {
        service.run_only(&range, &args.sources)
    };
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let outcome = result?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        if args.dry_run {
            println!("{}", "DRY RUN - No changes applied".yellow());
            println!();
        }
        print_outcome(&outcome, args.dry_run);
    }

    if outcome.status == IngestionStatus::Failed {
        bail!("No source could be read from the email reader");
    }
    Ok(())
}

fn print_outcome(outcome: &IngestionOutcome, dry_run: bool) {
    let mut table = create_table();
    table.set_header(vec![
        "Source", "Status", "Found", "New", "Existing", "Skipped", "Errors", "Fetches",
    ]);
    for report in &outcome.sources {
        let status = match report.status {
            SourceStatus::Fetched if report.missing_pages.is_empty() => "fetched".to_string(),
            SourceStatus::Fetched => format!("partial ({} pages missing)", report.missing_pages.len()),
            SourceStatus::NoContent => "no content".to_string(),
            SourceStatus::Failed => "failed".to_string(),
        };
        table.add_row(vec![
            report.source.clone(),
            status,
            report.total_items.to_string(),
            report.new.to_string(),
            report.existing.to_string(),
            report.skipped.to_string(),
            (report.parse_errors + report.persist_errors).to_string(),
            report.fetch_calls.to_string(),
        ]);
    }
    println!("{}", table);
    println!();

    for message in &outcome.messages {
        println!("  {}", message);
    }
    println!();

    match outcome.status {
        IngestionStatus::NothingFound => output::warning("No transactions found."),
        IngestionStatus::Failed => output::warning("No transactions retrieved."),
        IngestionStatus::Completed => {
            let verb = if dry_run { "Would store" } else { "Stored" };
            output::success(&format!(
                "{} {} new transaction(s); {} already existed ({} found in {})",
                verb,
                outcome.new_entries.len(),
                outcome.existing_entries.len(),
                outcome.total_found,
                format_elapsed(outcome.elapsed)
            ));
        }
    }

    let failed = outcome.parse_errors() + outcome.persist_errors();
    if failed > 0 {
        output::warning(&format!(
            "{} message(s) could not be stored; rerun with -v for details",
            failed
        ));
    }
    output::info(&format!("Run id: {}", outcome.run_id));
}
