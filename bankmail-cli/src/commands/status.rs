//! Status command - stored transaction summary

use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

use super::get_context;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let status = ctx.status_service.get_status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Bankmail Status".bold());
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.add_row(vec!["Transactions".to_string(), status.total_transactions.to_string()]);
    for source in &status.sources {
        table.add_row(vec![
            format!("  {}", source.id),
            source.transactions.to_string(),
        ]);
    }
    println!("{}", table);
    println!();

    if let (Some(earliest), Some(latest)) = (&status.date_range.earliest, &status.date_range.latest) {
        println!("Date range: {} to {}", earliest, latest);
        println!();
    }

    println!("Database: {}", ctx.bankmail_dir.join(bankmail_core::DB_FILENAME).display());

    Ok(())
}
