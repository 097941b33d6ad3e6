//! List command - stored transactions, newest day first

use anyhow::{bail, Result};
use bankmail_core::domain::{Page, PageDescriptor};
use bankmail_core::services::PageRequest;
use bankmail_core::{Transaction, TransactionFilter};
use clap::{Args, ValueEnum};
use colored::Colorize;

use super::{date_range, get_context};
use crate::output::{create_table, short_id};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    Table,
    Json,
    Csv,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only transactions on or after this date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub start: Option<String>,
    /// Only transactions on or before this date
    #[arg(long)]
    pub end: Option<String>,
    /// Source id or bank email to filter by
    #[arg(long)]
    pub source: Option<String>,
    /// Page number (1-based)
    #[arg(long, default_value_t = 1)]
    pub page: u32,
    /// Transactions per page
    #[arg(long, default_value_t = 25)]
    pub page_size: u32,
    /// Cursor from a previous listing (overrides --page/--page-size)
    #[arg(long)]
    pub cursor: Option<String>,
    /// Output format
    #[arg(long, value_enum, default_value_t = ListFormat::Table)]
    pub format: ListFormat,
}

pub fn run(args: ListArgs) -> Result<()> {
    let ctx = get_context()?;

    let bank_email = match args.source.as_deref() {
        None => None,
        Some(source) => match ctx.config.source(source) {
            Some(settings) => Some(settings.bank_email.clone()),
            None if source.contains('@') => Some(source.to_string()),
            None => bail!("Unknown source '{}'", source),
        },
    };
    let filter = TransactionFilter {
        date_range: date_range(args.start.as_deref(), args.end.as_deref())?,
        bank_email,
    };

    let request = match args.cursor {
        Some(cursor) => PageRequest::Cursor(cursor),
        None => PageRequest::Page(PageDescriptor::new(args.page, args.page_size)?),
    };
    let page = ctx.transaction_service.list(&filter, &request)?;

    match args.format {
        ListFormat::Json => println!("{}", serde_json::to_string_pretty(&page)?),
        ListFormat::Csv => write_csv(&page.items)?,
        ListFormat::Table => print_table(&page),
    }
    Ok(())
}

fn write_csv(items: &[Transaction]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(std::io::stdout());
    writer.write_record([
        "transaction_id",
        "date",
        "bank",
        "business",
        "business_type",
        "amount",
        "currency",
    ])?;
    for tx in items {
        writer.write_record([
            tx.id.as_str(),
            tx.timestamp.to_rfc3339().as_str(),
            tx.bank_name.as_str(),
            tx.business.as_str(),
            tx.business_type.as_deref().unwrap_or(""),
            tx.amount.to_string().as_str(),
            tx.currency_code.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_table(page: &Page<Transaction>) {
    if page.items.is_empty() {
        println!("{}", "No transactions found.".yellow());
        return;
    }

    let mut table = create_table();
    table.set_header(vec!["ID", "Date", "Bank", "Business", "Amount", "Currency"]);
    for tx in &page.items {
        table.add_row(vec![
            short_id(tx.id.as_str(), 12),
            tx.timestamp.format("%Y-%m-%d %H:%M").to_string(),
            tx.bank_name.clone(),
            tx.business.clone(),
            tx.amount.to_string(),
            tx.currency_code.clone(),
        ]);
    }
    println!("{}", table);

    let meta = &page.pagination;
    println!(
        "Page {} of {} ({} transactions)",
        meta.page,
        meta.total_pages.max(1),
        meta.total_items
    );
    if let Some(next) = &meta.next_cursor {
        println!("Next: bm list --cursor {}", next.dimmed());
    }
}
