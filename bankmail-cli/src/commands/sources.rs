//! Sources command - configured bank sources

use anyhow::Result;

use super::get_context;
use crate::output::{self, create_table};

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let config = &ctx.config;

    if json {
        println!("{}", serde_json::to_string_pretty(&config.sources)?);
        return Ok(());
    }

    let mut table = create_table();
    table.set_header(vec!["ID", "Bank", "Senders", "Subject", "Parser"]);
    for source in &config.sources {
        table.add_row(vec![
            source.id.clone(),
            source.bank_name.clone(),
            source.effective_senders().join("\n"),
            source.subject.clone().unwrap_or_else(|| "-".to_string()),
            source.parser.as_str().to_string(),
        ]);
    }
    println!("{}", table);

    output::info(&format!(
        "Email reader: {}/{} (page size {}, {} threads)",
        config.email_reader_url.trim_end_matches('/'),
        config.mailbox,
        config.page_size,
        config.processing_threads
    ));
    Ok(())
}
