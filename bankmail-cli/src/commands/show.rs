//! Show command - one stored transaction

use anyhow::{bail, Result};
use bankmail_core::TransactionId;
use colored::Colorize;

use super::get_context;
use crate::output::create_table;

pub fn run(id: &str, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let id = TransactionId::parse(id)?;

    let Some(tx) = ctx.transaction_service.get(&id)? else {
        bail!("Transaction not found: {}", id);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&tx)?);
        return Ok(());
    }

    println!("{}", tx.business.bold());
    let mut table = create_table();
    table.add_row(vec!["ID".to_string(), tx.id.to_string()]);
    table.add_row(vec!["Date".to_string(), tx.timestamp.to_rfc3339()]);
    table.add_row(vec![
        "Bank".to_string(),
        format!("{} <{}>", tx.bank_name, tx.bank_email),
    ]);
    table.add_row(vec![
        "Amount".to_string(),
        format!("{} {}", tx.amount, tx.currency_code),
    ]);
    if let Some(kind) = &tx.business_type {
        table.add_row(vec!["Business type".to_string(), kind.clone()]);
    }
    if let Some(priority) = tx.priority {
        table.add_row(vec!["Priority".to_string(), priority.as_str().to_string()]);
    }
    if let Some(category) = tx.category {
        table.add_row(vec!["Category".to_string(), category.as_str().to_string()]);
    }
    table.add_row(vec!["Stored".to_string(), tx.created_at.to_rfc3339()]);
    println!("{}", table);

    Ok(())
}
