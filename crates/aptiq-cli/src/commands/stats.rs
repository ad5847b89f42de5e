//! The `aptiq stats` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let (_, service) = super::build_service(config_path.as_deref())?;
    service.seed_if_empty().await;

    let stats = service.get_question_stats().await;
    println!("Total questions: {}", stats.total);

    let mut table = Table::new();
    table.set_header(vec!["Category", "Questions"]);
    for (category, count) in &stats.by_category {
        table.add_row(vec![Cell::new(category), Cell::new(count)]);
    }
    println!("\n{table}");

    let mut table = Table::new();
    table.set_header(vec!["Difficulty", "Questions"]);
    for (difficulty, count) in &stats.by_difficulty {
        table.add_row(vec![Cell::new(difficulty), Cell::new(count)]);
    }
    println!("\n{table}");

    Ok(())
}
