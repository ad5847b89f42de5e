//! The `aptiq seed` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let (config, service) = super::build_service(config_path.as_deref())?;

    let inserted = service
        .try_seed_if_empty()
        .await
        .context("seeding failed")?;
    let total = service.get_question_stats().await.total;

    if inserted == 0 {
        println!("Question bank already seeded ({total} questions).");
    } else {
        println!(
            "Seeded {inserted} questions into {}.",
            config.storage.path.display()
        );
    }

    Ok(())
}
