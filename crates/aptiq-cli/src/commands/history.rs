//! The `aptiq history` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

pub async fn execute(
    config_path: Option<PathBuf>,
    user: String,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let (_, service) = super::build_service(config_path.as_deref())?;
    let limit = limit.unwrap_or(service.config().history_limit);

    let history = service.get_user_quiz_history(&user, limit).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    if history.is_empty() {
        println!("No completed sessions for {user}.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "#",
        "Started",
        "Questions",
        "Correct",
        "Accuracy",
        "Score",
    ]);
    for archived in &history {
        let session = &archived.session;
        table.add_row(vec![
            Cell::new(archived.seq),
            Cell::new(session.started_at.format("%Y-%m-%d %H:%M")),
            Cell::new(session.questions.len()),
            Cell::new(session.correct_count()),
            Cell::new(format!("{:.1}%", session.accuracy() * 100.0)),
            Cell::new(session.display_score()),
        ]);
    }
    println!("Recent sessions for {user}:\n{table}");

    let summary = service.get_user_summary(&user).await;
    println!(
        "\n{} session(s), {} questions, {:.1}% correct, best score {}, average {:.1}",
        summary.sessions,
        summary.overall.total,
        summary.accuracy * 100.0,
        summary.best_score,
        summary.average_score
    );

    let mut table = Table::new();
    table.set_header(vec!["Category", "Questions", "Correct", "Timed out", "Accuracy"]);
    for (category, topic) in &summary.by_category {
        table.add_row(vec![
            Cell::new(category),
            Cell::new(topic.total),
            Cell::new(topic.correct),
            Cell::new(topic.timed_out),
            Cell::new(format!("{:.1}%", topic.accuracy() * 100.0)),
        ]);
    }
    println!("\n{table}");

    Ok(())
}
