//! The `aptiq play` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use aptiq_core::driver::{SessionHandle, SessionOutcome};
use aptiq_core::model::{AnsweredSlot, Category, Difficulty, Question, SessionRecord};
use aptiq_core::session::{AnswerFeedback, Phase};
use aptiq_core::statistics::compute_session_stats;

pub async fn execute(
    config_path: Option<PathBuf>,
    user: String,
    count: usize,
    category: Option<String>,
    difficulty: Option<String>,
    mixed: bool,
) -> Result<()> {
    let category = category
        .map(|c| c.parse::<Category>())
        .transpose()
        .map_err(anyhow::Error::msg)?;
    let difficulty = difficulty
        .map(|d| d.parse::<Difficulty>())
        .transpose()
        .map_err(anyhow::Error::msg)?;

    let (_, service) = super::build_service(config_path.as_deref())?;
    service.seed_if_empty().await;

    let questions = match (category, mixed) {
        (Some(category), _) => {
            service
                .get_questions_by_category(category, difficulty, count)
                .await
        }
        (None, true) => service.get_mixed_questions(count).await,
        (None, false) => service.get_random_questions(count, difficulty).await,
    };
    if questions.len() < count {
        println!(
            "Only {} of {count} requested questions available.",
            questions.len()
        );
    }

    let handle = service
        .start_session(&user, questions)
        .context("no questions to play; check the question bank with `aptiq stats`")?;

    println!(
        "Starting a {}-question quiz for {user}. Enter an option number, or q to quit.",
        handle.questions().len()
    );

    let outcome = run(handle).await?;
    match outcome {
        SessionOutcome::Completed(record) => print_result(&record),
        SessionOutcome::Abandoned => println!("\nSession abandoned; nothing was saved."),
    }

    Ok(())
}

/// Drive the session from stdin until it completes or the user quits.
async fn run(mut handle: SessionHandle) -> Result<SessionOutcome> {
    let mut lines = spawn_stdin_reader();
    let mut presented = None;
    let mut submitted = None;
    let mut revealed = None;

    loop {
        let snapshot = handle.snapshot();
        match snapshot.phase {
            Phase::Presenting(i) => {
                if presented != Some(i) {
                    if let Some(question) = handle.question(i) {
                        print_question(i, snapshot.total_questions, question);
                    }
                    presented = Some(i);
                }

                // Input read now belongs to the next question, so wait for
                // the driver to take the submitted answer first.
                if submitted == Some(i) {
                    if !handle.changed().await {
                        break;
                    }
                    continue;
                }

                tokio::select! {
                    line = lines.recv() => {
                        let Some(line) = line else {
                            handle.abandon();
                            break;
                        };
                        let line = line?;
                        let input = line.trim();
                        if input.eq_ignore_ascii_case("q") {
                            handle.abandon();
                            break;
                        }
                        let options = handle.question(i).map_or(0, |q| q.options.len());
                        match input.parse::<usize>() {
                            Ok(n) if (1..=options).contains(&n) => {
                                handle.answer(n - 1);
                                submitted = Some(i);
                            }
                            _ => println!("Enter a number from 1 to {options}, or q to quit."),
                        }
                    }
                    running = handle.changed() => {
                        if !running {
                            break;
                        }
                    }
                }
            }
            Phase::Answered(i) => {
                if revealed != Some(i) {
                    if let Some(feedback) = &snapshot.last_feedback {
                        print_feedback(feedback, handle.question(i));
                    }
                    revealed = Some(i);
                }
                if !handle.changed().await {
                    break;
                }
            }
            Phase::Loading | Phase::Completed => break,
        }
    }

    Ok(handle.settled().await)
}

/// Stdin lines, read on a plain thread so a pending read never holds up
/// runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<std::io::Result<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn print_question(index: usize, total: usize, question: &Question) {
    println!(
        "\nQuestion {}/{total} [{}, {}, {} pts, {}s]",
        index + 1,
        question.category,
        question.difficulty,
        question.points,
        question.time_limit_secs
    );
    println!("{}", question.text);
    for (n, option) in question.options.iter().enumerate() {
        println!("  {}) {option}", n + 1);
    }
}

fn print_feedback(feedback: &AnswerFeedback, question: Option<&Question>) {
    let verdict = match feedback.slot {
        AnsweredSlot::TimedOut => "Time's up!",
        _ if feedback.correct => "Correct!",
        _ => "Wrong.",
    };
    println!("{verdict} {:+} points (score {}).", feedback.delta, feedback.score);
    if !feedback.correct {
        if let Some(question) = question {
            println!("The answer was: {}", question.correct_answer());
        }
    }
    if !feedback.explanation.is_empty() {
        println!("{}", feedback.explanation);
    }
}

fn print_result(record: &SessionRecord) {
    use comfy_table::{Cell, Table};

    let stats = compute_session_stats(record);
    println!("\nFinal score: {}", stats.display_score);
    println!(
        "Correct: {}/{} ({:.1}%), wrong: {}, timed out: {}",
        stats.overall.correct,
        stats.overall.total,
        stats.accuracy * 100.0,
        stats.overall.incorrect,
        stats.overall.timed_out
    );

    let mut table = Table::new();
    table.set_header(vec!["Category", "Questions", "Correct", "Accuracy"]);
    for (category, topic) in &stats.by_category {
        table.add_row(vec![
            Cell::new(category),
            Cell::new(topic.total),
            Cell::new(topic.correct),
            Cell::new(format!("{:.1}%", topic.accuracy() * 100.0)),
        ]);
    }
    println!("\n{table}");
}
