//! The `aptiq init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("aptiq.toml").exists() {
        println!("aptiq.toml already exists, skipping.");
    } else {
        std::fs::write("aptiq.toml", SAMPLE_CONFIG)?;
        println!("Created aptiq.toml");
    }

    std::fs::create_dir_all("banks")?;
    let sample_path = std::path::Path::new("banks/sample.toml");
    if sample_path.exists() {
        println!("banks/sample.toml already exists, skipping.");
    } else {
        std::fs::write(sample_path, SAMPLE_BANK)?;
        println!("Created banks/sample.toml");
    }

    println!("\nNext steps:");
    println!("  1. Run: aptiq validate --bank banks/sample.toml");
    println!("  2. Run: aptiq seed");
    println!("  3. Run: aptiq play --user <name> --mixed");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# aptiq configuration

# Seed from your own bank instead of the bundled one.
# question_bank = "banks"

[storage]
backend = "sqlite"
path = "${HOME}/.local/share/aptiq/aptiq.db"

[quiz]
reveal_delay_ms = 3000
history_limit = 10

[sampling]
easy = 0.4
medium = 0.4
hard = 0.2
# seed = 42
"#;

const SAMPLE_BANK: &str = r#"[bank]
id = "sample"
name = "Sample Bank"
description = "A few questions to start your own bank from"

[[questions]]
id = "sample-speed"
text = "A car covers 120 km in 2 hours. What is its average speed?"
type = "numerical"
category = "quantitative"
options = ["40 km/h", "60 km/h", "80 km/h", "240 km/h"]
correct_answer_index = 1
explanation = "Speed = distance / time = 120 / 2 = 60 km/h."
difficulty = "easy"
tags = ["speed", "arithmetic"]

[[questions]]
id = "sample-series"
text = "What comes next: 2, 6, 12, 20, 30, ?"
type = "pattern"
category = "reasoning"
options = ["36", "40", "42", "48"]
correct_answer_index = 2
explanation = "Differences grow by 2: +4, +6, +8, +10, +12."
difficulty = "medium"
hints = ["Look at the differences between terms."]
tags = ["series"]

[[questions]]
id = "sample-synonym"
text = "Choose the word closest in meaning to 'LACONIC'."
type = "verbal"
category = "english"
options = ["Talkative", "Concise", "Lazy", "Gloomy"]
correct_answer_index = 1
explanation = "Laconic means using very few words."
difficulty = "hard"
points = 250
time_limit_secs = 40
tags = ["vocabulary"]
"#;
