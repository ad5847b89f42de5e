pub mod history;
pub mod init;
pub mod play;
pub mod seed;
pub mod stats;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result};

use aptiq_core::bank::load_banks;
use aptiq_core::service::QuizService;
use aptiq_store::config::{load_config_from, open_backend, AptiqConfig};

/// Load the configuration and build the engine on the configured store.
pub fn build_service(config_path: Option<&Path>) -> Result<(AptiqConfig, QuizService)> {
    let config = load_config_from(config_path)?;
    let backend = open_backend(&config.storage);
    let mut service = QuizService::new(backend, config.to_service_config());

    if let Some(bank_path) = &config.question_bank {
        tracing::debug!(bank = %bank_path.display(), "seeding from configured question bank");
        let questions: Vec<_> = load_banks(bank_path)
            .with_context(|| format!("failed to load question bank {}", bank_path.display()))?
            .into_iter()
            .flat_map(|bank| bank.questions)
            .collect();
        service = service.with_seed_questions(questions);
    }

    Ok((config, service))
}
