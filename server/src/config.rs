use anyhow::{Context, Result, anyhow};
use products_deals::llm::{DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL};
use products_deals::mail::DEFAULT_GMAIL_BASE_URL;
use products_deals::{GmailConfig, LlmConfig};

const DEFAULT_INTAKE_FOLDER: &str = "Deals";
const DEFAULT_PAGE_SIZE: u32 = 50;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub cors_allowed_origins: Vec<String>,
    pub intake_folder: String,
    pub llm: Option<LlmConfig>,
    pub gmail: Option<GmailConfig>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .filter_map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect::<Vec<_>>();

        let intake_folder = env_optional("DEAL_INTAKE_FOLDER")
            .unwrap_or_else(|| DEFAULT_INTAKE_FOLDER.to_string());
        let page_size = match env_optional("DEAL_INTAKE_PAGE_SIZE") {
            Some(raw) => raw
                .parse::<u32>()
                .context("DEAL_INTAKE_PAGE_SIZE must be a positive integer")?
                .max(1),
            None => DEFAULT_PAGE_SIZE,
        };

        let llm = env_optional("OPENAI_API_KEY").map(|key| {
            LlmConfig::new(key)
                .with_base_url(
                    env_optional("OPENAI_BASE_URL")
                        .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
                )
                .with_model(
                    env_optional("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                )
        });

        let gmail = env_optional("GMAIL_ACCESS_TOKEN").map(|token| {
            let mut gmail = GmailConfig::new(token);
            gmail.base_url =
                env_optional("GMAIL_BASE_URL").unwrap_or_else(|| DEFAULT_GMAIL_BASE_URL.to_string());
            gmail.page_size = page_size;
            gmail
        });

        Ok(Self {
            cors_allowed_origins,
            intake_folder,
            llm,
            gmail,
        })
    }

    /// Both collaborators intake needs, or an error naming what is missing.
    pub fn intake_collaborators(&self) -> Result<(LlmConfig, GmailConfig)> {
        let llm = self
            .llm
            .clone()
            .ok_or_else(|| anyhow!("OPENAI_API_KEY missing; deal intake is disabled"))?;
        let gmail = self
            .gmail
            .clone()
            .ok_or_else(|| anyhow!("GMAIL_ACCESS_TOKEN missing; deal intake is disabled"))?;
        Ok((llm, gmail))
    }
}

fn env_optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
