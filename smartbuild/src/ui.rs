//! User-facing prompts.
//!
//! Cancellation is folded into `None`: a dismissed prompt is a completed
//! no-op, indistinguishable from "nothing to do" further down the line.

use async_trait::async_trait;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};

/// Single-choice selection and free-text input.
#[async_trait]
pub trait Prompt: Send + Sync {
    /// Pick one item from a labeled list. `None` when dismissed.
    async fn select(&self, prompt: &str, items: &[String]) -> Option<usize>;
    /// Free-text input. `None` when dismissed or left empty.
    async fn input(&self, prompt: &str) -> Option<String>;
}

/// Interactive prompts on the controlling terminal.
pub struct ConsolePrompt;

#[async_trait]
impl Prompt for ConsolePrompt {
    async fn select(&self, prompt: &str, items: &[String]) -> Option<usize> {
        Select::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .items(items)
            .default(0)
            .interact_opt()
            .ok()
            .flatten()
    }

    async fn input(&self, prompt: &str) -> Option<String> {
        Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .ok()
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
    }
}
