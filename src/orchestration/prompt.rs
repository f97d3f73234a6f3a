//! Interactive prompts on the terminal

use crate::core::traits::{Choice, Prompter};
use async_trait::async_trait;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};
use tokio::sync::Mutex;

/// Interpret a yes/no answer. Empty input selects the default.
pub fn parse_confirm(answer: &str, default: bool) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "" => Some(default),
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Interpret a selection: a 1-based index or a choice value. Empty input
/// selects the default.
pub fn parse_selection(answer: &str, choices: &[Choice], default: Option<&str>) -> Option<String> {
    let answer = answer.trim();
    if answer.is_empty() {
        return default.map(str::to_string);
    }

    if let Ok(index) = answer.parse::<usize>() {
        return index
            .checked_sub(1)
            .and_then(|i| choices.get(i))
            .map(|c| c.value.clone());
    }

    choices
        .iter()
        .find(|c| c.value == answer)
        .map(|c| c.value.clone())
}

/// Prompter reading answers from stdin
pub struct TerminalPrompter {
    stdin: Mutex<BufReader<Stdin>>,
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self {
            stdin: Mutex::new(BufReader::new(io::stdin())),
        }
    }

    async fn ask(&self, prompt: &str) -> anyhow::Result<String> {
        let mut stdout = io::stdout();
        stdout.write_all(prompt.as_bytes()).await?;
        stdout.flush().await?;

        let mut answer = String::new();
        let read = self.stdin.lock().await.read_line(&mut answer).await?;
        if read == 0 {
            anyhow::bail!("stdin closed while waiting for an answer");
        }
        Ok(answer)
    }
}

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn confirm(&self, message: &str, default: bool) -> anyhow::Result<bool> {
        let hint = if default { "Y/n" } else { "y/N" };
        loop {
            let answer = self.ask(&format!("? {} ({}) ", message, hint)).await?;
            if let Some(value) = parse_confirm(&answer, default) {
                return Ok(value);
            }
            println!("Please answer yes or no");
        }
    }

    async fn select(
        &self,
        message: &str,
        choices: &[Choice],
        default: Option<&str>,
    ) -> anyhow::Result<String> {
        println!("? {}", message);
        for (i, choice) in choices.iter().enumerate() {
            let marker = if Some(choice.value.as_str()) == default { ">" } else { " " };
            println!("  {} {}) {}", marker, i + 1, choice.label);
        }

        loop {
            let answer = self.ask("  Answer: ").await?;
            if let Some(value) = parse_selection(&answer, choices, default) {
                return Ok(value);
            }
            println!("Please enter a number between 1 and {}", choices.len());
        }
    }

    async fn input(&self, message: &str) -> anyhow::Result<String> {
        let answer = self.ask(&format!("? {} ", message)).await?;
        Ok(answer.trim().to_string())
    }
}
