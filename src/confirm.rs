use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

/// Capability for interactive decisions. The reconciler and the quick-add
/// flow only talk to this trait, so they run unchanged against a terminal,
/// an accept-everything policy, or a scripted fake in tests.
pub trait Confirmer {
    /// Presents numbered options and returns the chosen index.
    fn ask_choice(&mut self, prompt: &str, options: &[&str]) -> Result<usize>;

    /// Free-form input; an empty string means "accept the default".
    fn ask_line(&mut self, prompt: &str) -> Result<String>;
}

/// Terminal-backed confirmer: prompts on stdout, reads stdin.
pub struct StdinConfirmer;

impl Confirmer for StdinConfirmer {
    fn ask_choice(&mut self, prompt: &str, options: &[&str]) -> Result<usize> {
        let stdin = io::stdin();
        loop {
            println!("{prompt}");
            for (number, option) in options.iter().enumerate() {
                println!("  {}. {}", number + 1, option);
            }
            print!("> ");
            io::stdout().flush().context("failed to flush stdout")?;

            let mut line = String::new();
            let read = stdin
                .lock()
                .read_line(&mut line)
                .context("failed to read from stdin")?;
            if read == 0 {
                anyhow::bail!("stdin closed while waiting for a choice");
            }

            match line.trim().parse::<usize>() {
                Ok(choice) if choice >= 1 && choice <= options.len() => return Ok(choice - 1),
                _ => println!("Enter a number between 1 and {}.", options.len()),
            }
        }
    }

    fn ask_line(&mut self, prompt: &str) -> Result<String> {
        print!("{prompt} ");
        io::stdout().flush().context("failed to flush stdout")?;

        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("failed to read from stdin")?;
        Ok(line.trim().to_string())
    }
}

/// Non-interactive confirmer for `--yes` runs: always picks the first
/// option and accepts every default.
pub struct AcceptAllConfirmer;

impl Confirmer for AcceptAllConfirmer {
    fn ask_choice(&mut self, _prompt: &str, _options: &[&str]) -> Result<usize> {
        Ok(0)
    }

    fn ask_line(&mut self, _prompt: &str) -> Result<String> {
        Ok(String::new())
    }
}
