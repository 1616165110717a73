use std::io::{self, BufRead, Write};

use linear_timeline::error::{LinearError, Result};
use linear_timeline::config::{self, Config};

fn prompt(question: &str) -> Result<String> {
    print!("{question}");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().to_string())
}

pub fn run() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut config = Config::load_from(&config_path)?;

    if config_path.exists() {
        let answer = prompt(&format!(
            "Config file already exists at {}. Overwrite? [y/N] ",
            config_path.display()
        ))?;
        if !answer.eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    println!("linear-timeline configuration");
    println!("=============================\n");

    let api_key =
        prompt("Enter your Linear API key (create one at https://linear.app/settings/api): ")?;
    if api_key.is_empty() {
        return Err(LinearError::MissingApiKey);
    }
    config.api_key = Some(api_key);

    let ttl = prompt(&format!(
        "Cache lifetime in seconds [{}]: ",
        config.cache_ttl_secs
    ))?;
    if !ttl.is_empty() {
        config.cache_ttl_secs = config::parse_secs("cache_ttl_secs", &ttl)?;
    }

    config.save_to(&config_path)?;

    println!("\nConfig saved to {}", config_path.display());
    println!("Try 'linear-timeline whoami' to check the key.");

    Ok(())
}
