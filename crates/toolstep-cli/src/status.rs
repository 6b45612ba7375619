//! `toolstep status` — show configuration, guard thresholds and provider status.

use anyhow::Result;
use colored::Colorize;

use toolstep_core::config::{get_config_path, load_config};
use toolstep_core::utils::expand_home;
use toolstep_providers::PROVIDERS;

use crate::helpers::display_path;

/// Run the status command.
pub fn run() -> Result<()> {
    let config = load_config(None);
    let config_path = get_config_path();
    let agent = &config.agent;

    println!();
    println!("{}", "toolstep status".cyan().bold());
    println!();

    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        display_path(&config_path),
        if config_path.exists() {
            "✓".green().to_string()
        } else {
            "(not found, using defaults)".red().to_string()
        }
    );
    println!("  {:<18} {}", "Model:".bold(), agent.model);
    println!(
        "  {:<18} {}",
        "Parameters:".bold(),
        format!("temp: {} | max_tokens: {}", agent.temperature, agent.max_tokens).dimmed(),
    );
    println!(
        "  {:<18} reasoning: {} | contract: {} | context: {} | display: {}",
        "Agent:".bold(),
        agent.reasoning,
        agent.output_contract,
        agent.context_mode,
        agent.display,
    );
    println!(
        "  {:<18} {}",
        "Guards:".bold(),
        format!(
            "steps: {} | repeats: {} | stuck: {} | progress: {} | empty: {}",
            agent.effective_max_steps(),
            agent.max_repeats,
            agent.max_stuck,
            agent.max_progress_repeats,
            agent.max_empty_results,
        )
        .dimmed(),
    );

    // Tool host
    println!();
    let command = expand_home(&config.tools.command);
    let mut host = display_path(&command);
    for arg in &config.tools.args {
        host.push(' ');
        host.push_str(arg);
    }
    println!("  {:<18} {}", "Tool host:".bold(), host);
    println!(
        "  {:<18} {}",
        "".bold(),
        format!(
            "timeout: {}s | catalog: {} | output: {}",
            config.tools.timeout, config.tools.catalog_format, config.tools.output_format
        )
        .dimmed(),
    );

    // Providers
    println!();
    println!("  {}", "Providers:".bold());
    let providers_map = config.providers.to_map();

    for spec in PROVIDERS {
        let status = match providers_map.get(spec.name) {
            Some(prov_config) if prov_config.is_configured() => format!("{} (configured)", "✓".green()),
            _ => format!("{}", "· not configured".dimmed()),
        };
        println!("    {:<20} {}", spec.display_name, status);
    }

    println!();
    Ok(())
}
