//! Shared CLI helpers — path display, response printing, version banner.

use std::path::Path;

use colored::Colorize;

/// Show a path with the home directory abbreviated to `~`.
pub fn display_path(path: &Path) -> String {
    if let Some(home) = dirs_next::home_dir() {
        if let Ok(rest) = path.strip_prefix(&home) {
            if rest.as_os_str().is_empty() {
                return "~".to_string();
            }
            return format!("~/{}", rest.display());
        }
    }
    path.display().to_string()
}

/// Print the final answer to stdout.
pub fn print_response(response: &str) {
    println!();
    println!("{}", "toolstep".cyan().bold());
    if response.trim().is_empty() {
        println!("{}", "(no response)".dimmed());
    } else {
        println!("{}", response.trim());
    }
    println!();
}

pub fn print_warning(message: &str) {
    eprintln!("{}", message.yellow());
}

/// Print the banner shown at REPL start.
pub fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}", "toolstep".cyan().bold(), version.dimmed());
    println!(
        "{}",
        "Type a request. /tools lists tools, /clear resets the conversation, \"exit\" quits."
            .dimmed()
    );
    println!("{}", "Ctrl-C cancels a running request.".dimmed());
    println!();
}

/// Print a "thinking" placeholder while the final answer is generated.
pub fn print_thinking() {
    eprint!("{}", "⠿ thinking...".dimmed());
}

/// Clear the "thinking" placeholder.
pub fn clear_thinking() {
    eprint!("\r{}\r", " ".repeat(40));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn display_path_abbreviates_home() {
        let Some(home) = dirs_next::home_dir() else {
            return;
        };
        assert_eq!(display_path(&home.join(".toolstep/config.json")), "~/.toolstep/config.json");
        assert_eq!(display_path(&home), "~");
    }

    #[test]
    fn display_path_leaves_other_paths() {
        assert_eq!(display_path(&PathBuf::from("/opt/tools/mcptool")), "/opt/tools/mcptool");
        assert_eq!(display_path(&PathBuf::from("relative/path")), "relative/path");
    }
}
