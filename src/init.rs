//! Project initialization for pickr
//!
//! `pickr init` creates the `.pickr` directory with a database and a
//! commented config file.

use crate::db::Database;
use colored::Colorize;
use std::fs;
use std::path::Path;

/// Default configuration, every value spelled out
pub const CONFIG_TOML: &str = r#"# pickr configuration

[schedule]
# Hours of day (posting timezone) that get a slot, every day of the week
anchors = [9, 12, 17]
# Drafts taken from each topic when topics are plentiful
posts_per_topic = 3
# Only topics discovered within this many days are eligible
recency_days = 7
# Posting timezone as a fixed offset from UTC, in minutes
utc_offset_minutes = 0
# Commit every placement at its slot time instead of leaving suggestions
auto_accept = false

[tone]
# Writing samples shorter than this are not imitated
min_sample_chars = 200
# Command that rewrites stdin in the voice of the sample in $PICKR_STYLE_SAMPLE_FILE
# rewrite_command = "my-rewriter"

[dispatch]
# Seconds between runs of `pickr dispatch --watch`
interval_secs = 300
# Sends cannot be committed further ahead than this
horizon_days = 90
# Command that publishes stdin using $PICKR_ACCESS_TOKEN and
# $PICKR_ACCESS_TOKEN_SECRET and prints the platform post id
# publish_command = "my-publisher"
# Stop retrying a send after this many failed publishes (0 = never stop)
max_failures = 0

[dispatch.retry]
max_attempts = 3
initial_backoff_ms = 1000
multiplier = 2.0
"#;

/// Initialize pickr in `cwd`
pub fn init_project(cwd: &Path) -> Result<(), String> {
    println!("\n{}", "Initializing pickr...".cyan().bold());
    println!("   Directory: {}\n", cwd.display());

    let pickr_dir = cwd.join(".pickr");
    create_dir_if_missing(&pickr_dir)?;

    let db_path = pickr_dir.join("pickr.db");
    let existed = db_path.exists();
    Database::open_at(&db_path).map_err(|e| format!("Could not create database: {}", e))?;
    if existed {
        println!("   {} .pickr/pickr.db (already exists)", "Skipping".yellow());
    } else {
        println!("   {} .pickr/pickr.db", "Creating".green());
    }

    write_file_if_missing(&pickr_dir.join("config.toml"), CONFIG_TOML, ".pickr/config.toml")?;
    add_to_gitignore(cwd)?;

    println!("\n{}", "pickr initialized!".green().bold());
    println!("\nNext steps:");
    println!("  1. Run {} to load topics and drafts", "pickr import bundle.json".cyan());
    println!("  2. Run {} to build this week's calendars", "pickr schedule-all".cyan());
    println!("  3. Run {} to publish committed posts", "pickr dispatch --watch".cyan());
    println!();

    Ok(())
}

fn create_dir_if_missing(path: &Path) -> Result<(), String> {
    if !path.exists() {
        fs::create_dir_all(path)
            .map_err(|e| format!("Could not create {}: {}", path.display(), e))?;
        println!("   {} {}", "Creating".green(), path.display());
    }
    Ok(())
}

fn write_file_if_missing(path: &Path, content: &str, display_name: &str) -> Result<(), String> {
    if path.exists() {
        println!("   {} {} (already exists)", "Skipping".yellow(), display_name);
    } else {
        fs::write(path, content)
            .map_err(|e| format!("Could not write {}: {}", display_name, e))?;
        println!("   {} {}", "Creating".green(), display_name);
    }
    Ok(())
}

fn add_to_gitignore(cwd: &Path) -> Result<(), String> {
    let gitignore_path = cwd.join(".gitignore");
    let entry = ".pickr/pickr.db";

    if gitignore_path.exists() {
        let existing = fs::read_to_string(&gitignore_path)
            .map_err(|e| format!("Could not read .gitignore: {}", e))?;

        if existing.lines().any(|line| line.trim() == entry || line.trim() == ".pickr/" || line.trim() == ".pickr") {
            return Ok(());
        }

        let new_content = format!("{}\n\n# pickr database (local)\n{}\n", existing.trim_end(), entry);
        fs::write(&gitignore_path, new_content)
            .map_err(|e| format!("Could not update .gitignore: {}", e))?;
        println!("   {} .gitignore (added {})", "Updated".green(), entry);
    }

    Ok(())
}
