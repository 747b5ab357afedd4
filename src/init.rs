//! Project initialization for openwrite
//!
//! `openwrite init` sets up the local workspace: database directory,
//! starter config, gitignore entry.

use colored::Colorize;
use std::fs;
use std::path::Path;

const STARTER_CONFIG: &str = r##"# OpenWrite configuration

[server]
# Port for `openwrite serve`
port = 8040

[export]
# Include a table of contents in compiled manuscripts
include_toc = true

[canvas.default_colors]
# Fill color applied to new nodes created without a visual style
story_element = "#FFE4B5"
character = "#E0FFFF"
location = "#90EE90"
lore = "#DDA0DD"
plot_thread = "#E6E6FA"
"##;

/// Initialize openwrite in the current directory
pub fn init_workspace() -> Result<(), String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Could not get current directory: {}", e))?;

    println!("\n{}", "Initializing OpenWrite...".cyan().bold());
    println!("   Directory: {}\n", cwd.display());

    // 1. Create .openwrite directory
    let openwrite_dir = cwd.join(".openwrite");
    create_dir_if_missing(&openwrite_dir)?;

    // 2. Create the database by opening it (creates tables)
    let db_path = openwrite_dir.join("openwrite.db");
    println!("   {} {}", "Creating".green(), ".openwrite/openwrite.db");
    crate::db::Database::open_at(&db_path)
        .map_err(|e| format!("Could not create database: {}", e))?;

    // 3. Write starter config
    let config_path = openwrite_dir.join("config.toml");
    write_file_if_missing(&config_path, STARTER_CONFIG, ".openwrite/config.toml")?;

    // 4. Add .openwrite to .gitignore if not already there
    add_to_gitignore(&cwd)?;

    println!("\n{}", "OpenWrite initialized!".green().bold());
    println!("\nNext steps:");
    println!(
        "  1. Run {} to create your first project",
        "openwrite project new \"My Novel\"".cyan()
    );
    println!(
        "  2. Run {} to start the canvas viewer and API",
        "openwrite serve".cyan()
    );
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
    let entry = ".openwrite/";

    if gitignore_path.exists() {
        let existing = fs::read_to_string(&gitignore_path)
            .map_err(|e| format!("Could not read .gitignore: {}", e))?;

        if existing
            .lines()
            .any(|line| line.trim() == entry || line.trim() == ".openwrite")
        {
            // Already in gitignore
            return Ok(());
        }

        let new_content = format!(
            "{}\n\n# OpenWrite database (local)\n{}\n",
            existing.trim_end(),
            entry
        );
        fs::write(&gitignore_path, new_content)
            .map_err(|e| format!("Could not update .gitignore: {}", e))?;
        println!("   {} .gitignore (added .openwrite/)", "Updated".green());
    } else {
        let content = format!("# OpenWrite database (local)\n{}\n", entry);
        fs::write(&gitignore_path, content)
            .map_err(|e| format!("Could not create .gitignore: {}", e))?;
        println!("   {} .gitignore", "Creating".green());
    }

    Ok(())
}
