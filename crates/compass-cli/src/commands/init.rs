//! The `compass init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create compass.toml
    if std::path::Path::new("compass.toml").exists() {
        println!("compass.toml already exists, skipping.");
    } else {
        std::fs::write("compass.toml", SAMPLE_CONFIG)?;
        println!("Created compass.toml");
    }

    // Create example item bank
    std::fs::create_dir_all("banks")?;
    let example_path = std::path::Path::new("banks/example.toml");
    if example_path.exists() {
        println!("banks/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_BANK)?;
        println!("Created banks/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Run: compass validate --bank banks/example.toml");
    println!("  2. Run: compass import --bank banks/example.toml");
    println!("  3. Run: compass take --test 1");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# compass configuration

state_path = "./compass-state.json"
output_dir = "./compass-reports"
# Fixed seed for reproducible question selection.
# seed = 42

[scoring]
sdb_high_value = 4
sdb_flag_ratio = 0.7

[radar]
width = 400
height = 400
radius = 140
label_offset = 20
"#;

const EXAMPLE_BANK: &str = include_str!("../../../../banks/example.toml");
