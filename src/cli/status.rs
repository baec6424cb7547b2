use std::path::Path;

use crate::error::Result;
use crate::settings::{load_settings, settings_path};

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok()).filter(|e| e.path().is_file()).count())
        .unwrap_or(0)
}

pub fn run() -> Result<()> {
    let settings = load_settings();
    let config = settings_path();

    println!(
        "Settings:   {}{}",
        config.display(),
        if config.exists() { "" } else { " (defaults, run `vod init`)" }
    );
    println!("Data dir:   {}", settings.data_dir);
    println!("Logo:       {}", settings.logo_path.as_deref().unwrap_or("(none)"));
    println!("Fonts:      {}", settings.font_dir.as_deref().unwrap_or("(built-in Helvetica)"));
    println!("Timezone:   {}", settings.timezone);
    println!("Port:       {}", settings.port);

    println!();
    println!("Pending uploads:  {}", count_files(&settings.uploads_dir()));
    println!("Stored outputs:   {}", count_files(&settings.outputs_dir()));
    println!("Exports:          {}", count_files(&settings.exports_dir()));
    Ok(())
}
