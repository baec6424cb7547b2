use std::path::PathBuf;

use crate::error::{Result, VodError};
use crate::settings::{load_settings, save_settings, settings_path, shellexpand_path};

pub fn run(
    data_dir: Option<String>,
    logo: Option<String>,
    font_dir: Option<String>,
    timezone: Option<String>,
) -> Result<()> {
    let mut settings = load_settings();

    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    if let Some(logo) = logo {
        let path = shellexpand_path(&logo);
        if !PathBuf::from(&path).is_file() {
            return Err(VodError::Settings(format!("logo not found: {path}")));
        }
        settings.logo_path = Some(path);
    }
    if let Some(dir) = font_dir {
        let path = shellexpand_path(&dir);
        for font in ["DejaVuSans.ttf", "DejaVuSans-Bold.ttf"] {
            if !PathBuf::from(&path).join(font).is_file() {
                return Err(VodError::Settings(format!("{font} not found in {path}")));
            }
        }
        settings.font_dir = Some(path);
    }
    if let Some(tz) = timezone {
        settings.timezone = tz;
        settings.tz()?;
    }

    std::fs::create_dir_all(&settings.data_dir)?;
    save_settings(&settings)?;

    println!("Data directory: {}", settings.data_dir);
    println!("Settings saved to {}", settings_path().display());
    Ok(())
}
