use crate::error::{Result, VodError};
use crate::settings::load_settings;

pub fn run(port: Option<u16>) -> Result<()> {
    let settings = load_settings();
    let port = port.unwrap_or(settings.port);
    println!("Serving on http://0.0.0.0:{port} (data in {})", settings.data_dir);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime
        .block_on(crate::server::serve(&settings, port))
        .map_err(|e| VodError::Other(format!("{e:#}")))
}
