#![cfg(not(tarpaulin_include))]

use env_logger::Env;
use log::info;
use lucky_draw::app;
use lucky_draw::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = Config::from_env()?;
    info!("Starting lucky draw on {}", config.bind_addr);

    app::run(config).await
}
