//! SnapQR relay binary.

use snapqr_relay::RelayConfig;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = snapqr_relay::serve(config).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
