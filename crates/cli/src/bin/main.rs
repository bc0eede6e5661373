use clap::Parser;
use smart_account_cli::Config;
use smart_account_core::logger::init_logger;
use tracing::debug;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::parse();

    init_logger(&config.log_level, config.log_format);

    debug!(
        message = "Starting smart account cli",
        entry_point = %config.entry_point,
        chain_id = config.chain_id,
        software_p256 = config.software_p256,
    );

    let output = config.run()?;
    println!("{output}");
    Ok(())
}
