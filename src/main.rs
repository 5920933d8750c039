mod cli;
mod config;
mod core;
mod models;
mod sources;

#[cfg(feature = "gui")]
mod gui;

use clap::Parser;

fn main() {
    let cli = cli::Cli::parse();
    let (cfg, warning) = config::load_config();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cfg.logging.level.as_str()),
    )
    .init();
    if let Some(warning) = warning {
        log::warn!("{}", warning);
    }

    if let Err(e) = cli::run(cli, cfg) {
        eprintln!("오류: {:#}", e);
        std::process::exit(1);
    }
}
