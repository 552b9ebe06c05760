mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志系统
    rupost_engine::logger::init_logger();

    let cli = Cli::parse();
    match cli.command {
        Commands::Send {
            path,
            env,
            vars,
            config,
            verbose,
        } => {
            let passed =
                cli::run_send(&path, env.as_deref(), &vars, config.as_deref(), verbose).await?;
            if !passed {
                std::process::exit(1);
            }
        }
        Commands::History { limit, config } => cli::run_history(limit, config.as_deref())?,
    }
    Ok(())
}
