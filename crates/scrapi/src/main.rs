use clap::Parser;
use scrapi::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    scrapi::logging::init(&cli.log_level, cli.json);

    let json = cli.json;
    let result = cli::run(cli).await;

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if json {
            cli::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        } else {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}
