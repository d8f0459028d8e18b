// src/main.rs

use saltdag::report::RunReport;
use saltdag::{cli, exit_code, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(report) => std::process::exit(exit_code(report.as_ref())),
        Err(err) => {
            eprintln!("saltdag error: {err:?}");
            std::process::exit(1);
        }
    }
}

async fn run_main() -> anyhow::Result<Option<RunReport>> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    Ok(run(args).await?)
}
