use log::{error, info};
use std::process::ExitCode;
use tproxyd::{Args, Listener};

fn main() -> ExitCode {
    env_logger::init();

    let args = match Args::parse_or_exit() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let local = tokio::task::LocalSet::new();
    let result = local.block_on(&runtime, run(args));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> std::io::Result<()> {
    let listener = Listener::bind(&args)?;
    info!("tproxyd starting");
    listener.run().await
}
