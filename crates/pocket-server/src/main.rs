use clap::Parser;
use pocket_core::{bind, serve_with_shutdown};
use pocket_server::{build_dispatcher, setup_tracing, Cli};
use std::sync::Arc;

// Use mimalloc for better performance
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    setup_tracing();

    let config = cli.server_config();
    let dispatcher = Arc::new(build_dispatcher(config.max_body_size)?);

    // Sequential mode keeps everything on one thread
    let runtime = if config.sequential {
        tokio::runtime::Builder::new_current_thread().enable_all().build()?
    } else {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.workers)
            .enable_all()
            .build()?
    };

    runtime.block_on(async move {
        let listener = bind(&config)?;
        tracing::info!(
            addr = %config.display_addr(),
            sequential = config.sequential,
            workers = config.workers,
            "pocket started"
        );

        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutdown requested");
        };

        serve_with_shutdown(listener, dispatcher, config, shutdown).await
    })?;

    Ok(())
}
