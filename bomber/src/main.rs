use core::error::Error;
use std::sync::Arc;

use bomber::{
    api::{Metrics, Server},
    cfg::Config,
    cmd::Cmd,
    engine::Engine,
};
use clap::Parser;
use tokio::runtime::Builder;

pub fn main() {
    let cmd = Cmd::parse();
    bomber::logging::init(cmd.verbose as usize).unwrap();

    if let Err(err) = run(cmd) {
        eprintln!("ERROR: {err}");
        std::process::exit(1);
    }
}

fn run(cmd: Cmd) -> Result<(), Box<dyn Error>> {
    let cfg: Config = cmd.try_into()?;

    // Init I/O runtime.
    Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .thread_name("runtime")
        .build()?
        .block_on(async {
            let metrics = Arc::new(Metrics::new());

            let server = Server::new(cfg.api_addr, metrics.clone());
            tokio::spawn(async move {
                if let Err(err) = server.run().await {
                    log::error!("API server failed: {err}");
                }
            });

            let engine = Engine::new(cfg, metrics);
            engine.run().await?;

            Ok(())
        })
}
