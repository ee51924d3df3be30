//! Resolves Docker Swarm addresses from the command line.
//!
//! Arguments use the discovery framework's `key=value` format and are joined
//! before parsing, so quoting works as it would in a config file.
//!
//! # Running
//!
//! ```text
//! cargo run --example resolve -- type=service namespace=shop service=web
//! cargo run --example resolve -- type=node role=manager host=tcp://10.0.0.1:2375
//! ```
//!
//! `provider=dockerswarm` is added when missing. Without `host=...` the
//! daemon at `unix:///var/run/docker.sock` is queried.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: log filter; `debug` shows which nodes and tasks were skipped

use std::env;
use std::process::ExitCode;

use dockerswarm_discover::{Args, Discover, Provider};
use tracing::{Level, error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut line: String = env::args().skip(1).collect::<Vec<_>>().join(" ");
    if !line.split_whitespace().any(|arg| arg.starts_with("provider=")) {
        line.push_str(" provider=");
        line.push_str(Provider::NAME);
    }

    let args: Args = match line.parse() {
        Ok(args) => args,
        Err(e) => {
            error!("{e}");
            eprintln!("{}", Provider::help());
            return ExitCode::FAILURE;
        }
    };

    match Provider.addrs(&args).await {
        Ok(addrs) => {
            info!("resolved {} address(es)", addrs.len());
            for addr in addrs {
                println!("{addr}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
