//! Minimal runnable proof that the library wires together: reads world
//! topology from the environment, builds the requested transport flavour,
//! runs one collective, and prints the result. Not where this crate's
//! tests live — see the library's unit and integration tests for that.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use collectives_rs::collectives::CollectivesScope;
use collectives_rs::params::Params;
use collectives_rs::transport::basic::BasicTransport;
use collectives_rs::transport::retrying::RetryingTransport;
use collectives_rs::transport::router::RouterTransport;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Flavour {
    Basic,
    Retrying,
    Router,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DemoOp {
    Broadcast,
    Reduce,
    Barrier,
    Gather,
    Scatter,
    Scan,
}

/// Run one collective operation against the world described by
/// `PYZMQCOLLECTIVES_RANK` / `PYZMQCOLLECTIVES_NRANKS` / `PYZMQCOLLECTIVES_ADDRESSES`.
#[derive(Debug, Parser)]
#[command(name = "collectives-demo")]
struct Cli {
    /// Which collective to run.
    #[arg(long, value_enum)]
    op: DemoOp,

    /// Which transport flavour to use.
    #[arg(long, value_enum, default_value = "retrying")]
    flavour: Flavour,

    /// Root rank for the operation.
    #[arg(long, default_value_t = 0)]
    root: usize,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    collectives_rs::logging::init(cli.verbose);

    let params = Params::from_env().context("reading world topology from the environment")?;
    info!(rank = params.rank(), nranks = params.nranks(), op = ?cli.op, flavour = ?cli.flavour, "starting collectives demo");

    let result = match cli.flavour {
        Flavour::Basic => run(BasicTransport::new(&params), &cli).await,
        Flavour::Retrying => run(RetryingTransport::new(&params), &cli).await,
        Flavour::Router => run(RouterTransport::new(&params), &cli).await,
    };

    match result {
        Ok(()) => {
            info!("collectives demo completed successfully");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "collectives demo failed");
            Err(e)
        }
    }
}

async fn run<T>(transport: T, cli: &Cli) -> Result<()>
where
    T: collectives_rs::Transport + 'static,
{
    let scope = CollectivesScope::enter(transport)
        .await
        .context("initializing transport")?;
    let rank = scope.transport().rank();

    match cli.op {
        DemoOp::Broadcast => {
            let seed: i64 = if rank == cli.root { 42 } else { 0 };
            let result = scope.broadcast(seed, cli.root).await.context("broadcast")?;
            info!(rank, result, "broadcast complete");
        }
        DemoOp::Reduce => {
            let local = vec![rank as i64];
            let result = scope
                .reduce(local, 0i64, &|a: i64, b: i64| a + b, cli.root)
                .await
                .context("reduce")?;
            info!(rank, result, "reduce complete");
        }
        DemoOp::Barrier => {
            scope.barrier().await.context("barrier")?;
            info!(rank, "barrier complete");
        }
        DemoOp::Gather => {
            let result = scope.gather(rank as i64, cli.root).await.context("gather")?;
            info!(rank, ?result, "gather complete");
        }
        DemoOp::Scatter => {
            let nranks = scope.transport().nranks();
            let data: Vec<i64> = (0..nranks as i64).collect();
            let result = scope.scatter(data, cli.root).await.context("scatter")?;
            info!(rank, ?result, "scatter complete");
        }
        DemoOp::Scan => {
            let local = vec![rank as i64];
            let result = scope
                .scan(local, 0i64, |a: i64, b: i64| a + b, cli.root)
                .await
                .context("scan")?;
            info!(rank, ?result, "scan complete");
        }
    }

    scope.finalize().await.context("finalizing transport")?;
    Ok(())
}
