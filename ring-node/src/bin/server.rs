use clap::Parser;
use ring_core::NodeAddr;
use ring_node::node::{self, Config};
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// A peer in a unidirectional ring overlay chat.
#[derive(Debug, Parser)]
#[command(name = "ring-node")]
struct Args {
    /// Address to listen on, as ip:port.
    addr: NodeAddr,

    /// Ring member to join through, as ip:port.
    bootstrap: Option<NodeAddr>,

    /// Accept joins whose advertised address differs from the source
    /// address.
    #[arg(long)]
    lenient_join: bool,

    /// Seconds to wait before a scheduled election enters the ring.
    #[arg(long, default_value_t = ring_node::ELECTION_SETTLE_SECS)]
    settle_secs: u64,
}

#[tokio::main]
async fn main() -> ring_node::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ring_node=info".into()),
        )
        .init();

    let args = Args::parse();
    let listener = TcpListener::bind(SocketAddr::from((args.addr.host, args.addr.port))).await?;
    let config = Config {
        addr: args.addr,
        bootstrap: args.bootstrap,
        lenient_join: args.lenient_join,
        settle_secs: args.settle_secs,
    };
    node::run(listener, config, tokio::signal::ctrl_c()).await
}
