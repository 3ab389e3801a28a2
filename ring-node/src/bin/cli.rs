use clap::Parser;
use ring_core::NodeAddr;
use ring_node::peers::Peers;

/// Inspect a running ring through one of its members.
#[derive(Debug, Parser)]
#[command(name = "ring-cli")]
struct Args {
    /// Any ring member, as ip:port.
    addr: NodeAddr,
}

#[tokio::main]
async fn main() -> ring_node::Result<()> {
    let args = Args::parse();
    let peers = Peers::new()?;
    let dump = peers.dump(args.addr).await?;
    for node in &dump.nodes {
        let leader = node
            .leader
            .map(|id| NodeAddr::from_id(id).to_string())
            .unwrap_or_else(|| "none".to_string());
        println!(
            "{}:{} -> {}:{} (leader {})",
            node.host, node.port, node.next_host, node.next_port, leader
        );
    }
    Ok(())
}
