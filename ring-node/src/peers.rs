use ring_core::wire::{ChatForm, JoinReply, PanicForm, QuitForm, RingDump, Snapshot, TokenForm};
use ring_core::{Error, NodeAddr, Result};
use std::time::Duration;

use crate::state::Token;

/// Cap on a single hop-to-hop request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Outbound side of the protocol: short-lived requests to ring peers.
///
/// A connect failure maps to [`Error::Unreachable`]; that classification is
/// the only failure signal the ring protocols act on.
#[derive(Clone, Debug)]
pub struct Peers {
    client: reqwest::Client,
}

impl Peers {
    pub fn new() -> Result<Peers> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| Error::Internal(err.to_string()))?;
        Ok(Peers { client })
    }

    fn classify(err: reqwest::Error) -> Error {
        if err.is_connect() {
            Error::Unreachable(err.to_string())
        } else {
            Error::Internal(err.to_string())
        }
    }

    /// Asks `bootstrap` to splice us into the ring, returning its previous
    /// successor, which becomes ours.
    pub async fn join(&self, bootstrap: NodeAddr, me: NodeAddr) -> Result<NodeAddr> {
        let reply: JoinReply = self
            .client
            .get(bootstrap.url("/ring/join"))
            .query(&[("ip", me.host.to_string()), ("port", me.port.to_string())])
            .send()
            .await
            .map_err(Self::classify)?
            .json()
            .await
            .map_err(Self::classify)?;
        if !reply.success {
            return Err(Error::Rejected(
                reply.message.unwrap_or_else(|| "join refused".to_string()),
            ));
        }
        let host = reply
            .host
            .ok_or_else(|| Error::Internal("join reply missing host".to_string()))?;
        let port = reply
            .port
            .ok_or_else(|| Error::Internal("join reply missing port".to_string()))?;
        NodeAddr::from_parts(&host, port)
    }

    pub async fn quit(&self, to: NodeAddr, form: &QuitForm) -> Result<()> {
        self.client
            .post(to.url("/ring/quit"))
            .form(form)
            .send()
            .await
            .map_err(Self::classify)?;
        Ok(())
    }

    pub async fn forward_token(&self, to: NodeAddr, token: Token) -> Result<()> {
        let path = format!("/ring/le/{}", token.kind.path_segment());
        self.client
            .post(to.url(&path))
            .form(&TokenForm { node_id: token.id })
            .send()
            .await
            .map_err(Self::classify)?;
        Ok(())
    }

    pub async fn uplink(&self, to: NodeAddr, form: &ChatForm) -> Result<()> {
        self.client
            .post(to.url("/ring/message"))
            .form(form)
            .send()
            .await
            .map_err(Self::classify)?;
        Ok(())
    }

    pub async fn broadcast(&self, to: NodeAddr, form: &ChatForm) -> Result<()> {
        self.client
            .put(to.url("/ring/message"))
            .form(form)
            .send()
            .await
            .map_err(Self::classify)?;
        Ok(())
    }

    pub async fn heartbeat(&self, to: NodeAddr) -> Result<()> {
        self.client
            .post(to.url("/heartbeat"))
            .send()
            .await
            .map_err(Self::classify)?;
        Ok(())
    }

    pub async fn panic(&self, to: NodeAddr, orphan: NodeAddr) -> Result<()> {
        self.client
            .post(to.url("/panic"))
            .form(&PanicForm {
                host: orphan.host.to_string(),
                port: orphan.port,
            })
            .send()
            .await
            .map_err(Self::classify)?;
        Ok(())
    }

    /// Fetches one node's `/serialize` view.
    pub async fn snapshot(&self, of: NodeAddr) -> Result<Snapshot> {
        self.client
            .get(of.url("/serialize"))
            .send()
            .await
            .map_err(Self::classify)?
            .json()
            .await
            .map_err(Self::classify)
    }

    /// Fetches the whole ring as seen from one member.
    pub async fn dump(&self, of: NodeAddr) -> Result<RingDump> {
        self.client
            .get(of.url("/serialize/all"))
            .send()
            .await
            .map_err(Self::classify)?
            .json()
            .await
            .map_err(Self::classify)
    }
}
