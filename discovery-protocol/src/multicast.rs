//! UDP multicast announce/listen (spec.md §4.5, §6 "Multicast wire
//! format").

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use discovery_core::AgentInfo;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::error::{ProtocolError, ProtocolResult};

/// Maximum accepted datagram size (spec.md §6).
pub const MAX_DATAGRAM_BYTES: usize = 64 * 1024;

/// Binds the multicast socket used by both [`announce`] and
/// [`listen`].
///
/// # Errors
///
/// Returns [`ProtocolError::Transport`] if the socket cannot be bound
/// or joined to the multicast group.
pub async fn bind(group: Ipv4Addr, port: u16) -> ProtocolResult<UdpSocket> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))
        .await
        .map_err(|err| ProtocolError::transport(format!("failed to bind multicast socket: {err}")))?;
    socket
        .join_multicast_v4(group, Ipv4Addr::UNSPECIFIED)
        .map_err(|err| ProtocolError::transport(format!("failed to join multicast group: {err}")))?;
    Ok(socket)
}

/// Serializes `agent` to JSON and writes it to the multicast group.
///
/// # Errors
///
/// Returns [`ProtocolError::Transport`] if serialization or the send
/// fails.
pub async fn announce(socket: &UdpSocket, group: Ipv4Addr, port: u16, agent: &AgentInfo) -> ProtocolResult<()> {
    let payload = serde_json::to_vec(agent)
        .map_err(|err| ProtocolError::transport(format!("failed to encode announcement: {err}")))?;
    if payload.len() > MAX_DATAGRAM_BYTES {
        return Err(ProtocolError::invalid("announcement payload exceeds 64 KiB"));
    }
    socket
        .send_to(&payload, SocketAddr::from((group, port)))
        .await
        .map_err(|err| ProtocolError::transport(format!("failed to send announcement: {err}")))?;
    Ok(())
}

/// Runs a receive loop on `socket`, invoking `on_agent` for every
/// well-formed `AgentInfo` datagram, until `running` is cleared. Polls
/// with a 1 second read deadline so shutdown is observed within one
/// cycle (spec.md §5 "multicast listener exits... within one poll
/// cycle").
pub async fn listen<F>(socket: &UdpSocket, running: Arc<AtomicBool>, mut on_agent: F)
where
    F: FnMut(AgentInfo) + Send,
{
    let mut buf = vec![0u8; MAX_DATAGRAM_BYTES];
    while running.load(Ordering::Relaxed) {
        let recv = tokio::time::timeout(Duration::from_secs(1), socket.recv_from(&mut buf)).await;
        let Ok(result) = recv else {
            continue;
        };
        let Ok((len, _addr)) = result else {
            warn!("multicast recv failed");
            continue;
        };
        match serde_json::from_slice::<AgentInfo>(&buf[..len]) {
            Ok(agent) => on_agent(agent),
            Err(err) => debug!(%err, "discarding malformed multicast datagram"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_core::{AgentCard, CapabilityDescriptor, CapabilityType};

    fn agent() -> AgentInfo {
        let card = AgentCard::new(
            "multicast-agent",
            "",
            "",
            "1.0.0",
            vec![CapabilityDescriptor::new("ping", "", CapabilityType::Task).unwrap()],
        )
        .unwrap();
        AgentInfo::new(card, true, String::new(), 0)
    }

    #[tokio::test]
    async fn announce_rejects_oversized_payload() {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let mut info = agent();
        info.set_metadata(
            [("blob".to_owned(), "x".repeat(MAX_DATAGRAM_BYTES))]
                .into_iter()
                .collect(),
        );
        let err = announce(&socket, Ipv4Addr::new(239, 255, 255, 250), 19001, &info)
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Invalid(_)));
    }

    #[tokio::test]
    async fn listen_stops_when_running_flag_clears() {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let running = Arc::new(AtomicBool::new(false));
        listen(&socket, running, |_| {}).await;
    }
}
