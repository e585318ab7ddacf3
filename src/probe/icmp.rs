use std::net::{IpAddr, Ipv4Addr};
use std::time::Instant;

use pnet::packet::Packet;
use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet::packet::icmp::{IcmpPacket, IcmpTypes, checksum};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::transport::TransportChannelType::Layer4;
use pnet::transport::TransportProtocol::Ipv4;
use pnet::transport::{IcmpTransportChannelIterator, icmp_packet_iter, transport_channel};

use super::{ProbeError, ProbeSettings, ProbeStats, Prober};

/// 8 byte ICMP echo header followed by 8 bytes of zeroed payload.
const ECHO_REQUEST_LEN: usize = 16;
const RECV_BUFFER_LEN: usize = 4096;

/// [`Prober`] sending raw ICMPv4 echo requests.
///
/// Opening the raw socket requires `CAP_NET_RAW`. Every probe uses its own socket
/// and a random echo identifier, so concurrent probes never count each other's
/// replies.
#[derive(Debug, Clone, Copy, Default)]
pub struct IcmpProber;

impl Prober for IcmpProber {
    async fn probe(&self, ip: &str, settings: ProbeSettings) -> Result<ProbeStats, ProbeError> {
        let target = parse_target(ip)?;
        tokio::task::spawn_blocking(move || echo(target, settings))
            .await
            .map_err(ProbeError::Task)?
    }
}

fn parse_target(ip: &str) -> Result<Ipv4Addr, ProbeError> {
    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(addr)) => Ok(addr),
        Ok(IpAddr::V6(_)) => Err(ProbeError::Unsupported(ip.to_owned())),
        Err(_) => Err(ProbeError::InvalidAddress(ip.to_owned())),
    }
}

/// Sends `settings.packet_count` echo requests, one after another, and waits for
/// each reply for an equal share of `settings.timeout`.
fn echo(target: Ipv4Addr, settings: ProbeSettings) -> Result<ProbeStats, ProbeError> {
    let protocol = Layer4(Ipv4(IpNextHeaderProtocols::Icmp));
    let (mut tx, mut rx) = transport_channel(RECV_BUFFER_LEN, protocol).map_err(ProbeError::Socket)?;
    let mut replies = icmp_packet_iter(&mut rx);

    let identifier: u16 = rand::random();
    let per_packet = settings.timeout / u32::from(settings.packet_count.max(1));
    let deadline = Instant::now() + settings.timeout;
    let mut buffer = [0u8; ECHO_REQUEST_LEN];
    let mut stats = ProbeStats::default();

    for sequence in 0..settings.packet_count {
        let sent_at = Instant::now();
        if sent_at >= deadline {
            break;
        }
        let request = build_echo_request(&mut buffer, identifier, sequence)?;
        tx.send_to(request, IpAddr::V4(target))
            .map_err(|source| ProbeError::Send {
                ip: target.to_string(),
                source,
            })?;
        stats.packets_sent += 1;

        let wait_until = (sent_at + per_packet).min(deadline);
        if await_reply(&mut replies, target, identifier, sequence, wait_until)? {
            stats.packets_received += 1;
        }
    }
    log::trace!(
        "echo {}: sent={}, received={}",
        target,
        stats.packets_sent,
        stats.packets_received
    );

    Ok(stats)
}

fn build_echo_request(
    buffer: &mut [u8],
    identifier: u16,
    sequence: u16,
) -> Result<MutableEchoRequestPacket<'_>, ProbeError> {
    let mut packet = MutableEchoRequestPacket::new(buffer).ok_or(ProbeError::Packet)?;
    packet.set_icmp_type(IcmpTypes::EchoRequest);
    packet.set_identifier(identifier);
    packet.set_sequence_number(sequence);
    packet.set_checksum(0);
    let sum = checksum(&IcmpPacket::new(packet.packet()).ok_or(ProbeError::Packet)?);
    packet.set_checksum(sum);

    Ok(packet)
}

/// Returns `true` once the matching echo reply arrives, `false` when `until` passes.
fn await_reply(
    replies: &mut IcmpTransportChannelIterator<'_>,
    target: Ipv4Addr,
    identifier: u16,
    sequence: u16,
    until: Instant,
) -> Result<bool, ProbeError> {
    loop {
        let now = Instant::now();
        if now >= until {
            return Ok(false);
        }
        let Some((packet, source)) = replies
            .next_with_timeout(until - now)
            .map_err(ProbeError::Receive)?
        else {
            return Ok(false);
        };
        if source != IpAddr::V4(target) || packet.get_icmp_type() != IcmpTypes::EchoReply {
            continue;
        }
        let Some(reply) = EchoReplyPacket::new(packet.packet()) else {
            continue;
        };
        if reply.get_identifier() == identifier && reply.get_sequence_number() == sequence {
            return Ok(true);
        }
    }
}
