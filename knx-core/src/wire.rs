//! KNXnet/IP tunneling: сборка и разбор кадров.
//!
//! Только то, что нужно монитору (чтение шины): CONNECT, CONNECTIONSTATE,
//! DISCONNECT, TUNNELING_REQUEST/ACK и cEMI `L_Data.ind`.

use std::net::{SocketAddr, SocketAddrV4};

use crate::address::{Destination, GroupAddress, IndividualAddress};
use crate::error::FrameError;
use crate::telegram::{BusEvent, EventKind};

pub const HEADER_LEN: u8 = 0x06;
pub const KNXNET_IP_VERSION: u8 = 0x10;

pub const CONNECT_REQUEST: u16 = 0x0205;
pub const CONNECT_RESPONSE: u16 = 0x0206;
pub const CONNECTIONSTATE_REQUEST: u16 = 0x0207;
pub const CONNECTIONSTATE_RESPONSE: u16 = 0x0208;
pub const DISCONNECT_REQUEST: u16 = 0x0209;
pub const DISCONNECT_RESPONSE: u16 = 0x020A;
pub const TUNNELING_REQUEST: u16 = 0x0420;
pub const TUNNELING_ACK: u16 = 0x0421;

/// cEMI L_Data.ind
const CEMI_L_DATA_IND: u8 = 0x29;

const HPAI_LEN: u8 = 0x08;
const HPAI_UDP: u8 = 0x01;
const TUNNEL_CONNECTION: u8 = 0x04;
const TUNNEL_LINKLAYER: u8 = 0x02;

const APCI_GROUP_READ: u16 = 0x000;
const APCI_GROUP_RESPONSE: u16 = 0x040;
const APCI_GROUP_WRITE: u16 = 0x080;

/// Разобранный входящий кадр от шлюза
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    ConnectResponse { channel_id: u8, status: u8 },
    ConnectionStateResponse { channel_id: u8, status: u8 },
    DisconnectRequest { channel_id: u8 },
    DisconnectResponse { channel_id: u8 },
    TunnelingRequest {
        channel_id: u8,
        seq: u8,
        /// `None`, если cEMI не групповая телеграмма со значением/чтением
        event: Option<BusEvent>,
    },
    TunnelingAck { channel_id: u8, seq: u8, status: u8 },
    /// Прочие сервисы (search, description, ...)
    Other(u16),
}

fn header(service: u16, body_len: usize) -> Vec<u8> {
    let total = (usize::from(HEADER_LEN) + body_len) as u16;
    let mut out = Vec::with_capacity(usize::from(total));
    out.push(HEADER_LEN);
    out.push(KNXNET_IP_VERSION);
    out.extend_from_slice(&service.to_be_bytes());
    out.extend_from_slice(&total.to_be_bytes());
    out
}

fn hpai(addr: SocketAddrV4) -> [u8; 8] {
    let ip = addr.ip().octets();
    let port = addr.port().to_be_bytes();
    [HPAI_LEN, HPAI_UDP, ip[0], ip[1], ip[2], ip[3], port[0], port[1]]
}

fn ipv4(addr: SocketAddr) -> Result<SocketAddrV4, FrameError> {
    match addr {
        SocketAddr::V4(v4) => Ok(v4),
        SocketAddr::V6(_) => Err(FrameError::Ipv6),
    }
}

/// CONNECT_REQUEST: control и data endpoint — один и тот же локальный сокет
pub fn build_connect_request(local: SocketAddr) -> Result<Vec<u8>, FrameError> {
    let local = ipv4(local)?;
    let mut out = header(CONNECT_REQUEST, 8 + 8 + 4);
    out.extend_from_slice(&hpai(local));
    out.extend_from_slice(&hpai(local));
    out.extend_from_slice(&[0x04, TUNNEL_CONNECTION, TUNNEL_LINKLAYER, 0x00]);
    Ok(out)
}

/// CONNECTIONSTATE_REQUEST (heartbeat)
pub fn build_connectionstate_request(
    channel_id: u8,
    local: SocketAddr,
) -> Result<Vec<u8>, FrameError> {
    let local = ipv4(local)?;
    let mut out = header(CONNECTIONSTATE_REQUEST, 2 + 8);
    out.extend_from_slice(&[channel_id, 0x00]);
    out.extend_from_slice(&hpai(local));
    Ok(out)
}

pub fn build_disconnect_request(channel_id: u8, local: SocketAddr) -> Result<Vec<u8>, FrameError> {
    let local = ipv4(local)?;
    let mut out = header(DISCONNECT_REQUEST, 2 + 8);
    out.extend_from_slice(&[channel_id, 0x00]);
    out.extend_from_slice(&hpai(local));
    Ok(out)
}

pub fn build_disconnect_response(channel_id: u8) -> Vec<u8> {
    let mut out = header(DISCONNECT_RESPONSE, 2);
    out.extend_from_slice(&[channel_id, 0x00]);
    out
}

/// TUNNELING_ACK: повторяет channel id и sequence counter запроса
pub fn build_tunneling_ack(channel_id: u8, seq: u8) -> Vec<u8> {
    let mut out = header(TUNNELING_ACK, 4);
    out.extend_from_slice(&[0x04, channel_id, seq, 0x00]);
    out
}

/// Разбор входящего кадра
pub fn decode(buf: &[u8]) -> Result<Frame, FrameError> {
    if buf.len() < usize::from(HEADER_LEN) {
        return Err(FrameError::TooShort);
    }
    if buf[0] != HEADER_LEN || buf[1] != KNXNET_IP_VERSION {
        return Err(FrameError::BadHeader);
    }

    let service = u16::from_be_bytes([buf[2], buf[3]]);
    let total = usize::from(u16::from_be_bytes([buf[4], buf[5]]));
    if total < usize::from(HEADER_LEN) || buf.len() < total {
        return Err(FrameError::TooShort);
    }
    let body = &buf[usize::from(HEADER_LEN)..total];

    let frame = match service {
        CONNECT_RESPONSE => {
            let [channel_id, status] = first2(body)?;
            Frame::ConnectResponse { channel_id, status }
        }
        CONNECTIONSTATE_RESPONSE => {
            let [channel_id, status] = first2(body)?;
            Frame::ConnectionStateResponse { channel_id, status }
        }
        DISCONNECT_REQUEST => Frame::DisconnectRequest {
            channel_id: first2(body)?[0],
        },
        DISCONNECT_RESPONSE => Frame::DisconnectResponse {
            channel_id: first2(body)?[0],
        },
        TUNNELING_REQUEST => {
            if body.len() < 4 {
                return Err(FrameError::TooShort);
            }
            let conn_len = usize::from(body[0]);
            if conn_len < 4 || body.len() < conn_len {
                return Err(FrameError::TooShort);
            }
            Frame::TunnelingRequest {
                channel_id: body[1],
                seq: body[2],
                event: parse_cemi(&body[conn_len..]),
            }
        }
        TUNNELING_ACK => {
            if body.len() < 4 {
                return Err(FrameError::TooShort);
            }
            Frame::TunnelingAck {
                channel_id: body[1],
                seq: body[2],
                status: body[3],
            }
        }
        other => Frame::Other(other),
    };

    Ok(frame)
}

fn first2(body: &[u8]) -> Result<[u8; 2], FrameError> {
    match body {
        [a, b, ..] => Ok([*a, *b]),
        _ => Err(FrameError::TooShort),
    }
}

/// Групповая телеграмма из cEMI `L_Data.ind`.
///
/// Возвращает `None` для прочих message code, коротких кадров и
/// не групповых сервисов (memory, property и т.п.).
pub fn parse_cemi(cemi: &[u8]) -> Option<BusEvent> {
    if *cemi.first()? != CEMI_L_DATA_IND {
        return None;
    }
    let base = 2 + usize::from(*cemi.get(1)?);

    let ctrl2 = *cemi.get(base + 1)?;
    let src = u16::from_be_bytes([*cemi.get(base + 2)?, *cemi.get(base + 3)?]);
    let dst = u16::from_be_bytes([*cemi.get(base + 4)?, *cemi.get(base + 5)?]);
    let npdu_len = usize::from(*cemi.get(base + 6)?);

    // TPCI + APCI минимум
    if npdu_len == 0 || cemi.len() < base + 8 + npdu_len {
        return None;
    }

    let tpci = cemi[base + 7];
    let apci_low = cemi[base + 8];
    let apci = ((u16::from(tpci & 0x03) << 8) | u16::from(apci_low)) & 0x03C0;

    let kind = match apci {
        APCI_GROUP_READ => EventKind::GroupRead,
        APCI_GROUP_RESPONSE => EventKind::GroupResponse,
        APCI_GROUP_WRITE => EventKind::GroupWrite,
        _ => return None,
    };

    let payload = match kind {
        EventKind::GroupRead => Vec::new(),
        // 6 бит данных прямо в APCI
        _ if npdu_len == 1 => vec![apci_low & 0x3F],
        _ => cemi[base + 9..base + 8 + npdu_len].to_vec(),
    };

    let destination = if ctrl2 & 0x80 != 0 {
        Destination::Group(GroupAddress::from_raw(dst))
    } else {
        Destination::Individual(IndividualAddress::from_raw(dst))
    };

    Some(BusEvent {
        kind,
        source: IndividualAddress::from_raw(src),
        destination,
        payload,
    })
}
