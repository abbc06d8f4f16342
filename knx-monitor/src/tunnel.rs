use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, anyhow, bail};
use crossbeam_channel::Sender;
use log::{debug, info, warn};

use knx_core::BusEvent;
use knx_core::error::FrameError;
use knx_core::wire::{
    Frame, build_connect_request, build_connectionstate_request, build_disconnect_request,
    build_disconnect_response, build_tunneling_ack, decode,
};

use crate::config::{
    CONNECT_TIMEOUT, HEARTBEAT_ATTEMPTS, HEARTBEAT_INTERVAL, HEARTBEAT_TIMEOUT, UDP_SOCKET_TICK,
};

/// Расписание CONNECTIONSTATE_REQUEST
#[derive(Debug, Clone, Copy)]
pub(crate) struct Heartbeat {
    pub(crate) interval: Duration,
    pub(crate) timeout: Duration,
    /// Сколько запросов подряд может остаться без ответа
    pub(crate) attempts: u32,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            interval: HEARTBEAT_INTERVAL,
            timeout: HEARTBEAT_TIMEOUT,
            attempts: HEARTBEAT_ATTEMPTS,
        }
    }
}

/// Открытый KNXnet/IP туннель к шлюзу
pub(crate) struct Tunnel {
    sock: UdpSocket,
    gateway: SocketAddr,
    local: SocketAddr,
    channel_id: u8,
    heartbeat: Heartbeat,
}

fn is_tick(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut
}

impl Tunnel {
    /// CONNECT_REQUEST -> ждём CONNECT_RESPONSE не дольше `CONNECT_TIMEOUT`.
    /// Выставленный `shutdown` прерывает ожидание на ближайшем тике.
    pub(crate) fn connect(gateway: SocketAddr, shutdown: &AtomicBool) -> anyhow::Result<Self> {
        let sock = UdpSocket::bind(("0.0.0.0", 0)).context("bind UDP socket")?;
        // после connect local_addr() показывает реальный IP интерфейса, он нужен в HPAI
        sock.connect(gateway)
            .with_context(|| format!("connect UDP socket to {gateway}"))?;
        sock.set_read_timeout(Some(UDP_SOCKET_TICK))?;
        let local = sock.local_addr()?;

        sock.send(&build_connect_request(local)?)
            .context("send CONNECT_REQUEST")?;

        let deadline = Instant::now() + CONNECT_TIMEOUT;
        let mut buf = [0u8; 512];

        let channel_id = loop {
            if shutdown.load(Ordering::Relaxed) {
                bail!("interrupted while connecting to {gateway}");
            }
            if Instant::now() >= deadline {
                bail!("timeout waiting for CONNECT_RESPONSE from {gateway}");
            }

            match sock.recv(&mut buf) {
                Ok(n) => match decode(&buf[..n]) {
                    Ok(Frame::ConnectResponse {
                        channel_id,
                        status: 0,
                    }) => break channel_id,
                    Ok(Frame::ConnectResponse { status, .. }) => {
                        return Err(FrameError::Rejected(status).into());
                    }
                    Ok(other) => debug!("ignoring {other:?} while connecting"),
                    Err(e) => warn!("bad frame from {gateway}: {e}"),
                },
                Err(e) if is_tick(&e) => continue,
                Err(e) => return Err(e).context("receive CONNECT_RESPONSE"),
            }
        };

        info!("KNX tunnel connected: gateway={gateway}, local={local}, channel_id={channel_id}");

        Ok(Self {
            sock,
            gateway,
            local,
            channel_id,
            heartbeat: Heartbeat::default(),
        })
    }

    #[cfg(test)]
    fn with_heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub(crate) fn gateway(&self) -> SocketAddr {
        self.gateway
    }

    /// Цикл приёма: ACK на каждый TUNNELING_REQUEST, heartbeat, события в канал.
    ///
    /// `Ok(())` — туннель закрыт штатно (shutdown, шлюз отключился, монитор
    /// перестал читать канал). `Err` — транспорт сломался.
    pub(crate) fn run(self, tx: Sender<BusEvent>, shutdown: Arc<AtomicBool>) -> anyhow::Result<()> {
        let mut buf = [0u8; 1024];
        let mut last_heartbeat = Instant::now();
        let mut pending_heartbeat: Option<Instant> = None;
        let mut missed_heartbeats = 0u32;
        let mut last_seq: Option<u8> = None;

        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("closing KNX tunnel...");
                self.disconnect();
                return Ok(());
            }

            match pending_heartbeat {
                Some(sent) if sent.elapsed() > self.heartbeat.timeout => {
                    missed_heartbeats += 1;
                    if missed_heartbeats >= self.heartbeat.attempts {
                        bail!(
                            "gateway {} stopped answering heartbeats ({missed_heartbeats} attempts)",
                            self.gateway
                        );
                    }
                    warn!(
                        "heartbeat {missed_heartbeats}/{} unanswered; retrying",
                        self.heartbeat.attempts
                    );
                    self.send_heartbeat()?;
                    pending_heartbeat = Some(Instant::now());
                }
                Some(_) => {}
                None if last_heartbeat.elapsed() >= self.heartbeat.interval => {
                    self.send_heartbeat()?;
                    last_heartbeat = Instant::now();
                    pending_heartbeat = Some(last_heartbeat);
                }
                None => {}
            }

            let n = match self.sock.recv(&mut buf) {
                Ok(n) => n,
                Err(e) if is_tick(&e) => continue,
                Err(e) => return Err(e).context("receive from KNX gateway"),
            };

            match decode(&buf[..n]) {
                Ok(Frame::TunnelingRequest {
                    channel_id,
                    seq,
                    event,
                }) => {
                    if channel_id != self.channel_id {
                        debug!("tunneling request for foreign channel {channel_id}");
                        continue;
                    }

                    self.sock
                        .send(&build_tunneling_ack(channel_id, seq))
                        .context("send TUNNELING_ACK")?;

                    // повтор того же seq (наш ACK потерялся) — подтверждаем, но не обрабатываем
                    if last_seq == Some(seq) {
                        debug!("duplicate tunneling request seq={seq}");
                        continue;
                    }
                    last_seq = Some(seq);

                    if let Some(event) = event {
                        if tx.send(event).is_err() {
                            info!("monitor stopped; closing KNX tunnel");
                            self.disconnect();
                            return Ok(());
                        }
                    }
                }
                Ok(Frame::ConnectionStateResponse { channel_id, status })
                    if channel_id == self.channel_id =>
                {
                    if status != 0 {
                        return Err(anyhow!(
                            "gateway reported connection error 0x{status:02x}"
                        ));
                    }
                    pending_heartbeat = None;
                    missed_heartbeats = 0;
                }
                Ok(Frame::DisconnectRequest { channel_id }) if channel_id == self.channel_id => {
                    if let Err(e) = self.sock.send(&build_disconnect_response(channel_id)) {
                        warn!("failed to send DISCONNECT_RESPONSE: {e}");
                    }
                    info!("gateway closed the KNX tunnel");
                    return Ok(());
                }
                Ok(Frame::DisconnectResponse { channel_id }) if channel_id == self.channel_id => {
                    return Ok(());
                }
                Ok(other) => debug!("ignoring {other:?}"),
                Err(e) => warn!("bad frame from gateway: {e}"),
            }
        }
    }

    fn send_heartbeat(&self) -> anyhow::Result<()> {
        self.sock
            .send(&build_connectionstate_request(self.channel_id, self.local)?)
            .context("send CONNECTIONSTATE_REQUEST")?;
        debug!("heartbeat sent");
        Ok(())
    }

    /// DISCONNECT_REQUEST без ожидания ответа: процесс всё равно завершается
    fn disconnect(&self) {
        match build_disconnect_request(self.channel_id, self.local) {
            Ok(frame) => {
                if let Err(e) = self.sock.send(&frame) {
                    warn!("failed to send DISCONNECT_REQUEST: {e}");
                }
            }
            Err(e) => warn!("failed to build DISCONNECT_REQUEST: {e}"),
        }
    }
}

/// Запускает туннель в отдельном потоке
pub(crate) fn spawn(
    tunnel: Tunnel,
    tx: Sender<BusEvent>,
    shutdown: Arc<AtomicBool>,
) -> io::Result<thread::JoinHandle<anyhow::Result<()>>> {
    thread::Builder::new()
        .name("knx-tunnel".into())
        .spawn(move || tunnel.run(tx, shutdown))
}

#[cfg(test)]
mod tests {
    use super::*;
    use knx_core::EventKind;
    use knx_core::wire::{DISCONNECT_RESPONSE, TUNNELING_ACK};

    const CEMI_WRITE_TEMP: &[u8] = &[
        0x29, 0x00, 0xBC, 0xE0, 0x11, 0x05, 0x08, 0x1F, 0x03, 0x00, 0x80, 0x0C, 0x33,
    ];

    fn frame(service: u16, body: &[u8]) -> Vec<u8> {
        let total = (6 + body.len()) as u16;
        let mut out = vec![0x06, 0x10];
        out.extend_from_slice(&service.to_be_bytes());
        out.extend_from_slice(&total.to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    fn tunneling_request(channel_id: u8, seq: u8) -> Vec<u8> {
        let mut body = vec![0x04, channel_id, seq, 0x00];
        body.extend_from_slice(CEMI_WRITE_TEMP);
        frame(0x0420, &body)
    }

    fn service(buf: &[u8]) -> u16 {
        u16::from_be_bytes([buf[2], buf[3]])
    }

    fn fake_gateway() -> UdpSocket {
        let gw = UdpSocket::bind("127.0.0.1:0").unwrap();
        gw.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        gw
    }

    /// Принимает CONNECT_REQUEST и отвечает channel_id=7
    fn accept_connect(gw: &UdpSocket, status: u8) -> SocketAddr {
        let mut buf = [0u8; 256];
        let (n, client) = gw.recv_from(&mut buf).unwrap();
        assert_eq!(service(&buf[..n]), 0x0205);
        gw.send_to(&frame(0x0206, &[7, status]), client).unwrap();
        client
    }

    #[test]
    fn connect_run_ack_and_gateway_disconnect() {
        let gw = fake_gateway();
        let gw_addr = gw.local_addr().unwrap();

        let server = thread::spawn(move || {
            let client = accept_connect(&gw, 0);
            let mut buf = [0u8; 256];

            // телеграмма + её повтор с тем же seq
            gw.send_to(&tunneling_request(7, 0), client).unwrap();
            let (n, _) = gw.recv_from(&mut buf).unwrap();
            assert_eq!(service(&buf[..n]), TUNNELING_ACK);
            assert_eq!(&buf[6..10], &[0x04, 7, 0, 0]);

            gw.send_to(&tunneling_request(7, 0), client).unwrap();
            let (n, _) = gw.recv_from(&mut buf).unwrap();
            assert_eq!(service(&buf[..n]), TUNNELING_ACK);

            // шлюз закрывает туннель
            gw.send_to(&frame(0x0209, &[7, 0]), client).unwrap();
            let (n, _) = gw.recv_from(&mut buf).unwrap();
            assert_eq!(service(&buf[..n]), DISCONNECT_RESPONSE);
        });

        let tunnel = Tunnel::connect(gw_addr, &AtomicBool::new(false)).unwrap();
        assert_eq!(tunnel.gateway(), gw_addr);

        let (tx, rx) = crossbeam_channel::bounded(16);
        let shutdown = Arc::new(AtomicBool::new(false));
        tunnel.run(tx, shutdown).unwrap();

        let events: Vec<BusEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 1, "duplicate seq must not be forwarded");
        assert_eq!(events[0].kind, EventKind::GroupWrite);
        assert_eq!(events[0].destination.to_string(), "1/0/31");
        assert_eq!(events[0].payload, vec![0x0C, 0x33]);

        server.join().unwrap();
    }

    #[test]
    fn rejected_connect_is_error() {
        let gw = fake_gateway();
        let gw_addr = gw.local_addr().unwrap();

        let server = thread::spawn(move || {
            accept_connect(&gw, 0x24);
        });

        let err = Tunnel::connect(gw_addr, &AtomicBool::new(false)).err().expect("connect must fail");
        assert!(err.to_string().contains("rejected"), "{err}");
        server.join().unwrap();
    }

    #[test]
    fn shutdown_sends_disconnect() {
        let gw = fake_gateway();
        let gw_addr = gw.local_addr().unwrap();

        let server = thread::spawn(move || {
            accept_connect(&gw, 0);
            let mut buf = [0u8; 256];
            let (n, _) = gw.recv_from(&mut buf).unwrap();
            assert_eq!(service(&buf[..n]), 0x0209);
            assert_eq!(buf[6], 7);
        });

        let tunnel = Tunnel::connect(gw_addr, &AtomicBool::new(false)).unwrap();
        let (tx, _rx) = crossbeam_channel::bounded(1);
        let shutdown = Arc::new(AtomicBool::new(true));
        tunnel.run(tx, shutdown).unwrap();

        server.join().unwrap();
    }

    #[test]
    fn closed_channel_stops_tunnel() {
        let gw = fake_gateway();
        let gw_addr = gw.local_addr().unwrap();

        let server = thread::spawn(move || {
            let client = accept_connect(&gw, 0);
            gw.send_to(&tunneling_request(7, 1), client).unwrap();

            let mut buf = [0u8; 256];
            let (n, _) = gw.recv_from(&mut buf).unwrap();
            assert_eq!(service(&buf[..n]), TUNNELING_ACK);
            let (n, _) = gw.recv_from(&mut buf).unwrap();
            assert_eq!(service(&buf[..n]), 0x0209);
        });

        let tunnel = Tunnel::connect(gw_addr, &AtomicBool::new(false)).unwrap();
        let (tx, rx) = crossbeam_channel::bounded(1);
        drop(rx);
        tunnel.run(tx, Arc::new(AtomicBool::new(false))).unwrap();

        server.join().unwrap();
    }

    const FAST_HEARTBEAT: Heartbeat = Heartbeat {
        interval: Duration::from_millis(100),
        timeout: Duration::from_millis(300),
        attempts: 3,
    };

    /// Ждёт кадр нужного сервиса, считая попутные CONNECTIONSTATE_REQUEST
    fn wait_for(gw: &UdpSocket, wanted: u16, heartbeats: &mut usize) -> Vec<u8> {
        let mut buf = [0u8; 256];
        loop {
            let (n, _) = gw.recv_from(&mut buf).unwrap();
            match service(&buf[..n]) {
                s if s == wanted => return buf[..n].to_vec(),
                0x0207 => *heartbeats += 1,
                other => panic!("unexpected service 0x{other:04x}"),
            }
        }
    }

    #[test]
    fn lost_heartbeat_reply_is_retried() {
        let gw = fake_gateway();
        let gw_addr = gw.local_addr().unwrap();

        let server = thread::spawn(move || {
            let client = accept_connect(&gw, 0);
            let mut heartbeats = 0;

            // первый запрос "теряем", на второй отвечаем
            let first = wait_for(&gw, 0x0207, &mut heartbeats);
            assert_eq!(first[6], 7);
            wait_for(&gw, 0x0207, &mut heartbeats);
            gw.send_to(&frame(0x0208, &[7, 0]), client).unwrap();

            gw.send_to(&frame(0x0209, &[7, 0]), client).unwrap();
            wait_for(&gw, DISCONNECT_RESPONSE, &mut heartbeats);
            heartbeats + 2
        });

        let tunnel = Tunnel::connect(gw_addr, &AtomicBool::new(false))
            .unwrap()
            .with_heartbeat(FAST_HEARTBEAT);
        let (tx, _rx) = crossbeam_channel::bounded(1);
        tunnel.run(tx, Arc::new(AtomicBool::new(false))).unwrap();

        assert!(server.join().unwrap() >= 2);
    }

    #[test]
    fn gives_up_after_unanswered_heartbeats() {
        let gw = fake_gateway();
        let gw_addr = gw.local_addr().unwrap();

        let server = thread::spawn(move || {
            let client = accept_connect(&gw, 0);
            let mut buf = [0u8; 256];
            let mut heartbeats = 0;

            // отвечаем только от чужого канала: такие ответы не засчитываются
            while let Ok((n, _)) = gw.recv_from(&mut buf) {
                if service(&buf[..n]) == 0x0207 {
                    heartbeats += 1;
                    gw.send_to(&frame(0x0208, &[9, 0]), client).unwrap();
                }
            }
            heartbeats
        });

        let tunnel = Tunnel::connect(gw_addr, &AtomicBool::new(false))
            .unwrap()
            .with_heartbeat(FAST_HEARTBEAT);
        let (tx, _rx) = crossbeam_channel::bounded(1);
        let err = tunnel.run(tx, Arc::new(AtomicBool::new(false))).unwrap_err();
        assert!(err.to_string().contains("stopped answering heartbeats"), "{err}");

        assert_eq!(server.join().unwrap(), 3);
    }

    #[test]
    fn shutdown_interrupts_connect() {
        // шлюз молчит
        let gw = fake_gateway();
        let started = Instant::now();

        let err = Tunnel::connect(gw.local_addr().unwrap(), &AtomicBool::new(true))
            .err()
            .expect("connect must be interrupted");

        assert!(err.to_string().contains("interrupted"), "{err}");
        assert!(started.elapsed() < CONNECT_TIMEOUT);
    }
}
