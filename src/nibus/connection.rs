//! # NIBUS Connection
//!
//! One connection owns one transport (a serial port, or anything
//! `AsyncRead + AsyncWrite`) and multiplexes requests over it. A reader
//! task reassembles frames and routes replies to whichever pending request
//! they answer; a writer task serializes outbound frames FIFO. Every
//! decoded NMS and SARP datagram is also fanned out on a broadcast event
//! stream, so passive observers (telemetry, discovery) see solicited
//! replies as well as unsolicited traffic.
//!
//! ## Reply correlation
//!
//! A request expects one reply, except batch reads which expect one reply
//! per property id. The reply deadline is sliding: every arriving reply
//! restarts it, so a slow batch is not cut off mid-stream. On expiry a
//! batch that has produced at least one reply resolves with the partial
//! set; a request with none fails with [`NibusError::Timeout`]. Closing
//! the connection fails every pending request with [`NibusError::Closed`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::constants::{DEFAULT_TIMEOUT_MS, VERSION_ID};
use crate::error::NibusError;
use crate::nibus::address::Address;
use crate::nibus::decoder::NibusDecoder;
use crate::nibus::description::MibDescription;
use crate::nibus::frame::NibusDatagram;
use crate::nms::{create_nms_read, NmsDatagram, NmsServiceType};
use crate::sarp::{create_sarp, SarpDatagram, SarpQueryType};

/// Anything the connection can put on the wire.
#[derive(Debug, Clone)]
pub enum Datagram {
    Nibus(NibusDatagram),
    Nms(NmsDatagram),
    Sarp(SarpDatagram),
}

impl Datagram {
    fn raw(&self) -> &[u8] {
        match self {
            Datagram::Nibus(frame) => &frame.raw,
            Datagram::Nms(nms) => &nms.frame.raw,
            Datagram::Sarp(sarp) => &sarp.frame.raw,
        }
    }
}

impl From<NibusDatagram> for Datagram {
    fn from(frame: NibusDatagram) -> Self {
        Datagram::Nibus(frame)
    }
}

impl From<NmsDatagram> for Datagram {
    fn from(nms: NmsDatagram) -> Self {
        Datagram::Nms(nms)
    }
}

impl From<SarpDatagram> for Datagram {
    fn from(sarp: SarpDatagram) -> Self {
        Datagram::Sarp(sarp)
    }
}

/// What a send resolved to.
#[derive(Debug, Clone)]
pub enum NmsReply {
    /// The datagram did not solicit a reply.
    None,
    One(NmsDatagram),
    /// Batch read replies, possibly partial after a timeout.
    Many(Vec<NmsDatagram>),
}

/// Decoded inbound traffic plus lifecycle changes. NMS replies show up
/// here even when they also resolved a pending request.
#[derive(Debug, Clone)]
pub enum NibusEvent {
    Nms(NmsDatagram),
    Sarp(SarpDatagram),
    Close,
}

/// The device version register, decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceVersion {
    pub version: u16,
    pub device_type: u16,
}

struct Waiter {
    token: u64,
    req: NmsDatagram,
    remaining: usize,
    tx: mpsc::UnboundedSender<NmsDatagram>,
}

/// Unregisters its waiter when dropped, so cancelling a send future never
/// leaves a stale entry in the table.
struct WaiterGuard {
    inner: Arc<Inner>,
    token: u64,
    rx: mpsc::UnboundedReceiver<NmsDatagram>,
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        self.inner.remove_waiter(self.token);
    }
}

struct WriteRequest {
    bytes: Vec<u8>,
    done: oneshot::Sender<std::io::Result<()>>,
}

struct Inner {
    closed: AtomicBool,
    waiters: Mutex<Vec<Waiter>>,
    writer_tx: Mutex<Option<mpsc::Sender<WriteRequest>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<NibusEvent>,
    timeout_ms: AtomicU64,
    next_token: AtomicU64,
}

impl Inner {
    /// Delivers a decoded frame to its waiter or the event stream.
    fn route(&self, frame: NibusDatagram) {
        if NmsDatagram::is_nms_frame(&frame) {
            match NmsDatagram::from_frame(frame) {
                Some(nms) => self.route_nms(nms),
                None => trace!("dropping NMS frame with unknown service"),
            }
        } else if SarpDatagram::is_sarp_frame(&frame) {
            if let Some(sarp) = SarpDatagram::from_frame(frame) {
                trace!("SARP from {}", sarp.frame.source);
                let _ = self.events.send(NibusEvent::Sarp(sarp));
            }
        } else {
            debug!("dropping frame with unknown protocol {}", frame.protocol);
        }
    }

    fn route_nms(&self, nms: NmsDatagram) {
        {
            let mut waiters = self.waiters.lock().expect("waiter list poisoned");
            if let Some(pos) = waiters.iter().position(|w| nms.is_response_for(&w.req)) {
                let waiter = &mut waiters[pos];
                trace!(
                    "reply {} of {} for request {}",
                    waiter.req.id,
                    waiter.remaining,
                    waiter.token
                );
                let _ = waiter.tx.send(nms.clone());
                waiter.remaining -= 1;
                if waiter.remaining == 0 {
                    waiters.remove(pos);
                }
            }
        }
        // Every NMS datagram reaches the event stream, matched or not;
        // passive observers see the same traffic the waiters do.
        let _ = self.events.send(NibusEvent::Nms(nms));
    }

    /// Fails everything pending and announces the close. Idempotent.
    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.writer_tx.lock().expect("writer slot poisoned").take();
        // Dropping the senders makes every pending recv() resolve to None,
        // which the callers surface as Closed.
        self.waiters.lock().expect("waiter list poisoned").clear();
        let _ = self.events.send(NibusEvent::Close);
    }

    fn remove_waiter(&self, token: u64) {
        let mut waiters = self.waiters.lock().expect("waiter list poisoned");
        waiters.retain(|w| w.token != token);
    }
}

/// A live connection to one bus segment.
pub struct NibusConnection {
    inner: Arc<Inner>,
    description: MibDescription,
}

impl NibusConnection {
    /// Wraps a transport and starts the reader and writer tasks.
    pub fn new<T>(transport: T, description: MibDescription) -> Result<NibusConnection, NibusError>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        description.validate()?;
        let (read_half, write_half) = tokio::io::split(transport);
        let (writer_tx, writer_rx) = mpsc::channel::<WriteRequest>(16);
        let (events, _) = broadcast::channel(64);
        let inner = Arc::new(Inner {
            closed: AtomicBool::new(false),
            waiters: Mutex::new(Vec::new()),
            writer_tx: Mutex::new(Some(writer_tx)),
            reader: Mutex::new(None),
            events,
            timeout_ms: AtomicU64::new(DEFAULT_TIMEOUT_MS),
            next_token: AtomicU64::new(1),
        });

        tokio::spawn(writer_loop(write_half, writer_rx));
        let reader = tokio::spawn(reader_loop(read_half, inner.clone()));
        *inner.reader.lock().expect("reader slot poisoned") = Some(reader);

        debug!("connection up ({})", description.category);
        Ok(NibusConnection { inner, description })
    }

    pub fn description(&self) -> &MibDescription {
        &self.description
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// The sliding reply deadline applied when a datagram carries none.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.inner.timeout_ms.load(Ordering::Relaxed))
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.inner
            .timeout_ms
            .store(timeout.as_millis() as u64, Ordering::Relaxed);
    }

    /// Subscribes to decoded inbound traffic and lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<NibusEvent> {
        self.inner.events.subscribe()
    }

    /// Sends a datagram and, when it solicits replies, awaits them.
    ///
    /// The waiter is registered before the bytes hit the wire, so a reply
    /// can never race past its request.
    pub async fn send_datagram(
        &self,
        datagram: impl Into<Datagram>,
    ) -> Result<NmsReply, NibusError> {
        let datagram = datagram.into();
        if self.is_closed() {
            return Err(NibusError::Closed);
        }

        let pending = match &datagram {
            Datagram::Nms(nms) if !nms.is_response && !nms.not_reply => {
                Some(self.register(nms))
            }
            _ => None,
        };

        trace!("send {}", hex::encode(datagram.raw()));
        // The guard drops on any early return, clearing the waiter.
        self.write(datagram.raw().to_vec()).await?;

        let (expected, mut guard) = match pending {
            Some(pending) => pending,
            None => return Ok(NmsReply::None),
        };
        let req = match &datagram {
            Datagram::Nms(nms) => nms,
            _ => unreachable!("only NMS datagrams register waiters"),
        };
        let deadline = req.timeout.unwrap_or_else(|| self.timeout());

        let mut replies = Vec::with_capacity(expected);
        loop {
            match tokio::time::timeout(deadline, guard.rx.recv()).await {
                Ok(Some(reply)) => {
                    replies.push(reply);
                    if replies.len() == expected {
                        break;
                    }
                }
                Ok(None) => return Err(NibusError::Closed),
                Err(_) => {
                    if replies.is_empty() {
                        return Err(NibusError::Timeout {
                            destination: req.frame.destination.clone(),
                            service: req.service,
                        });
                    }
                    debug!(
                        "batch read to {} timed out with {} of {} replies",
                        req.frame.destination,
                        replies.len(),
                        expected
                    );
                    break;
                }
            }
        }
        if expected == 1 {
            let reply = replies.pop().expect("loop exits with at least one reply");
            Ok(NmsReply::One(reply))
        } else {
            Ok(NmsReply::Many(replies))
        }
    }

    /// Round-trip time to a device, measured against the version register.
    pub async fn ping(&self, destination: Address) -> Option<Duration> {
        let sent = Instant::now();
        let req = create_nms_read(destination, &[VERSION_ID]).ok()?;
        match self.send_datagram(req).await {
            Ok(NmsReply::One(reply)) => Some(
                reply
                    .frame
                    .received_at
                    .map(|at| at.saturating_duration_since(sent))
                    .unwrap_or_else(|| sent.elapsed()),
            ),
            _ => None,
        }
    }

    /// Reads and decodes the version register.
    ///
    /// The register packs the firmware version in the low half word and the
    /// device type in the high one. A non-zero status or an unreadable
    /// value yields `None`.
    pub async fn get_version(&self, destination: Address) -> Option<DeviceVersion> {
        let req = create_nms_read(destination, &[VERSION_ID]).ok()?;
        let reply = match self.send_datagram(req).await.ok()? {
            NmsReply::One(reply) => reply,
            _ => return None,
        };
        if reply.status()? != 0 {
            debug!(
                "version read from {} failed: status {:?}",
                reply.frame.source,
                reply.status()
            );
            return None;
        }
        let value = reply.value()?.as_u32()?;
        Some(DeviceVersion {
            version: value as u16,
            device_type: (value >> 16) as u16,
        })
    }

    /// Broadcasts a SARP query for devices of one type. Responses arrive on
    /// the event stream.
    pub async fn find_by_type(&self, device_type: u16) -> Result<(), NibusError> {
        let param = [0, 0, 0, (device_type >> 8) as u8, device_type as u8];
        let query = create_sarp(SarpQueryType::ByType, param)?;
        self.send_datagram(query).await.map(|_| ())
    }

    /// Closes the connection, failing all pending requests with `Closed`.
    pub fn close(&self) {
        if self.is_closed() {
            return;
        }
        self.inner.shutdown();
        if let Some(reader) = self
            .inner
            .reader
            .lock()
            .expect("reader slot poisoned")
            .take()
        {
            reader.abort();
        }
        debug!("connection closed ({})", self.description.category);
    }

    fn register(&self, req: &NmsDatagram) -> (usize, WaiterGuard) {
        // Batch reads answer once per id: the primary id plus one per
        // 3-byte sub-request in the body.
        let expected = if req.service == NmsServiceType::Read {
            req.nms.len() / 3 + 1
        } else {
            1
        };
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .waiters
            .lock()
            .expect("waiter list poisoned")
            .push(Waiter {
                token,
                req: req.clone(),
                remaining: expected,
                tx,
            });
        (
            expected,
            WaiterGuard {
                inner: self.inner.clone(),
                token,
                rx,
            },
        )
    }

    async fn write(&self, bytes: Vec<u8>) -> Result<(), NibusError> {
        let tx = self
            .inner
            .writer_tx
            .lock()
            .expect("writer slot poisoned")
            .clone()
            .ok_or(NibusError::Closed)?;
        let (done, done_rx) = oneshot::channel();
        tx.send(WriteRequest { bytes, done })
            .await
            .map_err(|_| NibusError::Closed)?;
        done_rx.await.map_err(|_| NibusError::Closed)??;
        Ok(())
    }
}

impl Drop for NibusConnection {
    fn drop(&mut self) {
        self.close();
    }
}

async fn reader_loop<R>(mut read_half: R, inner: Arc<Inner>)
where
    R: AsyncRead + Unpin,
{
    let mut decoder = NibusDecoder::new();
    let mut buf = [0u8; 256];
    loop {
        match read_half.read(&mut buf).await {
            Ok(0) => {
                debug!("transport reached end of stream");
                break;
            }
            Ok(n) => {
                for frame in decoder.push(&buf[..n]) {
                    inner.route(frame);
                }
            }
            Err(err) => {
                warn!("transport read failed: {err}");
                break;
            }
        }
    }
    inner.shutdown();
}

async fn writer_loop<W>(mut write_half: W, mut rx: mpsc::Receiver<WriteRequest>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        let result = async {
            write_half.write_all(&req.bytes).await?;
            write_half.flush().await
        }
        .await;
        if let Err(err) = &result {
            warn!("transport write failed: {err}");
        }
        let _ = req.done.send(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PROTOCOL_NMS;
    use crate::nibus::serial_mock::mock_transport;
    use crate::nms::{create_nms_write, NmsOptions, NmsValue};

    fn connect() -> (NibusConnection, crate::nibus::serial_mock::MockHandle) {
        let (transport, handle) = mock_transport();
        let connection =
            NibusConnection::new(transport, MibDescription::default()).unwrap();
        (connection, handle)
    }

    async fn written(handle: &crate::nibus::serial_mock::MockHandle) -> Vec<u8> {
        for _ in 0..100 {
            let bytes = handle.take_written();
            if !bytes.is_empty() {
                return bytes;
            }
            tokio::task::yield_now().await;
        }
        Vec::new()
    }

    #[tokio::test]
    async fn not_reply_write_resolves_without_waiting() {
        let (connection, handle) = connect();
        let req = create_nms_write(
            "1.2.3".parse().unwrap(),
            5,
            &NmsValue::UInt8(1),
            true,
        )
        .unwrap();
        let raw = req.frame.raw.clone();
        let reply = connection.send_datagram(req).await.unwrap();
        assert!(matches!(reply, NmsReply::None));
        assert_eq!(written(&handle).await, raw);
    }

    #[tokio::test]
    async fn reply_is_correlated_by_source() {
        let (connection, handle) = connect();
        let destination: Address = "1.2.3".parse().unwrap();
        let req = create_nms_read(destination.clone(), &[VERSION_ID]).unwrap();

        let responder = tokio::spawn(async move {
            while handle.take_written().is_empty() {
                tokio::task::yield_now().await;
            }
            let resp = NmsDatagram::new(NmsOptions {
                destination: Address::Empty,
                source: destination,
                id: VERSION_ID,
                service: NmsServiceType::Read,
                is_response: true,
                nms: vec![0, 19, 0x02, 0x01, 0x04, 0x00],
                ..Default::default()
            })
            .unwrap();
            handle.feed(&resp.frame.raw);
        });

        let reply = connection.send_datagram(req).await.unwrap();
        responder.await.unwrap();
        match reply {
            NmsReply::One(nms) => assert_eq!(nms.value().unwrap().as_u32(), Some(0x0004_0102)),
            other => panic!("expected one reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn solicited_reply_also_reaches_observers() {
        let (connection, handle) = connect();
        let mut events = connection.subscribe();
        let destination: Address = "1.2.3".parse().unwrap();
        let req = create_nms_read(destination.clone(), &[VERSION_ID]).unwrap();

        let responder = tokio::spawn(async move {
            while handle.take_written().is_empty() {
                tokio::task::yield_now().await;
            }
            let resp = NmsDatagram::new(NmsOptions {
                destination: Address::Empty,
                source: destination,
                id: VERSION_ID,
                service: NmsServiceType::Read,
                is_response: true,
                nms: vec![0, 19, 1, 0, 0, 0],
                ..Default::default()
            })
            .unwrap();
            handle.feed(&resp.frame.raw);
        });

        // the reply resolves the request and still shows up as an event
        let reply = connection.send_datagram(req).await.unwrap();
        responder.await.unwrap();
        assert!(matches!(reply, NmsReply::One(_)));
        match events.recv().await.unwrap() {
            NibusEvent::Nms(nms) => {
                assert!(nms.is_response);
                assert_eq!(nms.id, VERSION_ID);
            }
            other => panic!("expected NMS event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn close_fails_pending_with_closed() {
        let (connection, _handle) = connect();
        let connection = Arc::new(connection);
        let req = create_nms_read("1.2.3".parse().unwrap(), &[VERSION_ID]).unwrap();
        let pending = tokio::spawn({
            let connection = connection.clone();
            async move { connection.send_datagram(req).await }
        });
        tokio::task::yield_now().await;
        connection.close();
        assert!(matches!(pending.await.unwrap(), Err(NibusError::Closed)));
        assert!(connection.is_closed());
    }

    #[tokio::test]
    async fn send_after_close_is_rejected() {
        let (connection, _handle) = connect();
        connection.close();
        let frame = NibusDatagram::new(
            0,
            Address::Empty,
            Address::Empty,
            PROTOCOL_NMS,
            vec![0, 0, 0],
        )
        .unwrap();
        assert!(matches!(
            connection.send_datagram(frame).await,
            Err(NibusError::Closed)
        ));
    }

    #[tokio::test]
    async fn eof_emits_close_event() {
        let (connection, handle) = connect();
        let mut events = connection.subscribe();
        handle.close();
        loop {
            if let NibusEvent::Close = events.recv().await.unwrap() {
                break;
            }
        }
        assert!(connection.is_closed());
    }

    #[tokio::test]
    async fn unsolicited_report_becomes_event() {
        let (connection, handle) = connect();
        let mut events = connection.subscribe();
        let report = crate::nms::create_nms_information_report(
            "1.2.3".parse().unwrap(),
            Address::Empty,
            0x30,
            &NmsValue::UInt8(7),
        )
        .unwrap();
        handle.feed(&report.frame.raw);
        match events.recv().await.unwrap() {
            NibusEvent::Nms(nms) => {
                assert_eq!(nms.service, NmsServiceType::InformationReport);
                assert_eq!(nms.id, 0x30);
            }
            other => panic!("expected NMS event, got {other:?}"),
        }
    }
}
