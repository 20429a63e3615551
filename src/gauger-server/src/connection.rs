// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Device connection lifecycle and the tasks bound to an open connection.
//!
//! Opening spawns three tasks tagged with the connection generation: a
//! line reader feeding the response router, the single-flight dispatch loop,
//! and a waiter that moves the session to streaming once the handshake is
//! acknowledged. All of them stop on their own once their generation is no
//! longer live. Close and reopen also abort them and wait until they are
//! gone, so the device is released before it is opened again.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{oneshot, Mutex};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use gauger_core::protocol::POSITION_QUERY;
use gauger_core::{
    CommandResult, ConnectionState, DispatchStep, DynResult, GaugerError, GaugerSession,
    RouteOutcome,
};

use crate::device::DeviceOpener;

pub type SharedSession = Arc<Mutex<GaugerSession>>;

/// Longest inbound line kept; longer runs without a newline are dropped.
const MAX_LINE_LEN: u64 = 4096;

/// Timing and behaviour of an open connection.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub open_delay: Duration,
    pub worker_delay: Duration,
    pub streaming_command: String,
    /// Idle position polling period; `None` disables polling.
    pub position_poll: Option<Duration>,
}

pub struct ConnectionManager {
    session: SharedSession,
    opener: Arc<dyn DeviceOpener>,
    settings: ConnectionSettings,
    /// Tasks of the live connection. Held across open/close so the two
    /// never interleave.
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ConnectionManager {
    pub fn new(
        session: SharedSession,
        opener: Arc<dyn DeviceOpener>,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            session,
            opener,
            settings,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    pub async fn connection(&self) -> ConnectionState {
        self.session.lock().await.connection()
    }

    /// Open the device and start streaming.
    ///
    /// A live connection is fully closed first. Jobs queued while the
    /// device was closed survive and are sent after the handshake.
    pub async fn open(&self) -> DynResult<u64> {
        let mut tasks = self.tasks.lock().await;
        {
            let mut session = self.session.lock().await;
            if session.connection() != ConnectionState::Closed {
                session.close();
            }
            session.begin_open();
        }
        stop_tasks(&mut tasks).await;

        info!("Opening gauger ({})", self.opener.describe());
        let mut device = match self.opener.open().await {
            Ok(device) => device,
            Err(e) => {
                error!("Failed to open gauger: {}", e);
                self.session.lock().await.abort_open();
                return Err(e);
            }
        };

        debug!("Waiting {:?} for the gauger to settle", self.settings.open_delay);
        time::sleep(self.settings.open_delay).await;
        if let Err(e) = device.discard_input() {
            warn!("Failed to discard gauger input: {}", e);
        }

        let (generation, handshake) = {
            let mut session = self.session.lock().await;
            let generation = session.mark_opened();
            let (_, rx) = session.enqueue_handshake(self.settings.streaming_command.clone());
            (generation, rx)
        };
        info!("Gauger connected (generation {})", generation);

        let simulated = self.opener.is_simulated();
        let (reader, writer) = tokio::io::split(device);
        let reader_task = tokio::spawn(run_reader(
            Arc::clone(&self.session),
            generation,
            reader,
        ));
        let reader_abort = reader_task.abort_handle();
        tasks.push(reader_task);
        tasks.push(tokio::spawn(run_dispatch_loop(
            Arc::clone(&self.session),
            generation,
            writer,
            reader_abort,
            DispatchSettings {
                worker_delay: self.settings.worker_delay,
                position_poll: self.settings.position_poll,
                simulated,
            },
        )));
        tasks.push(tokio::spawn(await_handshake(
            Arc::clone(&self.session),
            generation,
            handshake,
        )));

        Ok(generation)
    }

    /// Close the device, dropping every queued and outstanding job.
    pub async fn close(&self) {
        let mut tasks = self.tasks.lock().await;
        self.session.lock().await.close();
        stop_tasks(&mut tasks).await;
        info!("Gauger disconnected");
    }
}

/// Abort the tasks of the previous connection and wait for them to finish.
///
/// The device halves they own are dropped by the time this returns.
async fn stop_tasks(tasks: &mut Vec<JoinHandle<()>>) {
    for handle in tasks.iter() {
        handle.abort();
    }
    for handle in tasks.drain(..) {
        let _ = handle.await;
    }
}

/// Read newline-terminated lines and route them until EOF or a newer
/// connection takes over.
async fn run_reader<R>(session: SharedSession, generation: u64, reader: R)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut oversized = false;

    loop {
        buf.clear();
        match (&mut reader)
            .take(MAX_LINE_LEN)
            .read_until(b'\n', &mut buf)
            .await
        {
            Ok(0) => {
                warn!("Gauger closed the connection");
                break;
            }
            Ok(n) => {
                let complete = buf.last() == Some(&b'\n');
                if !complete && n as u64 >= MAX_LINE_LEN {
                    if !oversized {
                        warn!("Dropping gauger line longer than {} bytes", MAX_LINE_LEN);
                    }
                    oversized = true;
                    continue;
                }
                if std::mem::take(&mut oversized) {
                    // tail of the dropped line
                    continue;
                }
                let text = String::from_utf8_lossy(&buf);
                let line = text.trim();
                if line.is_empty() {
                    continue;
                }
                debug!("Gauger << {}", line);
                if session.lock().await.route_line(generation, line) == RouteOutcome::Stale {
                    return;
                }
            }
            Err(e) => {
                error!("Gauger read error: {}", e);
                break;
            }
        }
    }

    if session.lock().await.close_generation(generation) {
        info!("Gauger connection {} closed", generation);
    }
}

#[derive(Debug, Clone, Copy)]
struct DispatchSettings {
    worker_delay: Duration,
    position_poll: Option<Duration>,
    simulated: bool,
}

/// Single-flight dispatch: on every tick expire an overdue job, then send
/// the next queued frame if nothing is outstanding.
async fn run_dispatch_loop<W>(
    session: SharedSession,
    generation: u64,
    mut writer: W,
    reader: AbortHandle,
    settings: DispatchSettings,
) where
    W: AsyncWrite + Unpin,
{
    info!(
        "Gauger dispatch loop running every {:?}",
        settings.worker_delay
    );
    let mut ticker = time::interval(settings.worker_delay);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_poll: Option<Instant> = None;

    loop {
        ticker.tick().await;
        let now = Instant::now();

        let step = {
            let mut guard = session.lock().await;
            let Some(step) = guard.poll_dispatch(generation, now) else {
                break;
            };
            if step == DispatchStep::Empty {
                if let Some(period) = settings.position_poll {
                    if last_poll.map_or(true, |at| now.duration_since(at) >= period) {
                        last_poll = Some(now);
                        let (_, rx) = guard.enqueue(POSITION_QUERY, true);
                        spawn_position_poll(Arc::clone(&session), rx, settings.simulated);
                    }
                }
            }
            step
        };

        let DispatchStep::Send { id, frame } = step else {
            continue;
        };
        let out = if settings.simulated {
            frame.as_str()
        } else {
            frame.trim()
        };
        debug!("Gauger >> job {}: {}", id, frame.trim());
        if let Err(e) = write_frame(&mut writer, out).await {
            error!("Failed to write gauger job {}: {}", id, e);
            {
                let mut guard = session.lock().await;
                guard.fail_outstanding(generation, GaugerError::Io(e.to_string()));
                guard.close_generation(generation);
            }
            reader.abort();
            break;
        }
    }
    debug!("Gauger dispatch loop for connection {} stopped", generation);
}

async fn write_frame<W>(writer: &mut W, frame: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame.as_bytes()).await?;
    writer.flush().await
}

fn spawn_position_poll(
    session: SharedSession,
    rx: oneshot::Receiver<CommandResult>,
    simulated: bool,
) {
    tokio::spawn(async move {
        match rx.await {
            Ok(Ok(response)) if response.is_ok() => {
                session.lock().await.apply_position_response(&response);
            }
            Ok(Ok(response)) => {
                if !simulated {
                    warn!(
                        "Position query returned status {} ({})",
                        response.status, response.message
                    );
                }
            }
            Ok(Err(e)) => warn!("Position query failed: {}", e),
            Err(_) => {}
        }
    });
}

async fn await_handshake(
    session: SharedSession,
    generation: u64,
    rx: oneshot::Receiver<CommandResult>,
) {
    match rx.await {
        Ok(Ok(response)) if response.is_ok() => info!("Gauger streaming enabled"),
        Ok(Ok(response)) => warn!(
            "Streaming handshake returned status {} ({})",
            response.status, response.message
        ),
        Ok(Err(e)) => warn!("Streaming handshake failed: {}", e),
        Err(_) => {
            debug!("Streaming handshake dropped with connection {}", generation);
            return;
        }
    }
    session.lock().await.mark_streaming(generation);
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::task::{Context, Poll};

    use tokio::io::{DuplexStream, ReadBuf};
    use tokio::sync::mpsc;

    use crate::device::{DeviceFuture, DeviceIo};

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// Knobs shared between a test and its [`PipeOpener`].
    #[derive(Clone, Default)]
    pub(crate) struct PipeControl {
        /// Host ends not yet dropped.
        pub(crate) live: Arc<AtomicUsize>,
        pub(crate) refuse_open: Arc<AtomicBool>,
        pub(crate) fail_writes: Arc<AtomicBool>,
    }

    /// Host end of a test pipe.
    struct PipeDevice {
        inner: DuplexStream,
        control: PipeControl,
    }

    impl Drop for PipeDevice {
        fn drop(&mut self) {
            self.control.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl AsyncRead for PipeDevice {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for PipeDevice {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            if self.control.fail_writes.load(Ordering::SeqCst) {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "device unplugged",
                )));
            }
            Pin::new(&mut self.inner).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_flush(cx)
        }

        fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_shutdown(cx)
        }
    }

    impl DeviceIo for PipeDevice {}

    /// Opener handing the device end of a fresh pipe to the test.
    ///
    /// Like a serial port it refuses to open while an earlier host end is
    /// still alive.
    pub(crate) struct PipeOpener {
        devices: mpsc::UnboundedSender<DuplexStream>,
        control: PipeControl,
    }

    impl PipeOpener {
        pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<DuplexStream>, PipeControl) {
            let (devices, rx) = mpsc::unbounded_channel();
            let control = PipeControl::default();
            (
                Self {
                    devices,
                    control: control.clone(),
                },
                rx,
                control,
            )
        }

        async fn open_pipe(&self) -> DynResult<Box<dyn DeviceIo>> {
            if self.control.refuse_open.load(Ordering::SeqCst) {
                return Err("no such port".into());
            }
            if self.control.live.load(Ordering::SeqCst) > 0 {
                return Err("Device or resource busy".into());
            }
            let (host, device) = tokio::io::duplex(1024);
            self.devices.send(device).map_err(|_| "test device dropped")?;
            self.control.live.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(PipeDevice {
                inner: host,
                control: self.control.clone(),
            }))
        }
    }

    impl DeviceOpener for PipeOpener {
        fn open(&self) -> DeviceFuture<'_> {
            Box::pin(self.open_pipe())
        }

        fn describe(&self) -> String {
            "pipe".to_string()
        }
    }

    pub(crate) fn settings(position_poll: Option<Duration>) -> ConnectionSettings {
        ConnectionSettings {
            open_delay: Duration::from_millis(2000),
            worker_delay: Duration::from_millis(100),
            streaming_command: ":71 2;\n".to_string(),
            position_poll,
        }
    }

    pub(crate) fn manager(
        position_poll: Option<Duration>,
    ) -> (ConnectionManager, mpsc::UnboundedReceiver<DuplexStream>) {
        let (manager, devices, _) = controlled_manager(position_poll);
        (manager, devices)
    }

    fn controlled_manager(
        position_poll: Option<Duration>,
    ) -> (
        ConnectionManager,
        mpsc::UnboundedReceiver<DuplexStream>,
        PipeControl,
    ) {
        let (opener, devices, control) = PipeOpener::new();
        let session = Arc::new(Mutex::new(GaugerSession::new(TIMEOUT)));
        (
            ConnectionManager::new(session, Arc::new(opener), settings(position_poll)),
            devices,
            control,
        )
    }

    /// Test-side view of the device.
    pub(crate) struct FakeGauger {
        io: BufReader<DuplexStream>,
    }

    impl FakeGauger {
        pub(crate) fn new(io: DuplexStream) -> Self {
            Self {
                io: BufReader::new(io),
            }
        }

        /// Next frame written by the host, with its job id.
        pub(crate) async fn frame(&mut self) -> (u32, String) {
            let mut buf = Vec::new();
            self.io.read_until(b';', &mut buf).await.unwrap();
            let frame = String::from_utf8(buf).unwrap().trim().to_string();
            let digits: String = frame[1..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            (digits.parse().unwrap(), frame)
        }

        pub(crate) async fn send(&mut self, line: &str) {
            let io = self.io.get_mut();
            io.write_all(line.as_bytes()).await.unwrap();
            io.write_all(b"\n").await.unwrap();
            io.flush().await.unwrap();
        }

        /// Acknowledge the handshake, which must be the next frame.
        pub(crate) async fn accept_handshake(&mut self) {
            let (id, frame) = self.frame().await;
            assert_eq!(frame, format!(":{}:71 2;", id));
            self.send(&format!("ACK:{}:00OK", id)).await;
        }
    }

    async fn wait_for_state(manager: &ConnectionManager, state: ConnectionState) {
        for _ in 0..100 {
            if manager.connection().await == state {
                return;
            }
            time::sleep(Duration::from_millis(50)).await;
        }
        panic!("connection never reached {:?}", state);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_handshake_then_command() {
        let (manager, mut devices) = manager(None);
        let (_, mut queued) = manager.session().lock().await.enqueue(" 2;\n", false);
        manager.open().await.unwrap();
        let mut device = FakeGauger::new(devices.recv().await.unwrap());

        device.accept_handshake().await;
        wait_for_state(&manager, ConnectionState::Streaming).await;

        let (id, frame) = device.frame().await;
        assert_eq!(frame, format!(":{} 2;", id));
        device.send("GPS:1000|3.5").await;
        device.send(&format!("ACK:{}:00OK", id)).await;

        let response = (&mut queued).await.unwrap().unwrap();
        assert_eq!(response.status, 0);
        assert_eq!(response.body, "OK");
        let session = manager.session().lock().await;
        assert_eq!(session.telemetry().gps_coords, [None, Some(3.5)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_flight_on_the_wire() {
        let (manager, mut devices) = manager(None);
        manager.open().await.unwrap();
        let mut device = FakeGauger::new(devices.recv().await.unwrap());
        device.accept_handshake().await;

        let (first, _rx1) = manager.session().lock().await.enqueue(" 1;\n", false);
        let (second, mut rx2) = manager.session().lock().await.enqueue(" 2;\n", false);

        assert_eq!(device.frame().await.0, first);
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(manager.session().lock().await.dispatcher().queued(), 1);

        device.send(&format!("ACK:{}:00OK", first)).await;
        assert_eq!(device.frame().await.0, second);
        device.send(&format!("ACK:{}:4", second)).await;
        assert!(matches!(
            (&mut rx2).await.unwrap(),
            Err(GaugerError::MalformedAck(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_command_times_out() {
        let (manager, mut devices) = manager(None);
        manager.open().await.unwrap();
        let mut device = FakeGauger::new(devices.recv().await.unwrap());
        device.accept_handshake().await;

        let (id, rx) = manager.session().lock().await.enqueue(" 3;\n", false);
        assert_eq!(device.frame().await.0, id);

        let started = Instant::now();
        let response = rx.await.unwrap().unwrap();
        assert_eq!(response.status, 2);
        assert_eq!(response.message, "Command timeout");
        assert!(started.elapsed() >= TIMEOUT);

        // A late ACK for the expired job is ignored.
        device.send(&format!("ACK:{}:00OK", id)).await;
        let (next, _rx) = manager.session().lock().await.enqueue(" 4;\n", false);
        assert_eq!(device.frame().await.0, next);
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_eof_abandons_jobs() {
        let (manager, mut devices) = manager(None);
        manager.open().await.unwrap();
        let mut device = FakeGauger::new(devices.recv().await.unwrap());
        device.accept_handshake().await;

        let (_, rx) = manager.session().lock().await.enqueue(" 1;\n", false);
        device.frame().await;
        drop(device);

        assert!(rx.await.is_err());
        wait_for_state(&manager, ConnectionState::Closed).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_and_reopen() {
        let (manager, mut devices) = manager(None);
        manager.open().await.unwrap();
        let mut device = FakeGauger::new(devices.recv().await.unwrap());
        device.accept_handshake().await;

        let (_, outstanding) = manager.session().lock().await.enqueue(" 1;\n", false);
        device.frame().await;
        manager.close().await;
        assert!(outstanding.await.is_err());
        assert_eq!(manager.connection().await, ConnectionState::Closed);

        let (id, mut waiting) = manager.session().lock().await.enqueue(" 5;\n", false);
        time::sleep(Duration::from_secs(1)).await;
        assert!(waiting.try_recv().is_err());

        manager.open().await.unwrap();
        let mut device = FakeGauger::new(devices.recv().await.unwrap());
        device.accept_handshake().await;
        assert_eq!(device.frame().await.0, id);
        device.send(&format!("ACK:{}:00|done", id)).await;
        assert_eq!(waiting.await.unwrap().unwrap().body, "done");
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_position_polling() {
        let (manager, mut devices) = manager(Some(Duration::from_secs(1)));
        manager.open().await.unwrap();
        let mut device = FakeGauger::new(devices.recv().await.unwrap());
        device.accept_handshake().await;

        let (id, frame) = device.frame().await;
        assert_eq!(frame, format!(":{}:15 ;", id));
        device.send(&format!("ACK:{}:00|12.5|1000|T|F", id)).await;

        for _ in 0..100 {
            if manager.session().lock().await.telemetry().position[0].is_some() {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        let session = manager.session().lock().await;
        assert_eq!(session.telemetry().position, [Some(12.5), None]);
        assert_eq!(
            session.telemetry().limits_enabled,
            [Some(true), Some(false)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_released_before_reopen() {
        let (manager, mut devices, control) = controlled_manager(None);
        manager.open().await.unwrap();
        let mut device = FakeGauger::new(devices.recv().await.unwrap());
        device.accept_handshake().await;
        wait_for_state(&manager, ConnectionState::Streaming).await;

        manager.close().await;
        assert_eq!(control.live.load(Ordering::SeqCst), 0);
        manager.open().await.unwrap();
        let _second = devices.recv().await.unwrap();

        // Opening while open closes the old device first.
        manager.open().await.unwrap();
        let _third = devices.recv().await.unwrap();
        assert_eq!(control.live.load(Ordering::SeqCst), 1);
        assert_eq!(
            manager.connection().await,
            ConnectionState::PendingHandshake
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_fails_job_and_closes() {
        let (manager, mut devices, control) = controlled_manager(None);
        manager.open().await.unwrap();
        let mut device = FakeGauger::new(devices.recv().await.unwrap());
        device.accept_handshake().await;
        wait_for_state(&manager, ConnectionState::Streaming).await;

        control.fail_writes.store(true, Ordering::SeqCst);
        let (_, rx) = manager.session().lock().await.enqueue(" 1;\n", false);
        assert!(matches!(rx.await.unwrap(), Err(GaugerError::Io(_))));
        wait_for_state(&manager, ConnectionState::Closed).await;

        // The reader lets go of the device too.
        for _ in 0..100 {
            if control.live.load(Ordering::SeqCst) == 0 {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(control.live.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_failure_keeps_queue() {
        let (manager, mut devices, control) = controlled_manager(None);
        let (id, mut queued) = manager.session().lock().await.enqueue(" 5;\n", false);

        control.refuse_open.store(true, Ordering::SeqCst);
        let err = manager.open().await.unwrap_err();
        assert_eq!(err.to_string(), "no such port");
        assert_eq!(manager.connection().await, ConnectionState::Closed);
        assert_eq!(manager.session().lock().await.dispatcher().queued(), 1);
        assert!(matches!(
            queued.try_recv(),
            Err(oneshot::error::TryRecvError::Empty)
        ));

        control.refuse_open.store(false, Ordering::SeqCst);
        manager.open().await.unwrap();
        let mut device = FakeGauger::new(devices.recv().await.unwrap());
        device.accept_handshake().await;
        assert_eq!(device.frame().await.0, id);
        device.send(&format!("ACK:{}:00OK", id)).await;
        assert_eq!(queued.await.unwrap().unwrap().status, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_handshake_still_streams() {
        let (manager, mut devices) = manager(None);
        manager.open().await.unwrap();
        let mut device = FakeGauger::new(devices.recv().await.unwrap());

        let (id, frame) = device.frame().await;
        assert_eq!(frame, format!(":{}:71 2;", id));
        device.send(&format!("ACK:{}:46", id)).await;
        wait_for_state(&manager, ConnectionState::Streaming).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_handshake_still_streams() {
        let (manager, mut devices) = manager(None);
        manager.open().await.unwrap();
        let mut device = FakeGauger::new(devices.recv().await.unwrap());
        device.frame().await;

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(
            manager.connection().await,
            ConnectionState::PendingHandshake
        );
        time::sleep(TIMEOUT).await;
        assert_eq!(manager.connection().await, ConnectionState::Streaming);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_line_is_dropped() {
        let (manager, mut devices) = manager(None);
        manager.open().await.unwrap();
        let mut device = FakeGauger::new(devices.recv().await.unwrap());
        device.accept_handshake().await;
        wait_for_state(&manager, ConnectionState::Streaming).await;

        device.send(&"9".repeat(10_000)).await;
        device.send("GPS:1000|3.5").await;

        for _ in 0..100 {
            if manager.session().lock().await.telemetry().gps_coords[1].is_some() {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        let session = manager.session().lock().await;
        assert_eq!(session.telemetry().gps_coords, [None, Some(3.5)]);
        assert_eq!(session.connection(), ConnectionState::Streaming);
    }
}
