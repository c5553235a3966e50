//! A fixed-capacity table server.
//!
//! The server accepts exactly `capacity` peers, one at a time, into numbered
//! slots. Slot indices are assigned in arrival order starting at zero and
//! are never reused. Each slot gets its own receive thread that decodes
//! frames and republishes them as [`ServerEvent`]s.
//!
//! Events from one slot are delivered in the order the peer wrote them.
//! Events from different slots are delivered by different threads and carry
//! no ordering relative to each other.

use std::{
    fmt,
    io::{self, BufReader},
    net::{IpAddr, Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, Mutex, PoisonError, RwLock,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
};

use log::{debug, info, warn};
use socket2::{Domain, Protocol, Socket, Type};

use super::{
    config::{ConfigError, ServerConfig},
    errors::{NetError, Result},
    frame,
};
use crate::event::EventChannel;

/// Lifecycle and message events published by the server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ServerEvent {
    /// A peer was accepted into `slot`.
    ClientConnected {
        address: IpAddr,
        port: u16,
        slot: usize,
    },
    /// The last slot was filled. Fired exactly once per server.
    AllSlotsFilled,
    /// A complete frame arrived on `slot`.
    MessageReceived { text: String, slot: usize },
    /// The slot's receive loop ended. Fired exactly once per slot, after
    /// every message from that slot.
    ClientDisconnected { slot: usize },
}

impl fmt::Display for ServerEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ClientConnected {
                address,
                port,
                slot,
            } => write!(f, "{address}:{port} connected to slot {slot}"),
            Self::AllSlotsFilled => write!(f, "all slots filled"),
            Self::MessageReceived { text, slot } => {
                write!(f, "slot {slot} sent {} bytes", text.len())
            }
            Self::ClientDisconnected { slot } => write!(f, "slot {slot} disconnected"),
        }
    }
}

/// Subscriber list for server events. Subscribers receive a
/// [`ServerHandle`] as the event source so they can reply from inside the
/// callback.
pub type ServerEvents = EventChannel<ServerHandle, ServerEvent>;

/// One accepted peer.
struct Slot {
    index: usize,
    peer: SocketAddr,
    /// Serialises concurrent `send_msg` calls for this slot.
    writer: Mutex<TcpStream>,
    /// Used only to shut the socket down, never for I/O.
    control: TcpStream,
    /// Per-connection cancellation token, checked by the receive loop.
    cancelled: AtomicBool,
    connected: AtomicBool,
}

impl Slot {
    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            debug!("cancelling slot {} ({})", self.index, self.peer);
            // Wakes the receive loop out of its blocking read. The socket
            // may already be closed by the peer, which is fine.
            let _ = self.control.shutdown(Shutdown::Both);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// State shared between the accepting thread, every receive loop, and
/// every [`ServerHandle`].
struct Shared {
    events: RwLock<ServerEvents>,
    /// Append-only, indexed by slot index.
    slots: RwLock<Vec<Arc<Slot>>>,
}

impl Shared {
    fn slot(&self, index: usize) -> Result<Arc<Slot>> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots.get(index).cloned().ok_or(NetError::UnknownSlot {
            slot: index,
            slots: slots.len(),
        })
    }

    fn slot_count(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn all_slots(&self) -> Vec<Arc<Slot>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// A cheap, cloneable reference to a running server.
///
/// This is the event source handed to subscribers, and the way to talk to
/// the slots from other threads.
#[derive(Clone)]
pub struct ServerHandle {
    shared: Arc<Shared>,
}

impl ServerHandle {
    /// Encode `text` as one frame and write it to `slot`.
    ///
    /// Concurrent sends to the same slot are serialised; sends to different
    /// slots proceed in parallel.
    ///
    /// # Errors
    ///
    /// - [`NetError::UnknownSlot`] if `slot` was never connected.
    /// - [`NetError::FrameTooLarge`] if `text` doesn't fit in one frame.
    /// - [`NetError::Send`] if the write fails.
    pub fn send_msg(&self, text: &str, slot: usize) -> Result<()> {
        let slot = self.shared.slot(slot)?;
        let mut writer = slot.writer.lock().unwrap_or_else(PoisonError::into_inner);
        frame::write_frame(&mut *writer, text)?;
        debug!("sent {} bytes to slot {}", text.len(), slot.index);
        Ok(())
    }

    /// Tear down one slot without touching the others.
    ///
    /// The slot's receive loop stops and fires a single
    /// [`ServerEvent::ClientDisconnected`]. Calling this for a slot that
    /// is already disconnected does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::UnknownSlot`] if `slot` was never connected.
    pub fn disconnect(&self, slot: usize) -> Result<()> {
        self.shared.slot(slot)?.cancel();
        Ok(())
    }

    /// Number of slots accepted so far, connected or not.
    #[must_use]
    pub fn connected_slots(&self) -> usize {
        self.shared.slot_count()
    }

    /// Whether `slot` exists and its receive loop is still running.
    #[must_use]
    pub fn is_connected(&self, slot: usize) -> bool {
        self.shared
            .slot(slot)
            .is_ok_and(|slot| slot.connected.load(Ordering::SeqCst))
    }

    /// Peer address of `slot`.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::UnknownSlot`] if `slot` was never connected.
    pub fn peer_addr(&self, slot: usize) -> Result<SocketAddr> {
        Ok(self.shared.slot(slot)?.peer)
    }

    /// Publish `event` to a snapshot of the current subscribers. The lock is
    /// not held while subscribers run, so they may subscribe or send.
    fn trigger(&self, event: &ServerEvent) {
        let events = self
            .shared
            .events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        events.trigger(self, event);
    }
}

impl fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ServerHandle")
            .field("slots", &self.connected_slots())
            .finish()
    }
}

/// A TCP server that fills a fixed number of numbered slots.
pub struct Server {
    listener: TcpListener,
    backlog: u32,
    handle: ServerHandle,
    receivers: Vec<JoinHandle<()>>,
    all_slots_filled: bool,
}

impl Server {
    /// Open a listening socket on `address:port` with an accept queue of
    /// `backlog` pending connections.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Bind`] if the address doesn't resolve or the
    /// address or port is unavailable.
    pub fn bind_and_listen(address: &str, port: u16, backlog: u32) -> Result<Self> {
        let listener = listen((address, port), backlog).map_err(|source| NetError::Bind {
            addr: format!("{address}:{port}"),
            source,
        })?;
        match listener.local_addr() {
            Ok(addr) => info!("listening on {addr} (backlog {backlog})"),
            Err(_) => info!("listening on {address}:{port} (backlog {backlog})"),
        }

        Ok(Self {
            listener,
            backlog,
            handle: ServerHandle {
                shared: Arc::new(Shared {
                    events: RwLock::new(EventChannel::new()),
                    slots: RwLock::new(Vec::new()),
                }),
            },
            receivers: Vec::new(),
            all_slots_filled: false,
        })
    }

    /// Open a listening socket described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Bind`] if the address or port is unavailable.
    pub fn bind(config: &ServerConfig) -> Result<Self> {
        Self::bind_and_listen(&config.address, config.port, config.backlog)
    }

    /// The address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Receive`] if the socket can't report its address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(NetError::Receive)
    }

    #[must_use]
    pub fn backlog(&self) -> u32 {
        self.backlog
    }

    /// A cloneable handle for sending from other threads.
    #[must_use]
    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// Subscribe to every server event.
    ///
    /// Subscribers run synchronously on the thread that raised the event:
    /// the caller of [`Server::wait_for_connections`] for connection events,
    /// and the slot's receive thread for message and disconnection events.
    /// A panicking subscriber unwinds through that thread, which for a
    /// receive loop ends that slot's loop.
    pub fn subscribe<F>(&self, subscriber: F)
    where
        F: Fn(&ServerHandle, &ServerEvent) + Send + Sync + 'static,
    {
        self.handle
            .shared
            .events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribe(subscriber);
    }

    /// Block until `capacity` slots have been filled.
    ///
    /// Each accepted peer gets the next slot index, a
    /// [`ServerEvent::ClientConnected`] event, and then its own receive
    /// thread. After the last slot is filled [`ServerEvent::AllSlotsFilled`]
    /// fires (once for the lifetime of the server) and this returns. No
    /// further peers are accepted.
    ///
    /// # Errors
    ///
    /// - [`NetError::Config`] if `capacity` is zero.
    /// - [`NetError::Receive`] if accepting fails for a reason other than a
    ///   peer aborting its own connection attempt.
    pub fn wait_for_connections(&mut self, capacity: usize) -> Result<()> {
        if capacity == 0 {
            return Err(ConfigError::Invalid {
                var: "capacity".to_string(),
                reason: "Must be greater than 0".to_string(),
            }
            .into());
        }

        while self.handle.connected_slots() < capacity {
            let (stream, peer) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(error) if is_transient(&error) => {
                    warn!("accept failed, retrying: {error}");
                    continue;
                }
                Err(error) => return Err(NetError::Receive(error)),
            };
            if let Err(error) = self.open_slot(stream, peer) {
                warn!("dropping connection from {peer}: {error}");
            }
        }

        if !self.all_slots_filled {
            self.all_slots_filled = true;
            info!("all {capacity} slots filled");
            self.handle.trigger(&ServerEvent::AllSlotsFilled);
        }
        Ok(())
    }

    fn open_slot(&mut self, stream: TcpStream, peer: SocketAddr) -> Result<()> {
        let reader = stream.try_clone().map_err(NetError::Receive)?;
        let control = stream.try_clone().map_err(NetError::Receive)?;

        let slot = {
            let mut slots = self
                .handle
                .shared
                .slots
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let slot = Arc::new(Slot {
                index: slots.len(),
                peer,
                writer: Mutex::new(stream),
                control,
                cancelled: AtomicBool::new(false),
                connected: AtomicBool::new(true),
            });
            slots.push(slot.clone());
            slot
        };
        info!("{peer} connected to slot {}", slot.index);

        let announced = panic::catch_unwind(AssertUnwindSafe(|| {
            self.handle.trigger(&ServerEvent::ClientConnected {
                address: peer.ip(),
                port: peer.port(),
                slot: slot.index,
            });
        }));
        if let Err(payload) = announced {
            // The slot never gets a receive loop, so close it here before
            // the panic reaches the caller.
            slot.cancel();
            release(&self.handle, &slot);
            panic::resume_unwind(payload);
        }

        let handle = self.handle.clone();
        let index = slot.index;
        let receiver = thread::Builder::new()
            .name(format!("whist-slot-{index}"))
            .spawn(move || receive_loop(&handle, &slot, reader));
        match receiver {
            Ok(receiver) => {
                self.receivers.push(receiver);
                Ok(())
            }
            Err(error) => {
                // The slot index stays taken; it just never receives.
                let slot = self.handle.shared.slot(index)?;
                slot.cancel();
                release(&self.handle, &slot);
                Err(NetError::Receive(error))
            }
        }
    }

    /// See [`ServerHandle::send_msg`].
    ///
    /// # Errors
    ///
    /// See [`ServerHandle::send_msg`].
    pub fn send_msg(&self, text: &str, slot: usize) -> Result<()> {
        self.handle.send_msg(text, slot)
    }

    /// See [`ServerHandle::disconnect`].
    ///
    /// # Errors
    ///
    /// Returns [`NetError::UnknownSlot`] if `slot` was never connected.
    pub fn disconnect(&self, slot: usize) -> Result<()> {
        self.handle.disconnect(slot)
    }

    #[must_use]
    pub fn connected_slots(&self) -> usize {
        self.handle.connected_slots()
    }

    #[must_use]
    pub fn is_connected(&self, slot: usize) -> bool {
        self.handle.is_connected(slot)
    }

    /// Cancel every slot and wait for their receive loops to finish.
    pub fn shutdown(&mut self) {
        for slot in self.handle.shared.all_slots() {
            slot.cancel();
        }
        for receiver in self.receivers.drain(..) {
            if receiver.join().is_err() {
                warn!("a receive loop ended with a panic");
            }
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Server")
            .field("listener", &self.listener)
            .field("backlog", &self.backlog)
            .field("slots", &self.connected_slots())
            .finish_non_exhaustive()
    }
}

/// Bind a listener with an explicit accept backlog, which
/// `TcpListener::bind` doesn't allow.
fn listen<A: ToSocketAddrs>(addr: A, backlog: u32) -> io::Result<TcpListener> {
    let addr = addr.to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing")
    })?;

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    // Matches what std does for its own listeners.
    #[cfg(not(windows))]
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(i32::try_from(backlog).unwrap_or(i32::MAX))?;
    Ok(socket.into())
}

/// Run one slot's receive loop, then release the slot.
///
/// A panicking subscriber still ends with the slot closed and a single
/// `ClientDisconnected`; the panic is resumed afterwards so it reaches the
/// thread's join handle.
fn receive_loop(handle: &ServerHandle, slot: &Slot, reader: TcpStream) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| read_frames(handle, slot, reader)));
    if outcome.is_err() {
        warn!("slot {} ({}) subscriber panicked", slot.index, slot.peer);
    } else if slot.is_cancelled() {
        info!("slot {} ({}) was disconnected", slot.index, slot.peer);
    }

    release(handle, slot);
    if let Err(payload) = outcome {
        panic::resume_unwind(payload);
    }
}

/// Decode frames from one slot until it closes, fails, or is cancelled.
fn read_frames(handle: &ServerHandle, slot: &Slot, reader: TcpStream) {
    let mut reader = BufReader::new(reader);
    while !slot.is_cancelled() {
        match frame::read_frame(&mut reader) {
            Ok(text) => {
                debug!("received {} bytes from slot {}", text.len(), slot.index);
                handle.trigger(&ServerEvent::MessageReceived {
                    text,
                    slot: slot.index,
                });
            }
            Err(NetError::PeerClosed) => {
                info!("slot {} ({}) closed the connection", slot.index, slot.peer);
                break;
            }
            Err(_) if slot.is_cancelled() => break,
            Err(error) => {
                warn!("slot {} ({}) dropped: {error}", slot.index, slot.peer);
                break;
            }
        }
    }
}

/// Mark the slot disconnected, close its socket, and announce it.
fn release(handle: &ServerHandle, slot: &Slot) {
    slot.connected.store(false, Ordering::SeqCst);
    let _ = slot.control.shutdown(Shutdown::Both);
    handle.trigger(&ServerEvent::ClientDisconnected { slot: slot.index });
}

fn is_transient(error: &std::io::Error) -> bool {
    use std::io::ErrorKind;
    matches!(
        error.kind(),
        ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset | ErrorKind::Interrupted
    )
}
