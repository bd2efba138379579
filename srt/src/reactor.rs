//! The readiness reactor (C3): bridges SRT's own epoll group into
//! async/await the way `tokio::io::unix::AsyncFd` bridges the OS epoll for
//! standard sockets.
//!
//! Two background workers do the actual I/O multiplexing, neither of which
//! a caller ever touches directly:
//!
//! - a dedicated `std::thread` ("the poll thread") blocks in
//!   [`sys::srt_epoll_uwait`] in a loop and posts whatever it observes back
//!   onto a channel;
//! - a single tokio task ("X") owns all reactor bookkeeping and processes
//!   commands from that channel one at a time, so no two tasks ever race to
//!   mutate the same waiter slot.
//!
//! A waiter is removed from its slot the moment it is acted on — by event
//! delivery, cancellation, or timeout — so whichever of those reaches X
//! first is the one that completes the future. This is what keeps
//! completion at-most-once without a lock visible to callers.

use std::collections::{HashMap, HashSet};
use std::ffi::c_int;
use std::future::pending;
use std::sync::OnceLock;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{self, ErrorKind};
use crate::sys::{self, SRTSOCKET, SRT_EPOLL_EVENT, SRT_ERRNO, SRT_SOCKSTATUS};

enum Command {
    WaitReadable(SRTSOCKET, oneshot::Sender<Result<(), ErrorKind>>),
    WaitWritable(SRTSOCKET, oneshot::Sender<Result<(), ErrorKind>>),
    CancelReadable(SRTSOCKET),
    CancelWritable(SRTSOCKET),
    Events(Vec<SRT_EPOLL_EVENT>),
}

#[derive(Default)]
struct SocketState {
    read_waiter: Option<oneshot::Sender<Result<(), ErrorKind>>>,
    write_waiter: Option<oneshot::Sender<Result<(), ErrorKind>>>,
}

/// The only surface of the native library X's bookkeeping touches. Kept as
/// a trait so the state-transition logic in [`XState`] — the part the
/// testable properties in this core's spec are about — can be exercised
/// with a fake in a plain `cargo test` run, without a linked SRT library.
trait EpollOps: Send + 'static {
    fn add(&self, eid: c_int, fd: SRTSOCKET, mask: c_int);
    fn update(&self, eid: c_int, fd: SRTSOCKET, mask: c_int);
    fn remove(&self, eid: c_int, fd: SRTSOCKET);
    /// Used only to tell a clean close from something worse once an ERR
    /// event fires with no more specific diagnosis available.
    fn sockstate(&self, fd: SRTSOCKET) -> SRT_SOCKSTATUS;
}

struct NativeEpoll;

impl EpollOps for NativeEpoll {
    fn add(&self, eid: c_int, fd: SRTSOCKET, mask: c_int) {
        unsafe {
            sys::srt_epoll_add_usock(eid, fd, &mask);
        }
    }

    fn update(&self, eid: c_int, fd: SRTSOCKET, mask: c_int) {
        unsafe {
            sys::srt_epoll_update_usock(eid, fd, &mask);
        }
    }

    fn remove(&self, eid: c_int, fd: SRTSOCKET) {
        unsafe {
            sys::srt_epoll_remove_usock(eid, fd);
        }
    }

    fn sockstate(&self, fd: SRTSOCKET) -> SRT_SOCKSTATUS {
        unsafe { sys::srt_getsockstate(fd) }
    }
}

/// All state X owns. Lives entirely inside the command loop task; nothing
/// outside ever sees it directly.
struct XState<O: EpollOps = NativeEpoll> {
    eid: c_int,
    sockets: HashMap<SRTSOCKET, SocketState>,
    epoll_members: HashSet<SRTSOCKET>,
    ops: O,
}

impl<O: EpollOps> XState<O> {
    fn register(&mut self, fd: SRTSOCKET, is_read: bool, tx: oneshot::Sender<Result<(), ErrorKind>>) {
        let entry = self.sockets.entry(fd).or_default();
        let slot = if is_read {
            &mut entry.read_waiter
        } else {
            &mut entry.write_waiter
        };

        // At most one waiter per (handle, direction) is ever legal. A
        // second register on an already-occupied slot is rejected outright
        // and the existing waiter is left untouched, rather than bumping it.
        if slot.is_some() {
            let _ = tx.send(Err(ErrorKind::InvalidArgument {
                message: "a wait is already registered for this handle and direction".into(),
            }));
            return;
        }

        *slot = Some(tx);
        self.recompute(fd);
    }

    fn cancel(&mut self, fd: SRTSOCKET, is_read: bool) {
        if let Some(entry) = self.sockets.get_mut(&fd) {
            let slot = if is_read {
                &mut entry.read_waiter
            } else {
                &mut entry.write_waiter
            };
            slot.take();
        }
        self.recompute(fd);
    }

    fn deliver(&mut self, events: Vec<SRT_EPOLL_EVENT>) {
        for event in events {
            let fd = event.fd;

            if event.events & sys::SRT_EPOLL_ERR != 0 {
                if let Some(entry) = self.sockets.remove(&fd) {
                    let err = self.diagnose_error(fd);
                    if let Some(tx) = entry.read_waiter {
                        let _ = tx.send(Err(err.clone()));
                    }
                    if let Some(tx) = entry.write_waiter {
                        let _ = tx.send(Err(err));
                    }
                }
                if self.epoll_members.remove(&fd) {
                    self.ops.remove(self.eid, fd);
                }
                continue;
            }

            if let Some(entry) = self.sockets.get_mut(&fd) {
                if event.events & sys::SRT_EPOLL_IN != 0 {
                    if let Some(tx) = entry.read_waiter.take() {
                        let _ = tx.send(Ok(()));
                    }
                }
                if event.events & sys::SRT_EPOLL_OUT != 0 {
                    if let Some(tx) = entry.write_waiter.take() {
                        let _ = tx.send(Ok(()));
                    }
                }
            }

            self.recompute(fd);
        }
    }

    /// Adds, updates, or removes `fd`'s epoll registration so its mask
    /// always matches exactly the directions it currently has a waiter
    /// for — never more, so a direction nobody is waiting on can't wake
    /// the poll thread, and never less, so a registered waiter is never
    /// silently starved.
    fn recompute(&mut self, fd: SRTSOCKET) {
        let (want_read, want_write) = self
            .sockets
            .get(&fd)
            .map(|e| (e.read_waiter.is_some(), e.write_waiter.is_some()))
            .unwrap_or((false, false));

        if !want_read && !want_write {
            self.sockets.remove(&fd);
            if self.epoll_members.remove(&fd) {
                self.ops.remove(self.eid, fd);
            }
            return;
        }

        let mut mask: c_int = 0;
        if want_read {
            mask |= sys::SRT_EPOLL_IN | sys::SRT_EPOLL_ERR;
        }
        if want_write {
            mask |= sys::SRT_EPOLL_OUT | sys::SRT_EPOLL_ERR;
        }

        if self.epoll_members.insert(fd) {
            self.ops.add(self.eid, fd, mask);
        } else {
            self.ops.update(self.eid, fd, mask);
        }
    }

    /// An ERR event carries no payload of its own; the reactor asks the
    /// socket for its current state to tell a clean close from something
    /// worse. Anything it can't further distinguish is reported as a
    /// reset, matching this core's stated policy for an otherwise
    /// undiagnosable error bit.
    fn diagnose_error(&self, fd: SRTSOCKET) -> ErrorKind {
        match self.ops.sockstate(fd) {
            SRT_SOCKSTATUS::SRTS_CLOSED | SRT_SOCKSTATUS::SRTS_NONEXIST => {
                ErrorKind::ConnectionAborted { message: None }
            }
            _ => ErrorKind::ConnectionReset { message: None },
        }
    }
}

async fn x_loop(eid: c_int, mut rx: mpsc::UnboundedReceiver<Command>) {
    let mut state = XState {
        eid,
        sockets: HashMap::new(),
        epoll_members: HashSet::new(),
        ops: NativeEpoll,
    };

    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::WaitReadable(fd, tx) => state.register(fd, true, tx),
            Command::WaitWritable(fd, tx) => state.register(fd, false, tx),
            Command::CancelReadable(fd) => state.cancel(fd, true),
            Command::CancelWritable(fd) => state.cancel(fd, false),
            Command::Events(events) => state.deliver(events),
        }
    }

    log::debug!("SRT reactor command loop exiting");
}

const POLL_BATCH: usize = 256;
const POLL_TIMEOUT_MS: i64 = 100;

fn poll_thread_loop(eid: c_int, tx: mpsc::UnboundedSender<Command>) {
    let mut buf = vec![SRT_EPOLL_EVENT { fd: 0, events: 0 }; POLL_BATCH];

    loop {
        let n = unsafe { sys::srt_epoll_uwait(eid, buf.as_mut_ptr(), buf.len() as c_int, POLL_TIMEOUT_MS) };

        if n > 0 {
            let events = buf[..n as usize].to_vec();
            if tx.send(Command::Events(events)).is_err() {
                break;
            }
        } else if n < 0 {
            let mut sys_errno = 0;
            let code = unsafe { sys::srt_getlasterror(&mut sys_errno) };
            if code == SRT_ERRNO::SRT_ETIMEOUT as i32 {
                continue;
            }
            log::warn!("SRT epoll wait failed, stopping reactor poll loop: {:?}", error::map_last_error());
            break;
        }
    }
}

static GLOBAL: OnceLock<Reactor> = OnceLock::new();

/// Process-wide readiness multiplexer. Every [`crate::socket::Socket`] and
/// [`crate::acceptor::Acceptor`] registers its interest here instead of
/// owning any polling machinery itself.
pub struct Reactor {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl Reactor {
    /// Returns the process-wide reactor, starting its background workers
    /// on first use.
    pub fn global() -> &'static Reactor {
        GLOBAL.get_or_init(Self::start)
    }

    fn start() -> Reactor {
        let eid = unsafe { sys::srt_epoll_create() };
        if eid < 0 {
            panic!("failed to create SRT epoll group: {:?}", error::map_last_error());
        }

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let poll_tx = cmd_tx.clone();

        tokio::spawn(x_loop(eid, cmd_rx));

        std::thread::Builder::new()
            .name("srt-reactor-poll".into())
            .spawn(move || poll_thread_loop(eid, poll_tx))
            .expect("failed to spawn SRT reactor poll thread");

        log::info!("SRT reactor started (epoll id {eid})");
        Reactor { cmd_tx }
    }

    /// Waits for `fd` to become readable, or to error, whichever comes
    /// first — subject to an optional deadline and an optional
    /// cancellation token.
    pub async fn wait_readable(
        &self,
        fd: SRTSOCKET,
        deadline: Option<Instant>,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), ErrorKind> {
        self.wait(fd, true, deadline, cancel).await
    }

    /// Waits for `fd` to become writable, or to error, whichever comes
    /// first — subject to an optional deadline and an optional
    /// cancellation token.
    pub async fn wait_writable(
        &self,
        fd: SRTSOCKET,
        deadline: Option<Instant>,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), ErrorKind> {
        self.wait(fd, false, deadline, cancel).await
    }

    async fn wait(
        &self,
        fd: SRTSOCKET,
        is_read: bool,
        deadline: Option<Instant>,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), ErrorKind> {
        let (tx, rx) = oneshot::channel();
        let register = if is_read {
            Command::WaitReadable(fd, tx)
        } else {
            Command::WaitWritable(fd, tx)
        };

        self.cmd_tx
            .send(register)
            .map_err(|_| ErrorKind::EpollFailure {
                message: Some("reactor command loop is gone".into()),
            })?;

        let deadline_sleep = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => pending::<()>().await,
            }
        };
        let cancel_fut = async {
            match cancel {
                Some(token) => token.cancelled().await,
                None => pending::<()>().await,
            }
        };

        tokio::select! {
            res = rx => res.unwrap_or(Err(ErrorKind::Canceled)),
            _ = deadline_sleep => {
                self.cancel_wait(fd, is_read);
                Err(ErrorKind::Timeout)
            }
            _ = cancel_fut => {
                self.cancel_wait(fd, is_read);
                Err(ErrorKind::Canceled)
            }
        }
    }

    fn cancel_wait(&self, fd: SRTSOCKET, is_read: bool) {
        let cmd = if is_read {
            Command::CancelReadable(fd)
        } else {
            Command::CancelWritable(fd)
        };
        let _ = self.cmd_tx.send(cmd);
    }

    /// Drops any outstanding waiters for a handle that is being closed.
    /// Called from `Socket`/`Acceptor` teardown so a closed handle never
    /// keeps a stale entry registered with the native epoll group.
    pub(crate) fn forget(&self, fd: SRTSOCKET) {
        self.cancel_wait(fd, true);
        self.cancel_wait(fd, false);
    }

    /// Same as [`Self::forget`], but never starts the reactor — a handle
    /// that was dropped without ever waiting on anything has nothing
    /// registered to forget, and `Drop` impls can run outside any tokio
    /// runtime, where lazily starting the reactor would panic.
    pub(crate) fn forget_if_running(fd: SRTSOCKET) {
        if let Some(reactor) = GLOBAL.get() {
            reactor.forget(fd);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Op {
        Add(SRTSOCKET, c_int),
        Update(SRTSOCKET, c_int),
        Remove(SRTSOCKET),
    }

    /// Records every call X would otherwise have made into the native
    /// library, so the tests below can assert on [`XState`]'s bookkeeping
    /// directly instead of on side effects in a real epoll group.
    #[derive(Default)]
    struct FakeEpoll {
        calls: RefCell<Vec<Op>>,
        state: RefCell<SRT_SOCKSTATUS>,
    }

    impl FakeEpoll {
        fn new() -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                state: RefCell::new(SRT_SOCKSTATUS::SRTS_BROKEN),
            }
        }
    }

    impl EpollOps for FakeEpoll {
        fn add(&self, _eid: c_int, fd: SRTSOCKET, mask: c_int) {
            self.calls.borrow_mut().push(Op::Add(fd, mask));
        }

        fn update(&self, _eid: c_int, fd: SRTSOCKET, mask: c_int) {
            self.calls.borrow_mut().push(Op::Update(fd, mask));
        }

        fn remove(&self, _eid: c_int, fd: SRTSOCKET) {
            self.calls.borrow_mut().push(Op::Remove(fd));
        }

        fn sockstate(&self, _fd: SRTSOCKET) -> SRT_SOCKSTATUS {
            *self.state.borrow()
        }
    }

    fn new_state() -> XState<FakeEpoll> {
        XState {
            eid: 0,
            sockets: HashMap::new(),
            epoll_members: HashSet::new(),
            ops: FakeEpoll::new(),
        }
    }

    fn mask_of(state: &XState<FakeEpoll>, fd: SRTSOCKET) -> c_int {
        match state.ops.calls.borrow().last() {
            Some(Op::Add(f, m)) | Some(Op::Update(f, m)) if *f == fd => *m,
            _ => 0,
        }
    }

    /// P1: the registered epoll mask always matches exactly which
    /// directions have a waiter.
    #[test]
    fn recompute_mask_matches_waiters_present() {
        let mut state = new_state();
        let (tx, _rx) = oneshot::channel();
        state.register(7, true, tx);
        assert_eq!(mask_of(&state, 7), sys::SRT_EPOLL_IN | sys::SRT_EPOLL_ERR);

        let (tx2, _rx2) = oneshot::channel();
        state.register(7, false, tx2);
        assert_eq!(
            mask_of(&state, 7),
            sys::SRT_EPOLL_IN | sys::SRT_EPOLL_OUT | sys::SRT_EPOLL_ERR
        );
    }

    /// P2: once a waiter's future resolves, its slot is empty — a second
    /// `register` after a `cancel` installs cleanly rather than finding
    /// anything stale.
    #[test]
    fn cancel_empties_the_slot() {
        let mut state = new_state();
        let (tx, rx) = oneshot::channel();
        state.register(3, true, tx);
        state.cancel(3, true);

        assert!(state.sockets.get(&3).is_none());
        drop(rx);

        let (tx2, rx2) = oneshot::channel();
        state.register(3, true, tx2);
        assert!(state.sockets.get(&3).unwrap().read_waiter.is_some());
        drop(rx2);
    }

    /// P3: a single ERR event resolves both waiters on that handle with
    /// the same error kind.
    #[test]
    fn error_event_resolves_both_directions() {
        let mut state = new_state();
        let (read_tx, read_rx) = oneshot::channel();
        let (write_tx, write_rx) = oneshot::channel();
        state.register(9, true, read_tx);
        state.register(9, false, write_tx);

        state.deliver(vec![SRT_EPOLL_EVENT {
            fd: 9,
            events: sys::SRT_EPOLL_ERR,
        }]);

        assert!(matches!(
            read_rx.blocking_recv(),
            Ok(Err(ErrorKind::ConnectionReset { .. }))
        ));
        assert!(matches!(
            write_rx.blocking_recv(),
            Ok(Err(ErrorKind::ConnectionReset { .. }))
        ));
        assert!(state.sockets.get(&9).is_none());
    }

    /// P4 (at-most-one-per-slot): registering a second waiter on the same
    /// (handle, direction) is rejected outright with `InvalidArgument`, and
    /// the first waiter stays installed untouched.
    #[test]
    fn second_register_on_same_direction_is_rejected() {
        let mut state = new_state();
        let (tx1, rx1) = oneshot::channel();
        let (tx2, rx2) = oneshot::channel();

        state.register(4, true, tx1);
        state.register(4, true, tx2);

        assert!(matches!(
            rx2.blocking_recv(),
            Ok(Err(ErrorKind::InvalidArgument { .. }))
        ));
        assert!(rx1.try_recv().is_err());
        assert!(state.sockets.get(&4).unwrap().read_waiter.is_some());
    }

    /// P5: once the last waiter on a handle is gone, it is removed from
    /// both the bookkeeping table and the native epoll group.
    #[test]
    fn last_waiter_removed_drops_epoll_membership() {
        let mut state = new_state();
        let (tx, _rx) = oneshot::channel();
        state.register(5, true, tx);
        state.cancel(5, true);

        assert!(state.sockets.get(&5).is_none());
        assert!(!state.epoll_members.contains(&5));
        assert!(state.ops.calls.borrow().iter().any(|op| *op == Op::Remove(5)));
    }

    /// A close diagnosed via the socket's own state (rather than an
    /// undiagnosable error) is reported as a local-close artifact, not a
    /// transport reset.
    #[test]
    fn closed_socket_diagnoses_as_aborted_not_reset() {
        let mut state = new_state();
        *state.ops.state.borrow_mut() = SRT_SOCKSTATUS::SRTS_CLOSED;

        let (tx, rx) = oneshot::channel();
        state.register(11, true, tx);
        state.deliver(vec![SRT_EPOLL_EVENT {
            fd: 11,
            events: sys::SRT_EPOLL_ERR,
        }]);

        assert!(matches!(
            rx.blocking_recv(),
            Ok(Err(ErrorKind::ConnectionAborted { .. }))
        ));
    }
}
