//! The datagram event loop (spec §4.7).
//!
//! Design note #1: no writable global state. `run` owns the one [`Game`]
//! value and the one `UdpSocket`; both live on the stack of the thread
//! that calls it. The only other thread this module spawns reads `stdin`
//! to detect EOF and never touches game state directly — it just wakes
//! the main loop up by sending `()` down an `mpsc::Receiver`.

use std::io::{self, Read};
use std::net::UdpSocket;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::engine::Game;
use crate::protocol::{self, Inbound, Outbound};
use crate::MESSAGE_MAX_BYTES;

const POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Spawn the stdin-EOF watcher thread described in SPEC_FULL.md §4.7.
/// Sends exactly one `()` the moment `read` returns `Ok(0)`, then exits.
fn spawn_stdin_eof_watcher() -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = [0u8; 64];
        loop {
            match io::stdin().read(&mut buf) {
                Ok(0) => {
                    let _ = tx.send(());
                    return;
                }
                Ok(_) => continue,
                Err(_) => return,
            }
        }
    });
    rx
}

/// Drive `game` to completion against `socket`. Blocks until the game
/// ends naturally (gold exhausted) or the operator closes stdin.
pub fn run(socket: &UdpSocket, mut game: Game) -> io::Result<()> {
    socket.set_read_timeout(Some(POLL_TIMEOUT))?;
    let shutdown_rx = spawn_stdin_eof_watcher();
    let mut buf = [0u8; MESSAGE_MAX_BYTES];

    loop {
        if game.is_done() {
            return Ok(());
        }

        if shutdown_rx.try_recv().is_ok() {
            let outgoing = game.handle_shutdown();
            send_all(socket, &outgoing);
            return Ok(());
        }

        match socket.recv_from(&mut buf) {
            Ok((n, from)) => {
                let text = String::from_utf8_lossy(&buf[..n]);
                let outgoing = dispatch(&mut game, &text, from);
                send_all(socket, &outgoing);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {
                continue;
            }
            Err(e) => {
                log::warn!("recv_from failed: {e}");
                continue;
            }
        }
    }
}

fn dispatch(
    game: &mut Game,
    text: &str,
    from: std::net::SocketAddr,
) -> Vec<(std::net::SocketAddr, Outbound)> {
    match protocol::parse_inbound(text) {
        Ok(Inbound::Play(name)) => game.handle_play(&name, from),
        Ok(Inbound::Spectate) => game.handle_spectate(from),
        Ok(Inbound::Key(key)) => game.handle_key(from, key),
        Err(e) => {
            log::debug!("malformed frame from {from}: {e}");
            vec![(from, Outbound::Error(e.to_string()))]
        }
    }
}

/// Best-effort fan-out: a single failed send is logged and skipped, never
/// lets one bad client address take down the loop (spec §5).
fn send_all(socket: &UdpSocket, outgoing: &[(std::net::SocketAddr, Outbound)]) {
    for (addr, message) in outgoing {
        let wire = message.to_wire();
        if let Err(e) = socket.send_to(wire.as_bytes(), addr) {
            log::warn!("send_to {addr} failed: {e}");
        }
    }
}
