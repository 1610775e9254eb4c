//! Terminal client entry point (spec §4.7, §6). Holds no game state: it
//! forwards keystrokes to the server and paints whatever `DISPLAY` frame
//! comes back.

use std::io::{self, Write};
use std::net::UdpSocket;
use std::process::ExitCode;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use crossterm::event::{self, Event, KeyCode};
use crossterm::{cursor, execute, terminal};

use nuggets::protocol::{self, Outbound};
use nuggets::NuggetsError;

#[derive(Debug, Parser)]
#[command(name = "client", about = "Join a nuggets game over UDP")]
struct Args {
    host: String,
    port: u16,
    /// Player name. Omit to join as a spectator.
    playername: Option<String>,
}

/// Puts the terminal into raw, alternate-screen mode and restores it on
/// drop, so every exit path — including an early `?` — leaves the user's
/// shell intact (SPEC_FULL.md §6).
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<TerminalGuard> {
        terminal::enable_raw_mode()?;
        execute!(io::stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;
        Ok(TerminalGuard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), cursor::Show, terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(1);
        }
    };

    match run(args) {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            eprintln!("fatal: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn run(args: Args) -> Result<(), NuggetsError> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).map_err(NuggetsError::SocketError)?;
    socket
        .connect((args.host.as_str(), args.port))
        .map_err(NuggetsError::SocketError)?;

    let handshake = match &args.playername {
        Some(name) => format!("PLAY {name}"),
        None => "SPECTATE".to_string(),
    };
    socket
        .send(handshake.as_bytes())
        .map_err(NuggetsError::SocketError)?;

    let rx = spawn_socket_reader(socket.try_clone().map_err(NuggetsError::SocketError)?);
    let _guard = TerminalGuard::enter().map_err(NuggetsError::SocketError)?;

    loop {
        if event::poll(Duration::from_millis(50)).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                if let Some(c) = key_to_frame_char(key.code) {
                    let _ = socket.send(format!("KEY {c}").as_bytes());
                }
            }
        }

        match rx.try_recv() {
            Ok(frame) => {
                if handle_frame(&frame) {
                    return Ok(());
                }
            }
            Err(mpsc::TryRecvError::Empty) => continue,
            Err(mpsc::TryRecvError::Disconnected) => return Ok(()),
        }
    }
}

/// Reads datagrams on a dedicated thread and forwards each as a decoded
/// `Outbound`-shaped string, so the main thread only ever blocks on
/// `event::poll`, never on the socket.
fn spawn_socket_reader(socket: UdpSocket) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = [0u8; nuggets::MESSAGE_MAX_BYTES];
        loop {
            match socket.recv(&mut buf) {
                Ok(n) => {
                    let text = String::from_utf8_lossy(&buf[..n]).into_owned();
                    if tx.send(text).is_err() {
                        return;
                    }
                }
                Err(_) => return,
            }
        }
    });
    rx
}

/// Returns `true` once the server has said goodbye and the client should
/// exit its event loop.
fn handle_frame(raw: &str) -> bool {
    match protocol::parse_outbound(raw) {
        Ok(Outbound::Display(framebuffer)) => {
            let mut stdout = io::stdout();
            let _ = execute!(stdout, cursor::MoveTo(0, 0), terminal::Clear(terminal::ClearType::All));
            let _ = write!(stdout, "{framebuffer}");
            let _ = stdout.flush();
            false
        }
        Ok(Outbound::Quit(message)) => {
            let _ = execute!(io::stdout(), terminal::LeaveAlternateScreen, cursor::Show);
            let _ = terminal::disable_raw_mode();
            println!("{message}");
            true
        }
        Ok(Outbound::Error(message)) => {
            log_status(&message);
            false
        }
        Ok(_) => false,
        Err(e) => {
            log_status(&format!("malformed frame: {e}"));
            false
        }
    }
}

fn log_status(message: &str) {
    let mut stdout = io::stdout();
    let _ = execute!(stdout, cursor::MoveTo(0, 0));
    let _ = write!(stdout, "{message}");
    let _ = stdout.flush();
}

/// Map a terminal keypress to the single-character keystroke the protocol
/// expects. Arrow keys are accepted as aliases for the vi-style keys.
fn key_to_frame_char(code: KeyCode) -> Option<char> {
    match code {
        KeyCode::Char(c) => Some(c),
        KeyCode::Up => Some('k'),
        KeyCode::Down => Some('j'),
        KeyCode::Left => Some('h'),
        KeyCode::Right => Some('l'),
        KeyCode::Esc => Some('Q'),
        _ => None,
    }
}
