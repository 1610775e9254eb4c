//! Server entry point: parse arguments, load the map, bind the socket,
//! and drive the datagram loop until the game ends (spec §6).

use std::net::UdpSocket;
use std::process::ExitCode;

use clap::Parser;
use flexi_logger::Logger;

use nuggets::engine::Game;
use nuggets::net;
use nuggets::NuggetsError;

#[derive(Debug, Parser)]
#[command(name = "server", about = "Host a nuggets game over UDP")]
struct Args {
    /// Path to the map file to load.
    map_path: String,

    /// RNG seed. Must be a positive integer if given. Defaults to the
    /// process id if omitted.
    seed: Option<i64>,
}

fn main() -> ExitCode {
    // clap's own exit() path uses code 2 on parse failure, which collides
    // with this protocol's reserved exit code for a socket-bind failure
    // (spec §6) — parse manually instead so `2` stays exclusively ours.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = Logger::try_with_env_or_str("info").and_then(|l| l.log_to_stderr().start()) {
        eprintln!("failed to start logger: {e}");
    }

    match run(args) {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            log::error!("fatal: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn run(args: Args) -> Result<(), NuggetsError> {
    let text = std::fs::read_to_string(&args.map_path)
        .map_err(|e| NuggetsError::BadArguments(format!("cannot read {}: {e}", args.map_path)))?;
    let map = nuggets::map::Map::load(&text)?;

    let seed = match args.seed {
        Some(s) if s > 0 => s as u64,
        Some(s) => {
            return Err(NuggetsError::BadArguments(format!(
                "seed must be a positive integer, got {s}"
            )))
        }
        None => std::process::id() as u64,
    };
    let mut game = Game::new(map, seed);

    let socket = UdpSocket::bind(("0.0.0.0", 0)).map_err(NuggetsError::SocketError)?;
    let port = socket.local_addr().map_err(NuggetsError::SocketError)?.port();
    game.mark_running(port);

    println!("Ready to play, waiting at port {port}");
    log::info!("listening on port {port}, seed {seed}");

    net::run(&socket, game).map_err(NuggetsError::SocketError)
}
