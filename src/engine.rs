//! The authoritative game engine (spec §4.5): admission, movement
//! resolution, gold collection, and end-of-game detection.
//!
//! The engine never touches a socket. Every handler returns the list of
//! `(recipient, Outbound)` pairs the datagram loop should send, in the
//! order spec §4.5 requires (player join order, then the observer). This
//! keeps the engine trivially testable without a real `UdpSocket`, and
//! keeps the single writable game value owned explicitly by the caller
//! rather than exposed as a process-wide global (design note #1).

use std::collections::HashMap;
use std::net::SocketAddr;

use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::gold::GoldPool;
use crate::map::Map;
use crate::player::{Player, Registry};
use crate::protocol::{self, Outbound};
use crate::visibility;
use crate::{GOLD_TOTAL, MAX_PILES, MIN_PILES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Initialising,
    Running,
    Ending,
    Done,
}

pub struct Game {
    map: Map,
    gold: GoldPool,
    players: Registry,
    observer: Option<SocketAddr>,
    rng: Pcg32,
    lifecycle: Lifecycle,
    port: u16,
}

impl Game {
    pub fn new(map: Map, seed: u64) -> Game {
        let mut rng = Pcg32::seed_from_u64(seed);
        let mut gold = GoldPool::new();
        gold.init(&map, &mut rng, GOLD_TOTAL, MIN_PILES, MAX_PILES);
        Game {
            map,
            gold,
            players: Registry::new(),
            observer: None,
            rng,
            lifecycle: Lifecycle::Initialising,
            port: 0,
        }
    }

    pub fn mark_running(&mut self, port: u16) {
        self.lifecycle = Lifecycle::Running;
        self.port = port;
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_done(&self) -> bool {
        self.lifecycle == Lifecycle::Done
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn gold(&self) -> &GoldPool {
        &self.gold
    }

    pub fn players(&self) -> &Registry {
        &self.players
    }

    pub fn observer(&self) -> Option<SocketAddr> {
        self.observer
    }

    /// `PLAY <name>` (spec §4.5 Admission).
    pub fn handle_play(&mut self, name: &str, address: SocketAddr) -> Vec<(SocketAddr, Outbound)> {
        match self
            .players
            .join(name, address, &self.map, &mut self.gold, &mut self.rng)
        {
            Ok((letter, _)) => {
                let cell = self.players.by_letter(letter).unwrap().cell.unwrap();
                let (_, remembered) =
                    visibility::update_view(&Default::default(), &self.map, cell);
                self.players.by_letter_mut(letter).unwrap().remembered = remembered;

                let player = self.players.by_letter(letter).unwrap();
                let locations = self.players.player_locations();
                let mut out = vec![
                    (address, Outbound::Ok(letter)),
                    (address, Outbound::Grid(self.map.rows(), self.map.cols())),
                    (address, gold_outbound(player, &self.gold)),
                    (
                        address,
                        Outbound::Display(render_for_player(&self.map, &self.gold, &locations, player)),
                    ),
                ];
                out.extend(self.broadcast_except(Some(address)));
                self.check_game_over(out)
            }
            Err(crate::NuggetsError::GameFull) => vec![(
                address,
                Outbound::Quit("Game is full: no more players can join.".to_string()),
            )],
            Err(crate::NuggetsError::BadName) => vec![(
                address,
                Outbound::Quit("Sorry - you must provide player's name.".to_string()),
            )],
            Err(e) => vec![(address, Outbound::Error(e.to_string()))],
        }
    }

    /// `SPECTATE` (spec §4.5 Admission).
    pub fn handle_spectate(&mut self, address: SocketAddr) -> Vec<(SocketAddr, Outbound)> {
        let mut out = Vec::new();
        if let Some(prev) = self.observer {
            if prev != address {
                out.push((
                    prev,
                    Outbound::Quit("You have been replaced by a new spectator.".to_string()),
                ));
            }
        }
        self.observer = Some(address);

        let locations = self.players.player_locations();
        out.push((address, Outbound::Grid(self.map.rows(), self.map.cols())));
        out.push((
            address,
            Outbound::Gold { recent: 0, purse: 0, remaining: self.gold.remaining() },
        ));
        out.push((
            address,
            Outbound::Display(render_for_observer(&self.map, &self.gold, &locations)),
        ));
        out
    }

    /// `KEY <c>` (spec §4.5 Movement resolution).
    pub fn handle_key(&mut self, address: SocketAddr, key: char) -> Vec<(SocketAddr, Outbound)> {
        if Some(address) == self.observer {
            return self.handle_observer_key(address, key);
        }

        let letter = match self.players.by_address(&address) {
            Some(p) if p.is_live() => p.id,
            _ => {
                log::warn!("keystroke from unrecognised address {address}");
                return Vec::new();
            }
        };

        if protocol::is_quit_key(key) {
            return self.handle_quit(address);
        }

        let dir = match protocol::direction_for_key(key) {
            Some(d) => d,
            None => {
                return vec![(
                    address,
                    Outbound::Error(format!("unrecognised keystroke {key:?}")),
                )]
            }
        };

        self.resolve_movement(address, letter, dir, key.is_ascii_uppercase())
    }

    /// Operator shutdown via stdin EOF (spec §4.7): identical broadcast
    /// path to natural end-of-game.
    pub fn handle_shutdown(&mut self) -> Vec<(SocketAddr, Outbound)> {
        let mut out = self.broadcast_except(None);
        let summary = self.players.summary();
        for player in self.players.iter_live() {
            out.push((player.address, Outbound::Quit(format!("GAME OVER:\n{summary}"))));
        }
        if let Some(obs) = self.observer {
            out.push((obs, Outbound::Quit(format!("GAME OVER:\n{summary}"))));
        }
        self.lifecycle = Lifecycle::Done;
        out
    }

    fn handle_observer_key(&mut self, address: SocketAddr, key: char) -> Vec<(SocketAddr, Outbound)> {
        if protocol::is_quit_key(key) {
            self.observer = None;
            return vec![(address, Outbound::Quit("Thanks for watching!".to_string()))];
        }
        vec![(address, Outbound::Error("observers cannot move".to_string()))]
    }

    fn handle_quit(&mut self, address: SocketAddr) -> Vec<(SocketAddr, Outbound)> {
        self.players.quit(address, &mut self.gold);
        let mut out = vec![(address, Outbound::Quit("Thanks for playing!".to_string()))];
        out.extend(self.broadcast_except(Some(address)));
        self.check_game_over(out)
    }

    /// Drive one movement command: a single step for a lowercase key, or a
    /// run until blocked/swap for uppercase.
    fn resolve_movement(
        &mut self,
        address: SocketAddr,
        letter: char,
        dir: (i32, i32),
        uppercase: bool,
    ) -> Vec<(SocketAddr, Outbound)> {
        let mut total_gold: u32 = 0;
        let mut any_step = false;

        loop {
            let cell = self.players.by_letter(letter).unwrap().cell.unwrap();
            let (r, c) = self.map.coords(cell).unwrap();
            let nr = r as i32 + dir.0;
            let nc = c as i32 + dir.1;
            if nr < 0 || nc < 0 || nr as usize >= self.map.rows() || nc as usize >= self.map.cols() {
                break;
            }
            let target = self.map.id_of(nr as usize, nc as usize).unwrap();
            if !self.map.is_traversable(target) {
                break;
            }

            let occupant = self.players.player_locations().get(&target).copied();
            if let Some(other_letter) = occupant {
                self.players.swap_cells(letter, other_letter);
                any_step = true;
                // A swap always zeroes recent_gold for the moving player,
                // even if earlier steps in this same run collected gold.
                total_gold = 0;
                break;
            }

            self.players.by_letter_mut(letter).unwrap().cell = Some(target);
            total_gold += self.gold.collect(target);
            any_step = true;

            let prev = self.players.by_letter(letter).unwrap().remembered.clone();
            let (_, remembered) = visibility::update_view(&prev, &self.map, target);
            self.players.by_letter_mut(letter).unwrap().remembered = remembered;

            if !uppercase {
                break;
            }
        }

        if !any_step {
            return if uppercase {
                Vec::new()
            } else {
                vec![(address, Outbound::Error("move blocked".to_string()))]
            };
        }

        let mover = self.players.by_letter_mut(letter).unwrap();
        mover.purse += total_gold;
        mover.recent_gold = total_gold;
        let out = self.broadcast_except(None);
        self.check_game_over(out)
    }

    /// If gold just ran out, append the final `QUIT GAME OVER:` broadcast
    /// (spec §4.5 End-of-game) to an already-built broadcast list.
    fn check_game_over(&mut self, mut out: Vec<(SocketAddr, Outbound)>) -> Vec<(SocketAddr, Outbound)> {
        if self.gold.remaining() == 0 && self.lifecycle == Lifecycle::Running {
            self.lifecycle = Lifecycle::Ending;
            let summary = self.players.summary();
            for player in self.players.iter_live() {
                out.push((player.address, Outbound::Quit(format!("GAME OVER:\n{summary}"))));
            }
            if let Some(obs) = self.observer {
                out.push((obs, Outbound::Quit(format!("GAME OVER:\n{summary}"))));
            }
            self.lifecycle = Lifecycle::Done;
        }
        out
    }

    /// Build the GOLD+DISPLAY pair for every live player and the observer,
    /// in join order, skipping `exclude` if given.
    fn broadcast_except(&self, exclude: Option<SocketAddr>) -> Vec<(SocketAddr, Outbound)> {
        let locations = self.players.player_locations();
        let mut out = Vec::new();
        for player in self.players.iter_live() {
            if Some(player.address) == exclude {
                continue;
            }
            out.push((player.address, gold_outbound(player, &self.gold)));
            out.push((
                player.address,
                Outbound::Display(render_for_player(&self.map, &self.gold, &locations, player)),
            ));
        }
        if let Some(obs) = self.observer {
            if Some(obs) != exclude {
                out.push((
                    obs,
                    Outbound::Gold { recent: 0, purse: 0, remaining: self.gold.remaining() },
                ));
                out.push((
                    obs,
                    Outbound::Display(render_for_observer(&self.map, &self.gold, &locations)),
                ));
            }
        }
        out
    }
}

fn gold_outbound(player: &Player, gold: &GoldPool) -> Outbound {
    Outbound::Gold {
        recent: player.recent_gold,
        purse: player.purse,
        remaining: gold.remaining(),
    }
}

/// Render a `DISPLAY` framebuffer for one player: `@` for their own cell,
/// other players' letters, `*` for gold they can currently see, a blank
/// for anything never remembered, and the terrain glyph otherwise.
fn render_for_player(map: &Map, gold: &GoldPool, locations: &HashMap<usize, char>, player: &Player) -> String {
    let viewer_cell = player.cell.expect("render_for_player: player is live");
    let visible = visibility::visible_from(map, viewer_cell);

    let mut lines = Vec::with_capacity(map.rows());
    for r in 0..map.rows() {
        let mut line = String::with_capacity(map.cols());
        for c in 0..map.cols() {
            let id = map.id_of(r, c).expect("in-bounds coordinate");
            let glyph = if id == viewer_cell {
                '@'
            } else if !visible.contains(&id) && !player.remembered.contains(&id) {
                ' '
            } else if visible.contains(&id) {
                occupant_or_terrain(map, gold, locations, id)
            } else {
                map.cell_at(id).expect("valid cell").glyph()
            };
            line.push(glyph);
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// Render the whole-map framebuffer an observer sees (spec §4.5, §6).
fn render_for_observer(map: &Map, gold: &GoldPool, locations: &HashMap<usize, char>) -> String {
    let mut lines = Vec::with_capacity(map.rows());
    for r in 0..map.rows() {
        let mut line = String::with_capacity(map.cols());
        for c in 0..map.cols() {
            let id = map.id_of(r, c).expect("in-bounds coordinate");
            line.push(occupant_or_terrain(map, gold, locations, id));
        }
        lines.push(line);
    }
    lines.join("\n")
}

fn occupant_or_terrain(map: &Map, gold: &GoldPool, locations: &HashMap<usize, char>, id: usize) -> char {
    if let Some(&letter) = locations.get(&id) {
        letter
    } else if gold.at(id) > 0 {
        '*'
    } else {
        map.cell_at(id).expect("valid cell").glyph()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Map;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    fn wide_room() -> Map {
        Map::load(
            "+--------------------------------+\n\
             |.................................|\n\
             |.................................|\n\
             |.................................|\n\
             +--------------------------------+\n",
        )
        .unwrap()
    }

    #[test]
    fn join_sends_ok_grid_gold_display() {
        let mut game = Game::new(wide_room(), 7);
        game.mark_running(12345);
        let out = game.handle_play("Alice", addr(1));
        assert!(matches!(out[0].1, Outbound::Ok('A')));
        assert!(matches!(out[1].1, Outbound::Grid(_, _)));
        assert!(matches!(out[2].1, Outbound::Gold { .. }));
        assert!(matches!(out[3].1, Outbound::Display(_)));
    }

    #[test]
    fn blank_name_quits_without_registering() {
        let mut game = Game::new(wide_room(), 7);
        game.mark_running(12345);
        let out = game.handle_play("   ", addr(1));
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0].1, Outbound::Quit(text) if text.contains("must provide player's name")));
        assert!(game.players().by_address(&addr(1)).is_none());
    }

    #[test]
    fn twenty_seventh_play_is_rejected() {
        let mut game = Game::new(wide_room(), 7);
        game.mark_running(12345);
        for i in 0..26 {
            let out = game.handle_play(&format!("P{i}"), addr(i as u16));
            assert!(matches!(out[0].1, Outbound::Ok(_)));
        }
        let out = game.handle_play("Overflow", addr(999));
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0].1, Outbound::Quit(text) if text.contains("Game is full")));
    }

    #[test]
    fn spectate_evicts_previous_observer() {
        let mut game = Game::new(wide_room(), 7);
        game.mark_running(12345);
        game.handle_spectate(addr(1));
        let out = game.handle_spectate(addr(2));
        assert!(matches!(&out[0].1, Outbound::Quit(text) if text.contains("replaced by a new spectator")));
        assert_eq!(game.observer(), Some(addr(2)));
    }

    #[test]
    fn off_grid_move_is_rejected_with_error() {
        let mut game = Game::new(wide_room(), 7);
        game.mark_running(12345);
        game.handle_play("Alice", addr(1));
        // Force Alice to the top-left corner, then try to move further up/left.
        let corner = game.map().id_of(1, 1).unwrap();
        game.players
            .by_letter_mut('A')
            .unwrap()
            .cell = Some(corner);
        let out = game.handle_key(addr(1), 'k');
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0].1, Outbound::Error(_)));
    }

    #[test]
    fn uppercase_run_from_blocked_start_is_silent() {
        let mut game = Game::new(wide_room(), 7);
        game.mark_running(12345);
        game.handle_play("Alice", addr(1));
        let corner = game.map().id_of(1, 1).unwrap();
        game.players
            .by_letter_mut('A')
            .unwrap()
            .cell = Some(corner);
        let out = game.handle_key(addr(1), 'K');
        assert!(out.is_empty());
    }

    #[test]
    fn adjacent_players_swap_without_gold_change() {
        let mut game = Game::new(wide_room(), 7);
        game.mark_running(12345);
        game.handle_play("Alice", addr(1));
        game.handle_play("Bob", addr(2));

        let a_cell = game.map().id_of(2, 2).unwrap();
        let b_cell = game.map().id_of(2, 3).unwrap();
        game.players.by_letter_mut('A').unwrap().cell = Some(a_cell);
        game.players.by_letter_mut('A').unwrap().purse = 3;
        game.players.by_letter_mut('B').unwrap().cell = Some(b_cell);
        game.players.by_letter_mut('B').unwrap().purse = 9;

        game.handle_key(addr(1), 'l');

        assert_eq!(game.players().by_letter('A').unwrap().cell, Some(b_cell));
        assert_eq!(game.players().by_letter('B').unwrap().cell, Some(a_cell));
        assert_eq!(game.players().by_letter('A').unwrap().purse, 3);
        assert_eq!(game.players().by_letter('B').unwrap().purse, 9);
    }

    #[test]
    fn uppercase_run_ending_in_a_swap_zeroes_recent_gold_but_keeps_purse() {
        let mut game = Game::new(wide_room(), 7);
        game.mark_running(12345);
        game.handle_play("Alice", addr(1));
        game.handle_play("Bob", addr(2));

        let start = game.map().id_of(2, 1).unwrap();
        let gold_cell = game.map().id_of(2, 2).unwrap();
        let bob_cell = game.map().id_of(2, 3).unwrap();
        game.players.by_letter_mut('A').unwrap().cell = Some(start);
        game.players.by_letter_mut('A').unwrap().purse = 0;
        game.players.by_letter_mut('B').unwrap().cell = Some(bob_cell);
        game.gold.deposit(gold_cell, 5);

        // Uppercase run to the right: first step onto gold_cell picks up 5,
        // second step is blocked by Bob and swaps instead.
        game.handle_key(addr(1), 'L');

        let alice = game.players().by_letter('A').unwrap();
        assert_eq!(alice.cell, Some(bob_cell));
        assert_eq!(alice.purse, 5);
        assert_eq!(alice.recent_gold, 0);
        assert_eq!(game.players().by_letter('B').unwrap().cell, Some(gold_cell));
    }

    #[test]
    fn quit_redeposits_purse_and_notifies_others() {
        let mut game = Game::new(wide_room(), 7);
        game.mark_running(12345);
        game.handle_play("Alice", addr(1));
        game.handle_play("Bob", addr(2));
        game.players.by_letter_mut('A').unwrap().purse = 11;

        let out = game.handle_key(addr(1), 'Q');
        assert!(matches!(&out[0].1, Outbound::Quit(text) if text.contains("Thanks for playing")));
        assert!(!game.players().by_letter('A').unwrap().is_live());
        // Bob should receive a fresh GOLD/DISPLAY reflecting the redeposit.
        assert!(out.iter().any(|(addr, _)| *addr == addr(2)));
    }

    #[test]
    fn game_over_broadcasts_quit_to_everyone() {
        let map = Map::load("+---+\n|...|\n+---+\n").unwrap();
        let mut game = Game::new(map, 1);
        game.mark_running(1);
        // Drain the pool directly to simulate the last pickup.
        while game.gold.remaining() > 0 {
            let cell = game.gold.piles().next().map(|(c, _)| c);
            if let Some(c) = cell {
                game.gold.collect(c);
            } else {
                break;
            }
        }
        game.handle_play("Alice", addr(1));
        let out = game.handle_key(addr(1), 'Q');
        assert!(out
            .iter()
            .any(|(_, msg)| matches!(msg, Outbound::Quit(text) if text.starts_with("GAME OVER:"))));
        assert!(game.is_done());
    }
}
