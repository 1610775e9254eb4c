//! Player registry (spec §4.4).
//!
//! Design note #2: rather than a string-keyed hash table, the registry
//! keys directly by the datagram endpoint (`SocketAddr` is
//! equality-comparable) and by a fixed 26-slot array indexed by letter
//! `A..Z`, instead of a generic string-keyed map.

use std::collections::HashMap;
use std::net::SocketAddr;

use rand::Rng;

use crate::error::NuggetsError;
use crate::gold::GoldPool;
use crate::map::Map;
use crate::MAX_NAME_LEN;
use crate::MAX_PLAYERS;

/// Sentinel cell state for a player who has quit.
pub const LEFT_GAME: Option<usize> = None;

#[derive(Debug, Clone)]
pub struct Player {
    pub id: char,
    pub name: String,
    pub address: SocketAddr,
    pub purse: u32,
    pub recent_gold: u32,
    /// `None` means the player has quit (spec's `left-game` sentinel).
    pub cell: Option<usize>,
    pub remembered: std::collections::HashSet<usize>,
}

impl Player {
    pub fn is_live(&self) -> bool {
        self.cell.is_some()
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    /// Fixed 26-slot array, indexed by `letter - 'A'`.
    slots: Vec<Option<Player>>,
    by_address: HashMap<SocketAddr, usize>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry {
            slots: Vec::new(),
            by_address: HashMap::new(),
        }
    }

    /// Admit a new player. Picks a uniformly random unoccupied traversable
    /// cell, collects any gold already sitting there, and assigns the next
    /// letter in join order.
    ///
    /// Letters are never recycled (spec: "no recycling of letters after a
    /// quit"), so once 26 addresses have ever joined, a 27th `PLAY` is
    /// rejected even if some of the first 26 have since quit.
    pub fn join<R: Rng>(
        &mut self,
        name: &str,
        address: SocketAddr,
        map: &Map,
        gold: &mut GoldPool,
        rng: &mut R,
    ) -> Result<(char, u32), NuggetsError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(NuggetsError::BadName);
        }

        let address_is_live = self
            .by_address
            .get(&address)
            .map(|&i| self.slots[i].as_ref().is_some_and(Player::is_live))
            .unwrap_or(false);
        if address_is_live {
            return Err(NuggetsError::GameFull);
        }

        if self.slots.len() >= MAX_PLAYERS {
            return Err(NuggetsError::GameFull);
        }

        let display_name = sanitize_name(trimmed);
        let cell = self.random_unoccupied_cell(map, rng);
        let picked = gold.collect(cell);

        let index = self.slots.len();
        let letter = (b'A' + index as u8) as char;

        let player = Player {
            id: letter,
            name: display_name,
            address,
            purse: picked,
            recent_gold: picked,
            cell: Some(cell),
            remembered: std::collections::HashSet::new(),
        };

        self.slots.push(Some(player));
        self.by_address.insert(address, index);

        Ok((letter, picked))
    }

    fn random_unoccupied_cell<R: Rng>(&self, map: &Map, rng: &mut R) -> usize {
        let occupied: std::collections::HashSet<usize> =
            self.slots.iter().flatten().filter_map(|p| p.cell).collect();
        let candidates: Vec<usize> = map
            .traversable_ids()
            .filter(|id| !occupied.contains(id))
            .collect();
        debug_assert!(!candidates.is_empty(), "no free traversable cell for spawn");
        candidates[rng.gen_range(0..candidates.len())]
    }

    /// Mark the player as quit, depositing their purse back at their last
    /// cell. Returns the amount redeposited, if the address belonged to a
    /// live player.
    pub fn quit(&mut self, address: SocketAddr, gold: &mut GoldPool) -> Option<u32> {
        let index = *self.by_address.get(&address)?;
        let player = self.slots[index].as_mut()?;
        let last_cell = player.cell?;
        let purse = player.purse;
        player.cell = LEFT_GAME;
        player.purse = 0;
        player.recent_gold = 0;
        gold.deposit(last_cell, purse);
        Some(purse)
    }

    pub fn by_address(&self, address: &SocketAddr) -> Option<&Player> {
        let index = *self.by_address.get(address)?;
        self.slots[index].as_ref()
    }

    pub fn by_address_mut(&mut self, address: &SocketAddr) -> Option<&mut Player> {
        let index = *self.by_address.get(address)?;
        self.slots[index].as_mut()
    }

    pub fn by_letter(&self, letter: char) -> Option<&Player> {
        if !letter.is_ascii_uppercase() {
            return None;
        }
        let index = (letter as u8 - b'A') as usize;
        self.slots.get(index)?.as_ref()
    }

    pub fn by_letter_mut(&mut self, letter: char) -> Option<&mut Player> {
        if !letter.is_ascii_uppercase() {
            return None;
        }
        let index = (letter as u8 - b'A') as usize;
        self.slots.get_mut(index)?.as_mut()
    }

    /// Swap the `cell` of two live players directly, rather than iterating
    /// with a mutating visitor (design note #3).
    pub fn swap_cells(&mut self, letter_a: char, letter_b: char) {
        if letter_a == letter_b {
            return;
        }
        let ia = (letter_a as u8 - b'A') as usize;
        let ib = (letter_b as u8 - b'A') as usize;
        let (lo, hi) = if ia < ib { (ia, ib) } else { (ib, ia) };
        let (left, right) = self.slots.split_at_mut(hi);
        let a = left[lo].as_mut().expect("swap_cells: letter_a is live");
        let b = right[0].as_mut().expect("swap_cells: letter_b is live");
        std::mem::swap(&mut a.cell, &mut b.cell);
    }

    /// Every player in join order, live or quit.
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.slots.iter().flatten()
    }

    /// Live players in join order.
    pub fn iter_live(&self) -> impl Iterator<Item = &Player> {
        self.iter().filter(|p| p.is_live())
    }

    pub fn iter_live_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.slots.iter_mut().flatten().filter(|p| p.is_live())
    }

    /// Cell id -> player letter, excluding quit players.
    pub fn player_locations(&self) -> HashMap<usize, char> {
        self.iter_live()
            .filter_map(|p| p.cell.map(|c| (c, p.id)))
            .collect()
    }

    /// One line per player in join order: `<letter> <purse, 5-wide> <name>`.
    pub fn summary(&self) -> String {
        self.iter()
            .map(|p| format!("{} {:<5}{}", p.id, p.purse, p.name))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Trim to `MAX_NAME_LEN` characters and replace every non-graphical,
/// non-blank character with `_`.
fn sanitize_name(trimmed: &str) -> String {
    trimmed
        .chars()
        .take(MAX_NAME_LEN)
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Map;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    fn room() -> Map {
        Map::load(
            "+----------+\n\
             |..........|\n\
             |..........|\n\
             +----------+\n",
        )
        .unwrap()
    }

    #[test]
    fn join_assigns_letters_in_order() {
        let map = room();
        let mut gold = GoldPool::new();
        let mut rng = Pcg32::seed_from_u64(1);
        gold.init(&map, &mut rng, 250, 10, 30);
        let mut reg = Registry::new();

        let (a, _) = reg.join("Alice", addr(1), &map, &mut gold, &mut rng).unwrap();
        let (b, _) = reg.join("Bob", addr(2), &map, &mut gold, &mut rng).unwrap();
        assert_eq!(a, 'A');
        assert_eq!(b, 'B');
    }

    #[test]
    fn blank_name_is_rejected() {
        let map = room();
        let mut gold = GoldPool::new();
        let mut rng = Pcg32::seed_from_u64(1);
        let mut reg = Registry::new();
        let err = reg.join("   ", addr(1), &map, &mut gold, &mut rng).unwrap_err();
        assert!(matches!(err, NuggetsError::BadName));
    }

    #[test]
    fn duplicate_address_is_rejected() {
        let map = room();
        let mut gold = GoldPool::new();
        let mut rng = Pcg32::seed_from_u64(1);
        let mut reg = Registry::new();
        reg.join("Alice", addr(1), &map, &mut gold, &mut rng).unwrap();
        let err = reg.join("Alice2", addr(1), &map, &mut gold, &mut rng).unwrap_err();
        assert!(matches!(err, NuggetsError::GameFull));
    }

    #[test]
    fn full_game_is_rejected() {
        let map = Map::load(
            "+----------------------------+\n\
             |.............................|\n\
             |.............................|\n\
             |.............................|\n\
             +----------------------------+\n",
        )
        .unwrap();
        let mut gold = GoldPool::new();
        let mut rng = Pcg32::seed_from_u64(9);
        let mut reg = Registry::new();
        for i in 0..26 {
            reg.join(&format!("P{i}"), addr(i as u16), &map, &mut gold, &mut rng)
                .unwrap();
        }
        let err = reg
            .join("Overflow", addr(999), &map, &mut gold, &mut rng)
            .unwrap_err();
        assert!(matches!(err, NuggetsError::GameFull));
    }

    #[test]
    fn an_address_may_rejoin_after_quitting() {
        let map = room();
        let mut gold = GoldPool::new();
        let mut rng = Pcg32::seed_from_u64(1);
        let mut reg = Registry::new();
        reg.join("Alice", addr(1), &map, &mut gold, &mut rng).unwrap();
        reg.quit(addr(1), &mut gold);

        let (letter, _) = reg
            .join("Alice again", addr(1), &map, &mut gold, &mut rng)
            .unwrap();
        // Letters are never recycled: the returning address gets a fresh
        // letter, not 'A' again.
        assert_eq!(letter, 'B');
        assert!(reg.by_address(&addr(1)).unwrap().is_live());
    }

    #[test]
    fn cumulative_joins_are_capped_even_with_interleaved_quits() {
        let map = Map::load(
            "+----------------------------+\n\
             |.............................|\n\
             |.............................|\n\
             |.............................|\n\
             +----------------------------+\n",
        )
        .unwrap();
        let mut gold = GoldPool::new();
        let mut rng = Pcg32::seed_from_u64(9);
        let mut reg = Registry::new();
        // 26 distinct addresses join then immediately quit, one at a time,
        // so live_count never exceeds 1 even though 26 letters get used up.
        for i in 0..26 {
            reg.join(&format!("P{i}"), addr(i as u16), &map, &mut gold, &mut rng)
                .unwrap();
            reg.quit(addr(i as u16), &mut gold);
        }
        let err = reg
            .join("Overflow", addr(999), &map, &mut gold, &mut rng)
            .unwrap_err();
        assert!(matches!(err, NuggetsError::GameFull));
    }

    #[test]
    fn quit_deposits_purse_and_clears_cell() {
        let map = room();
        let mut gold = GoldPool::new();
        let mut rng = Pcg32::seed_from_u64(2);
        gold.init(&map, &mut rng, 250, 10, 30);
        let mut reg = Registry::new();
        reg.join("Alice", addr(1), &map, &mut gold, &mut rng).unwrap();

        let player = reg.by_address_mut(&addr(1)).unwrap();
        player.purse = 7;
        let cell = player.cell.unwrap();

        let remaining_before = gold.remaining();
        let redeposited = reg.quit(addr(1), &mut gold).unwrap();
        assert_eq!(redeposited, 7);
        assert_eq!(gold.remaining(), remaining_before + 7);
        assert_eq!(gold.at(cell), 7);

        let player = reg.by_address(&addr(1)).unwrap();
        assert!(!player.is_live());
        assert_eq!(player.cell, None);
    }

    #[test]
    fn player_locations_excludes_quit_players() {
        let map = room();
        let mut gold = GoldPool::new();
        let mut rng = Pcg32::seed_from_u64(5);
        gold.init(&map, &mut rng, 250, 10, 30);
        let mut reg = Registry::new();
        reg.join("Alice", addr(1), &map, &mut gold, &mut rng).unwrap();
        reg.join("Bob", addr(2), &map, &mut gold, &mut rng).unwrap();
        reg.quit(addr(1), &mut gold);

        let locations = reg.player_locations();
        assert_eq!(locations.len(), 1);
        assert!(locations.values().all(|&letter| letter == 'B'));
    }

    #[test]
    fn sanitizes_and_truncates_name() {
        let cleaned = sanitize_name("Bad\tName\x01Here");
        assert!(cleaned.chars().all(|c| c.is_ascii_graphic() || c == ' ' || c == '_'));
    }
}
