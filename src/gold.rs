//! Gold pile placement and collection (spec §4.3).

use std::collections::HashMap;

use rand::Rng;

use crate::map::Map;

/// Maps a room-floor cell id to its remaining nugget count. Entries are
/// reset to zero as they're collected, never removed — a cell that once
/// held gold stays a valid key for the life of the game.
#[derive(Debug, Default)]
pub struct GoldPool {
    piles: HashMap<usize, u32>,
    remaining: u32,
}

impl GoldPool {
    pub fn new() -> GoldPool {
        GoldPool::default()
    }

    /// Scatter `total` nuggets across `k` distinct room-floor cells, with
    /// `k` drawn uniformly from `[min_piles, min(max_piles, #room-floor)]`
    /// and each pile's size drawn by successive `rand() mod remaining + 1`,
    /// so every pile gets at least one nugget and the last pile absorbs
    /// whatever remains.
    pub fn init<R: Rng>(
        &mut self,
        map: &Map,
        rng: &mut R,
        total: u32,
        min_piles: usize,
        max_piles: usize,
    ) {
        self.piles.clear();

        let floor_cells: Vec<usize> = map.room_floor_ids().collect();
        let cap = max_piles.min(floor_cells.len());
        let k = if min_piles >= cap {
            cap
        } else {
            rng.gen_range(min_piles..=cap)
        };

        if k == 0 {
            self.remaining = 0;
            return;
        }

        let mut candidates = floor_cells;
        let chosen = pick_distinct(rng, &mut candidates, k);

        let mut left = total;
        for (i, cell) in chosen.iter().enumerate() {
            let amount = if i + 1 == chosen.len() {
                left
            } else {
                let picked = rng.gen_range(0..left) + 1;
                left -= picked;
                picked
            };
            self.piles.insert(*cell, amount);
        }

        self.remaining = total;
    }

    /// Empty `cell` and return what it held (0 if nothing was there).
    pub fn collect(&mut self, cell: usize) -> u32 {
        if let Some(amount) = self.piles.get_mut(&cell) {
            let picked = *amount;
            *amount = 0;
            self.remaining -= picked;
            picked
        } else {
            0
        }
    }

    /// Add `amount` nuggets back to `cell` (e.g. a quitting player's purse).
    pub fn deposit(&mut self, cell: usize, amount: u32) {
        *self.piles.entry(cell).or_insert(0) += amount;
        self.remaining += amount;
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn at(&self, cell: usize) -> u32 {
        self.piles.get(&cell).copied().unwrap_or(0)
    }

    pub fn piles(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.piles
            .iter()
            .filter(|(_, &amount)| amount > 0)
            .map(|(&cell, &amount)| (cell, amount))
    }
}

/// Pick `k` distinct elements uniformly at random from `pool` by swap-removal.
fn pick_distinct<R: Rng>(rng: &mut R, pool: &mut Vec<usize>, k: usize) -> Vec<usize> {
    let mut chosen = Vec::with_capacity(k);
    for _ in 0..k {
        let i = rng.gen_range(0..pool.len());
        chosen.push(pool.swap_remove(i));
    }
    chosen
}
