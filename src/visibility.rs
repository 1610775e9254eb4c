//! Line-of-sight visibility and remembered-set bookkeeping.
//!
//! Visibility is a straight-line crossing test against integer row/column
//! boundaries, not recursive shadowcasting: a target cell is visible when
//! every row/column boundary the line from viewer to target crosses has
//! at least one floor cell on it.

use std::collections::HashSet;

use crate::map::{CellKind, Map};

const EPS: f64 = 1e-6;

const EIGHT_DIRS: [(i32, i32); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

fn offset(r: usize, c: usize, dr: i32, dc: i32, map: &Map) -> Option<(usize, usize)> {
    let nr = r as i32 + dr;
    let nc = c as i32 + dc;
    if nr < 0 || nc < 0 || nr as usize >= map.rows() || nc as usize >= map.cols() {
        return None;
    }
    Some((nr as usize, nc as usize))
}

fn is_floor(map: &Map, r: usize, c: usize) -> bool {
    map.id_of(r, c).map(|id| map.is_room(id)).unwrap_or(false)
}

/// Passage cells restrict visibility to the 8 neighbours unless one of
/// those neighbours is a room-floor (the passage mouth), in which case
/// the normal long-range scan applies.
fn is_restricted_passage(map: &Map, viewer: usize, r0: usize, c0: usize) -> bool {
    if map.cell_at(viewer) != Some(CellKind::Passage) {
        return false;
    }
    for (dr, dc) in EIGHT_DIRS {
        if let Some((r, c)) = offset(r0, c0, dr, dc, map) {
            if let Some(id) = map.id_of(r, c) {
                if map.is_room(id) {
                    return false;
                }
            }
        }
    }
    true
}

/// Is the row-crossing at fixed column `c`, real row `rho`, blocked?
fn column_crossing_blocked(map: &Map, rho: f64, c: usize) -> bool {
    let nearest = rho.round();
    if (rho - nearest).abs() < EPS {
        if nearest < 0.0 {
            return true;
        }
        !is_floor(map, nearest as usize, c)
    } else {
        let lo = rho.floor();
        let hi = lo + 1.0;
        let lo_ok = lo >= 0.0 && is_floor(map, lo as usize, c);
        let hi_ok = hi >= 0.0 && is_floor(map, hi as usize, c);
        !(lo_ok || hi_ok)
    }
}

/// Is the column-crossing at fixed row `r`, real column `cc`, blocked?
fn row_crossing_blocked(map: &Map, r: usize, cc: f64) -> bool {
    let nearest = cc.round();
    if (cc - nearest).abs() < EPS {
        if nearest < 0.0 {
            return true;
        }
        !is_floor(map, r, nearest as usize)
    } else {
        let lo = cc.floor();
        let hi = lo + 1.0;
        let lo_ok = lo >= 0.0 && is_floor(map, r, lo as usize);
        let hi_ok = hi >= 0.0 && is_floor(map, r, hi as usize);
        !(lo_ok || hi_ok)
    }
}

/// Is `p` visible from `v` under the straight-line-of-sight rule?
fn los_clear(map: &Map, v: (usize, usize), p: (usize, usize)) -> bool {
    let (r0, c0) = v;
    let (r1, c1) = p;
    if r0 == r1 && c0 == c1 {
        return true;
    }

    if r0 == r1 {
        let (lo, hi) = if c0 < c1 { (c0, c1) } else { (c1, c0) };
        return (lo + 1..hi).all(|c| is_floor(map, r0, c));
    }

    if c0 == c1 {
        let (lo, hi) = if r0 < r1 { (r0, r1) } else { (r1, r0) };
        return (lo + 1..hi).all(|r| is_floor(map, r, c0));
    }

    let dr = r1 as f64 - r0 as f64;
    let dc = c1 as f64 - c0 as f64;

    let (clo, chi) = if c0 < c1 { (c0, c1) } else { (c1, c0) };
    for c in clo + 1..chi {
        let t = (c as f64 - c0 as f64) / dc;
        let rho = r0 as f64 + t * dr;
        if column_crossing_blocked(map, rho, c) {
            return false;
        }
    }

    let (rlo, rhi) = if r0 < r1 { (r0, r1) } else { (r1, r0) };
    for r in rlo + 1..rhi {
        let t = (r as f64 - r0 as f64) / dr;
        let cc = c0 as f64 + t * dc;
        if row_crossing_blocked(map, r, cc) {
            return false;
        }
    }

    true
}

/// The set of cells visible from `viewer`, including `viewer` itself.
pub fn visible_from(map: &Map, viewer: usize) -> HashSet<usize> {
    let mut visible = HashSet::new();
    visible.insert(viewer);

    let (r0, c0) = match map.coords(viewer) {
        Some(rc) => rc,
        None => return visible,
    };

    if is_restricted_passage(map, viewer, r0, c0) {
        for (dr, dc) in EIGHT_DIRS {
            if let Some((r, c)) = offset(r0, c0, dr, dc, map) {
                if let Some(id) = map.id_of(r, c) {
                    visible.insert(id);
                }
            }
        }
        return visible;
    }

    for id in 0..map.rows() * map.cols() {
        if id == viewer {
            continue;
        }
        let (r1, c1) = map.coords(id).expect("id within grid bounds");
        if los_clear(map, (r0, c0), (r1, c1)) {
            visible.insert(id);
        }
    }

    visible
}

/// Merge the currently-visible set into the viewer's remembered set.
/// Returns `(currently_visible, new_remembered)`.
pub fn update_view(
    prev_remembered: &HashSet<usize>,
    map: &Map,
    viewer: usize,
) -> (HashSet<usize>, HashSet<usize>) {
    let visible = visible_from(map, viewer);
    let mut remembered = prev_remembered.clone();
    remembered.extend(visible.iter().copied());
    (visible, remembered)
}
