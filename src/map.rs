//! Immutable terrain grid (spec §3, §4.1).
//!
//! A [`Map`] is parsed once at startup from plain text and never mutated
//! again. Cells are addressed either by `(row, col)` or by the compact
//! integer id `row * cols + col` used on the wire and as set/map keys
//! (design note: no string-keyed cell ids, unlike the C original).

use crate::error::NuggetsError;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CellKind {
    Rock,
    RoomFloor,
    HorizontalWall,
    VerticalWall,
    Corner,
    Passage,
}

impl CellKind {
    fn from_glyph(ch: char) -> Option<CellKind> {
        match ch {
            ' ' => Some(CellKind::Rock),
            '.' => Some(CellKind::RoomFloor),
            '-' => Some(CellKind::HorizontalWall),
            '|' => Some(CellKind::VerticalWall),
            '+' => Some(CellKind::Corner),
            '#' => Some(CellKind::Passage),
            _ => None,
        }
    }

    pub fn glyph(self) -> char {
        match self {
            CellKind::Rock => ' ',
            CellKind::RoomFloor => '.',
            CellKind::HorizontalWall => '-',
            CellKind::VerticalWall => '|',
            CellKind::Corner => '+',
            CellKind::Passage => '#',
        }
    }
}

#[derive(Clone, Debug)]
pub struct Map {
    rows: usize,
    cols: usize,
    cells: Vec<CellKind>,
}

impl Map {
    /// Parse a rectangular text map. Every line (after stripping a single
    /// trailing `\n`) must have the same length and use only the glyphs in
    /// [`CellKind::from_glyph`].
    pub fn load(text: &str) -> Result<Map, NuggetsError> {
        let lines: Vec<&str> = text.lines().collect();
        if lines.is_empty() {
            return Err(NuggetsError::BadMap("map is empty".to_string()));
        }

        let cols = lines[0].chars().count();
        if cols == 0 {
            return Err(NuggetsError::BadMap("map has zero-width rows".to_string()));
        }
        let rows = lines.len();

        let mut cells = Vec::with_capacity(rows * cols);
        for (r, line) in lines.iter().enumerate() {
            let line_cols = line.chars().count();
            if line_cols != cols {
                return Err(NuggetsError::BadMap(format!(
                    "row {r} has {line_cols} columns, expected {cols}"
                )));
            }
            for ch in line.chars() {
                let kind = CellKind::from_glyph(ch)
                    .ok_or_else(|| NuggetsError::BadMap(format!("unknown glyph {ch:?}")))?;
                cells.push(kind);
            }
        }

        Ok(Map { rows, cols, cells })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn id_of(&self, r: usize, c: usize) -> Option<usize> {
        if r < self.rows && c < self.cols {
            Some(r * self.cols + c)
        } else {
            None
        }
    }

    pub fn coords(&self, id: usize) -> Option<(usize, usize)> {
        if id < self.cells.len() {
            Some((id / self.cols, id % self.cols))
        } else {
            None
        }
    }

    pub fn cell_at(&self, id: usize) -> Option<CellKind> {
        self.cells.get(id).copied()
    }

    pub fn is_traversable(&self, id: usize) -> bool {
        matches!(
            self.cell_at(id),
            Some(CellKind::RoomFloor) | Some(CellKind::Passage)
        )
    }

    pub fn is_room(&self, id: usize) -> bool {
        matches!(self.cell_at(id), Some(CellKind::RoomFloor))
    }

    pub fn room_floor_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, kind)| matches!(kind, CellKind::RoomFloor))
            .map(|(id, _)| id)
    }

    pub fn traversable_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, kind)| matches!(kind, CellKind::RoomFloor | CellKind::Passage))
            .map(|(id, _)| id)
    }
}
