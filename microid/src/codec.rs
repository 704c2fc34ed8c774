use std::fmt;
use std::str::FromStr;

use crate::error::CodecError;
use crate::layout::{self, Cell, ANCHORS, CELL_COUNT, DATA_BITS, GRID_SIZE, PARITY};

/// Largest encodable serial (20 bits).
pub const MAX_SERIAL: u32 = (1 << DATA_BITS) - 1;

/// A serial number in `0..=MAX_SERIAL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Serial(u32);

impl Serial {
    pub fn new(value: u64) -> Result<Self, CodecError> {
        if value > MAX_SERIAL as u64 {
            return Err(CodecError::InvalidSerial(value));
        }
        Ok(Serial(value as u32))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// 20-character MSB-first binary form.
    pub fn binary(self) -> String {
        format!("{:020b}", self.0)
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08}", self.0)
    }
}

/// A 5×5 Micro-ID cell matrix, `true` where a dot is marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Grid {
    cells: [[bool; GRID_SIZE]; GRID_SIZE],
}

impl Grid {
    /// Parse grid text, ignoring every character other than '0' and '1'.
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        let bits: Vec<bool> = text
            .chars()
            .filter_map(|c| match c {
                '0' => Some(false),
                '1' => Some(true),
                _ => None,
            })
            .collect();
        if bits.len() != CELL_COUNT {
            return Err(CodecError::InvalidGridLength(bits.len()));
        }
        let mut grid = Grid::default();
        for (i, bit) in bits.into_iter().enumerate() {
            grid.cells[i / GRID_SIZE][i % GRID_SIZE] = bit;
        }
        Ok(grid)
    }

    #[inline]
    pub fn get(&self, c: Cell) -> bool {
        self.cells[c.row][c.col]
    }

    #[inline]
    pub fn set(&mut self, c: Cell, value: bool) {
        self.cells[c.row][c.col] = value;
    }

    pub fn cells(&self) -> &[[bool; GRID_SIZE]; GRID_SIZE] {
        &self.cells
    }

    /// Rotate the matrix a quarter turn clockwise.
    pub fn rotate_cw(&self) -> Grid {
        let mut out = Grid::default();
        for r in 0..GRID_SIZE {
            for c in 0..GRID_SIZE {
                out.cells[r][c] = self.cells[GRID_SIZE - 1 - c][r];
            }
        }
        out
    }

    /// Five-line dot picture, `●` for a dot and `○` for an empty cell.
    pub fn pretty(&self) -> String {
        self.cells
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&b| if b { "●" } else { "○" })
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.cells.iter().flatten() {
            f.write_str(if *b { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl FromStr for Grid {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Grid::parse(s)
    }
}

/// Result of decoding a grid: the best-effort serial plus structural checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    pub serial: Serial,
    pub anchors_valid: bool,
    pub parity_valid: bool,
    pub grid: Grid,
}

impl Decoded {
    /// Anchors and parity both check out.
    pub fn is_valid(&self) -> bool {
        self.anchors_valid && self.parity_valid
    }

    pub fn binary(&self) -> String {
        self.serial.binary()
    }
}

/// Encode a serial number into its grid. Values above `MAX_SERIAL` are rejected.
pub fn encode(serial: u64) -> Result<Grid, CodecError> {
    Ok(encode_serial(Serial::new(serial)?))
}

pub fn encode_serial(serial: Serial) -> Grid {
    let mut grid = Grid::default();
    for a in ANCHORS {
        grid.set(a, true);
    }
    let mut ones = 0;
    for bit in 0..DATA_BITS {
        let v = (serial.0 >> bit) & 1 == 1;
        grid.set(layout::data_cell(bit), v);
        ones += v as u32;
    }
    grid.set(PARITY, ones % 2 == 1);
    grid
}

/// Decode grid text. Only a wrong number of binary characters is an error;
/// anchor and parity failures are reported on the result.
pub fn decode(text: &str) -> Result<Decoded, CodecError> {
    Ok(decode_grid(&Grid::parse(text)?))
}

pub fn decode_grid(grid: &Grid) -> Decoded {
    let anchors_valid = ANCHORS.iter().all(|&a| grid.get(a));

    let mut value = 0u32;
    let mut ones = 0u32;
    for bit in 0..DATA_BITS {
        if grid.get(layout::data_cell(bit)) {
            value |= 1 << bit;
            ones += 1;
        }
    }
    let parity_valid = (ones + grid.get(PARITY) as u32) % 2 == 0;

    Decoded {
        serial: Serial(value),
        anchors_valid,
        parity_valid,
        grid: *grid,
    }
}

/// Decode the grid as read under each quarter turn: entry `k` is the grid
/// turned `k` times clockwise.
///
/// Anchors sit in the corners and parity covers every other cell, so both
/// checks give the same answer for all four entries; only the serial changes.
pub fn decode_rotations(grid: &Grid) -> [Decoded; 4] {
    let mut turned = *grid;
    std::array::from_fn(|_| {
        let d = decode_grid(&turned);
        turned = turned.rotate_cw();
        d
    })
}
