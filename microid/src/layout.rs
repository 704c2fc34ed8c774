/// A cell position in the 5×5 grid, row 0 at the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

const fn cell(row: usize, col: usize) -> Cell {
    Cell { row, col }
}

pub const GRID_SIZE: usize = 5;
pub const CELL_COUNT: usize = GRID_SIZE * GRID_SIZE;
pub const DATA_BITS: usize = 20;

/// Corner anchors, always marked.
pub const ANCHORS: [Cell; 4] = [cell(0, 0), cell(0, 4), cell(4, 0), cell(4, 4)];

/// Even-parity cell covering the 20 data bits.
pub const PARITY: Cell = cell(4, 3);

/// Data cells ordered MSB first: `DATA[0]` holds bit 19, `DATA[19]` holds bit 0.
///
/// ```text
/// Row 0: [ANCHOR] [Bit19] [Bit18] [Bit17] [ANCHOR]
/// Row 1: [Bit16]  [Bit15] [Bit14] [Bit13] [Bit12]
/// Row 2: [Bit11]  [Bit10] [Bit9]  [Bit8]  [Bit7]
/// Row 3: [Bit6]   [Bit5]  [Bit4]  [Bit3]  [Bit2]
/// Row 4: [ANCHOR] [Bit1]  [Bit0]  [PARITY][ANCHOR]
/// ```
#[rustfmt::skip]
pub const DATA: [Cell; DATA_BITS] = [
    cell(0, 1), cell(0, 2), cell(0, 3),
    cell(1, 0), cell(1, 1), cell(1, 2), cell(1, 3), cell(1, 4),
    cell(2, 0), cell(2, 1), cell(2, 2), cell(2, 3), cell(2, 4),
    cell(3, 0), cell(3, 1), cell(3, 2), cell(3, 3), cell(3, 4),
    cell(4, 1), cell(4, 2),
];

/// Cell holding logical bit `bit` (0 = LSB, 19 = MSB).
pub fn data_cell(bit: usize) -> Cell {
    DATA[DATA_BITS - 1 - bit]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_covers_every_cell_once() {
        let mut seen = [[0u8; GRID_SIZE]; GRID_SIZE];
        for c in ANCHORS.iter().chain(DATA.iter()).chain(std::iter::once(&PARITY)) {
            seen[c.row][c.col] += 1;
        }
        for row in seen {
            assert_eq!(row, [1; GRID_SIZE]);
        }
    }

    #[test]
    fn msb_and_lsb_positions() {
        assert_eq!(data_cell(19), cell(0, 1));
        assert_eq!(data_cell(0), cell(4, 2));
        assert_eq!(data_cell(2), cell(3, 4));
    }
}
