use enum_map::{enum_map, Enum, EnumMap};
use lazy_static::lazy_static;
use std::fmt;
use std::ops::Index;
use std::ops::IndexMut;

#[derive(Enum, Clone, Copy, Debug)]
pub enum C64Key {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,

    Zero,
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,

    AtSign,
    Colon,
    Comma,
    Currency,
    Dash,
    Equal,
    Period,
    Plus,
    Semicolon,
    Slash,
    Space,
    Star,

    Ctrl,
    Delete,
    Home,
    LShift,
    RShift,
    Return,

    Commodore,
    Stop,

    Up,
    CursorDown,
    CursorRight,
    Left,

    F1,
    F3,
    F5,
    F7,
}

pub type Row = u8;
pub type Column = u8;

/// Position in the 8x8 key matrix. `row` is the line selected by writing
/// a zero bit to CIA1 port A, `column` is the bit read back on port B.
#[derive(Debug, Clone, Copy)]
pub struct MatrixIndex {
    row: Row,
    column: Column,
}

impl MatrixIndex {
    pub fn rc(row: Row, column: Column) -> Self {
        MatrixIndex { row, column }
    }
}

use C64Key::*;
lazy_static! {
    static ref MATRIX_POS: EnumMap<C64Key, MatrixIndex> = enum_map! {
        Stop        => MatrixIndex { row: 7, column: 7 },
        Q           => MatrixIndex { row: 7, column: 6 },
        Commodore   => MatrixIndex { row: 7, column: 5 },
        Space       => MatrixIndex { row: 7, column: 4 },
        Two         => MatrixIndex { row: 7, column: 3 },
        Ctrl        => MatrixIndex { row: 7, column: 2 },
        Left        => MatrixIndex { row: 7, column: 1 },
        One         => MatrixIndex { row: 7, column: 0 },

        Slash       => MatrixIndex { row: 6, column: 7 },
        Up          => MatrixIndex { row: 6, column: 6 },
        Equal       => MatrixIndex { row: 6, column: 5 },
        RShift      => MatrixIndex { row: 6, column: 4 },
        Home        => MatrixIndex { row: 6, column: 3 },
        Semicolon   => MatrixIndex { row: 6, column: 2 },
        Star        => MatrixIndex { row: 6, column: 1 },
        Currency    => MatrixIndex { row: 6, column: 0 },

        Comma       => MatrixIndex { row: 5, column: 7 },
        AtSign      => MatrixIndex { row: 5, column: 6 },
        Colon       => MatrixIndex { row: 5, column: 5 },
        Period      => MatrixIndex { row: 5, column: 4 },
        Dash        => MatrixIndex { row: 5, column: 3 },
        L           => MatrixIndex { row: 5, column: 2 },
        P           => MatrixIndex { row: 5, column: 1 },
        Plus        => MatrixIndex { row: 5, column: 0 },

        N           => MatrixIndex { row: 4, column: 7 },
        O           => MatrixIndex { row: 4, column: 6 },
        K           => MatrixIndex { row: 4, column: 5 },
        M           => MatrixIndex { row: 4, column: 4 },
        Zero        => MatrixIndex { row: 4, column: 3 },
        J           => MatrixIndex { row: 4, column: 2 },
        I           => MatrixIndex { row: 4, column: 1 },
        Nine        => MatrixIndex { row: 4, column: 0 },

        V           => MatrixIndex { row: 3, column: 7 },
        U           => MatrixIndex { row: 3, column: 6 },
        H           => MatrixIndex { row: 3, column: 5 },
        B           => MatrixIndex { row: 3, column: 4 },
        Eight       => MatrixIndex { row: 3, column: 3 },
        G           => MatrixIndex { row: 3, column: 2 },
        Y           => MatrixIndex { row: 3, column: 1 },
        Seven       => MatrixIndex { row: 3, column: 0 },

        X           => MatrixIndex { row: 2, column: 7 },
        T           => MatrixIndex { row: 2, column: 6 },
        F           => MatrixIndex { row: 2, column: 5 },
        C           => MatrixIndex { row: 2, column: 4 },
        Six         => MatrixIndex { row: 2, column: 3 },
        D           => MatrixIndex { row: 2, column: 2 },
        R           => MatrixIndex { row: 2, column: 1 },
        Five        => MatrixIndex { row: 2, column: 0 },

        LShift      => MatrixIndex { row: 1, column: 7 },
        E           => MatrixIndex { row: 1, column: 6 },
        S           => MatrixIndex { row: 1, column: 5 },
        Z           => MatrixIndex { row: 1, column: 4 },
        Four        => MatrixIndex { row: 1, column: 3 },
        A           => MatrixIndex { row: 1, column: 2 },
        W           => MatrixIndex { row: 1, column: 1 },
        Three       => MatrixIndex { row: 1, column: 0 },

        CursorDown  => MatrixIndex { row: 0, column: 7 },
        F5          => MatrixIndex { row: 0, column: 6 },
        F3          => MatrixIndex { row: 0, column: 5 },
        F1          => MatrixIndex { row: 0, column: 4 },
        F7          => MatrixIndex { row: 0, column: 3 },
        CursorRight => MatrixIndex { row: 0, column: 2 },
        Return      => MatrixIndex { row: 0, column: 1 },
        Delete      => MatrixIndex { row: 0, column: 0 },
    };
}

/// Pressed-key state of the 8x8 matrix, `true` = pressed. The wire
/// encoding (1 = released) is produced by [`KeyboardMatrix::row_byte`].
#[derive(Default)]
pub struct KeyboardMatrix([[bool; 8]; 8]);

impl KeyboardMatrix {
    pub fn num_rows(&self) -> usize {
        self.0.len()
    }

    pub fn num_columns(&self) -> usize {
        self.0[0].len()
    }

    /// One matrix row as CIA1 port B sees it: bit `c` is 0 iff the key at
    /// (row, c) is held.
    pub fn row_byte(&self, row: Row) -> u8 {
        let mut pressed: u8 = 0;
        for (col, is_pressed) in self.0[row as usize & 0x7].iter().enumerate() {
            pressed |= (*is_pressed as u8) << col;
        }
        !pressed
    }
}

impl IndexMut<MatrixIndex> for KeyboardMatrix {
    fn index_mut(&mut self, idx: MatrixIndex) -> &mut Self::Output {
        &mut self.0[idx.row as usize][idx.column as usize]
    }
}

impl Index<MatrixIndex> for KeyboardMatrix {
    type Output = bool;
    fn index(&self, idx: MatrixIndex) -> &Self::Output {
        &self.0[idx.row as usize][idx.column as usize]
    }
}

impl IndexMut<C64Key> for KeyboardMatrix {
    fn index_mut(&mut self, key: C64Key) -> &mut Self::Output {
        self.index_mut(MATRIX_POS[key])
    }
}

impl Index<C64Key> for KeyboardMatrix {
    type Output = bool;
    fn index(&self, key: C64Key) -> &Self::Output {
        self.index(MATRIX_POS[key])
    }
}

impl<I> From<I> for KeyboardMatrix
where
    I: Iterator<Item = C64Key>,
{
    fn from(pressed_keys: I) -> Self {
        let mut matrix = KeyboardMatrix::default();

        for key in pressed_keys {
            matrix[MATRIX_POS[key]] = true;
        }

        matrix
    }
}

impl fmt::Debug for KeyboardMatrix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for row in self.0.iter() {
            for is_pressed in row {
                write!(f, "{}", *is_pressed as u8)?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}
