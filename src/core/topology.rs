//! Structural connection policies and the size-adaptive adjacency store.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{SynclustError, SynclustResult};

/// Oscillator identity: index into the network's phase vector.
pub type OscillatorId = usize;

/// Largest oscillator count stored as a dense byte matrix; larger networks
/// switch to packed bitmap rows.
pub const MATRIX_REPRESENTATION_LIMIT: usize = 4096;

/// Structural connection policies. Each generates a deterministic edge set
/// from the oscillator count alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConnectionPolicy {
    /// No edges; callers wire connections themselves (radius-based linking).
    #[default]
    None,
    /// Complete graph: every pair connected both ways.
    AllToAll,
    /// Four-neighbor grid (up/down/left/right); the count must be square.
    GridFour,
    /// Four-neighbor grid plus diagonals; the count must be square.
    GridEight,
    /// Open bidirectional chain: i connects to i-1 and i+1 where they exist.
    ListBidir,
}

/// Storage representation of an adjacency structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Representation {
    /// Dense byte matrix; the default at or below
    /// [`MATRIX_REPRESENTATION_LIMIT`] oscillators.
    Matrix,
    /// Packed 64-bit bitmap rows; the default above the limit, at one bit
    /// per entry instead of one byte.
    Bitmap,
}

#[derive(Debug, Clone)]
enum Store {
    Matrix(Vec<u8>),
    Bitmap { words: Vec<u64>, stride: usize },
}

/// Symmetric-by-convention adjacency over a fixed set of oscillators.
///
/// The representation is chosen once at construction and both variants
/// answer the same logical contract. Entries are directed: undirected
/// semantics come from callers setting both directions, which every
/// [`ConnectionPolicy`] generator does.
#[derive(Debug, Clone)]
pub struct Adjacency {
    n: usize,
    store: Store,
}

impl Adjacency {
    /// Build the adjacency for `policy` over `n` oscillators, choosing the
    /// representation from `n`.
    pub fn build(n: usize, policy: ConnectionPolicy) -> SynclustResult<Adjacency> {
        let repr = if n > MATRIX_REPRESENTATION_LIMIT {
            Representation::Bitmap
        } else {
            Representation::Matrix
        };
        Self::build_with(n, policy, repr)
    }

    /// Build with an explicit storage representation.
    ///
    /// Both representations answer identically; the override exists for
    /// tests and for memory tuning.
    pub fn build_with(
        n: usize,
        policy: ConnectionPolicy,
        repr: Representation,
    ) -> SynclustResult<Adjacency> {
        if n == 0 {
            return Err(SynclustError::Config(
                "oscillator count must be positive".into(),
            ));
        }
        let store = match repr {
            Representation::Matrix => Store::Matrix(vec![0u8; n * n]),
            Representation::Bitmap => {
                let stride = n.div_ceil(64);
                Store::Bitmap {
                    words: vec![0u64; n * stride],
                    stride,
                }
            }
        };
        let mut adjacency = Adjacency { n, store };
        adjacency.apply_policy(policy)?;
        Ok(adjacency)
    }

    fn apply_policy(&mut self, policy: ConnectionPolicy) -> SynclustResult<()> {
        match policy {
            ConnectionPolicy::None => {}
            ConnectionPolicy::AllToAll => {
                for i in 0..self.n {
                    for j in (i + 1)..self.n {
                        self.connect(i, j);
                        self.connect(j, i);
                    }
                }
            }
            ConnectionPolicy::ListBidir => {
                for i in 0..self.n {
                    if i > 0 {
                        self.connect(i, i - 1);
                    }
                    if i + 1 < self.n {
                        self.connect(i, i + 1);
                    }
                }
            }
            ConnectionPolicy::GridFour => self.apply_grid(false)?,
            ConnectionPolicy::GridEight => self.apply_grid(true)?,
        }
        Ok(())
    }

    fn apply_grid(&mut self, diagonals: bool) -> SynclustResult<()> {
        let side = integer_sqrt(self.n).ok_or_else(|| {
            SynclustError::Topology(format!(
                "grid policies need a square oscillator count, got {}",
                self.n
            ))
        })? as isize;

        // In-bounds (row, col) offsets cannot wrap across row boundaries.
        let offsets: &[(isize, isize)] = if diagonals {
            &[
                (-1, 0),
                (1, 0),
                (0, -1),
                (0, 1),
                (-1, -1),
                (-1, 1),
                (1, -1),
                (1, 1),
            ]
        } else {
            &[(-1, 0), (1, 0), (0, -1), (0, 1)]
        };

        for i in 0..self.n {
            let row = (i as isize) / side;
            let col = (i as isize) % side;
            for &(dr, dc) in offsets {
                let (r, c) = (row + dr, col + dc);
                if r >= 0 && r < side && c >= 0 && c < side {
                    self.connect(i, (r * side + c) as usize);
                }
            }
        }
        Ok(())
    }

    /// Set the directed entry i -> j. Symmetry is a caller convention, not
    /// enforced here.
    pub fn connect(&mut self, i: OscillatorId, j: OscillatorId) {
        debug_assert!(i < self.n && j < self.n);
        match &mut self.store {
            Store::Matrix(cells) => cells[i * self.n + j] = 1,
            Store::Bitmap { words, stride } => {
                words[i * *stride + j / 64] |= 1u64 << (j % 64);
            }
        }
    }

    /// Whether a directed connection i -> j exists.
    #[inline]
    pub fn is_connected(&self, i: OscillatorId, j: OscillatorId) -> bool {
        match &self.store {
            Store::Matrix(cells) => cells[i * self.n + j] != 0,
            Store::Bitmap { words, stride } => {
                words[i * stride + j / 64] & (1u64 << (j % 64)) != 0
            }
        }
    }

    /// Visit every neighbor of `i` without allocating.
    pub fn for_each_neighbor(&self, i: OscillatorId, mut visit: impl FnMut(OscillatorId)) {
        match &self.store {
            Store::Matrix(cells) => {
                let row = &cells[i * self.n..(i + 1) * self.n];
                for (j, &cell) in row.iter().enumerate() {
                    if cell != 0 {
                        visit(j);
                    }
                }
            }
            Store::Bitmap { words, stride } => {
                let row = &words[i * stride..(i + 1) * stride];
                for (w, &word) in row.iter().enumerate() {
                    let mut bits = word;
                    while bits != 0 {
                        let b = bits.trailing_zeros() as usize;
                        visit(w * 64 + b);
                        bits &= bits - 1;
                    }
                }
            }
        }
    }

    /// Neighbors of `i`, ascending, by scanning row `i`.
    ///
    /// O(n) per call; meant for diagnostics and extraction rather than the
    /// simulation hot path, which iterates rows in place.
    pub fn neighbors(&self, i: OscillatorId) -> Vec<OscillatorId> {
        let mut out = Vec::new();
        self.for_each_neighbor(i, |j| out.push(j));
        out
    }

    /// Number of connections leaving `i`.
    pub fn degree(&self, i: OscillatorId) -> usize {
        match &self.store {
            Store::Matrix(cells) => cells[i * self.n..(i + 1) * self.n]
                .iter()
                .filter(|&&cell| cell != 0)
                .count(),
            Store::Bitmap { words, stride } => words[i * stride..(i + 1) * stride]
                .iter()
                .map(|w| w.count_ones() as usize)
                .sum(),
        }
    }

    /// Total directed entries across all rows.
    pub fn directed_edges(&self) -> usize {
        (0..self.n).map(|i| self.degree(i)).sum()
    }

    /// Number of oscillators covered by this structure.
    pub fn oscillators(&self) -> usize {
        self.n
    }

    /// Storage representation in use.
    pub fn representation(&self) -> Representation {
        match self.store {
            Store::Matrix(_) => Representation::Matrix,
            Store::Bitmap { .. } => Representation::Bitmap,
        }
    }
}

fn integer_sqrt(n: usize) -> Option<usize> {
    let side = (n as f64).sqrt().round() as usize;
    (side * side == n).then_some(side)
}
