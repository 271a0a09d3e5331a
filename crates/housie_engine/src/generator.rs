//! Randomized ticket generation.
//!
//! Generation runs in two phases. The first fixes the 0/1 skeleton: how many
//! cells each column gets and which rows they land in, such that every row
//! ends with exactly five cells. The second samples the actual values for
//! each column from its band. The skeleton search is a bounded random retry;
//! when it exhausts its attempts a known-valid layout is used instead, so
//! generation never fails.

use crate::ticket::{
    COLUMNS, Grid, NUMBERS_PER_ROW, NUMBERS_PER_TICKET, ROWS, Ticket, TicketId, column_band,
};
use rand::rngs::StdRng;
use rand::seq::{SliceRandom, index};
use rand::{Rng, SeedableRng};
use tracing::{debug, instrument, warn};

/// Skeleton attempts before falling back to the fixed layout.
pub const MAX_LAYOUT_ATTEMPTS: usize = 100;

/// Rows occupied by each column, ascending.
type ColumnRows = [Vec<usize>; COLUMNS];

/// Known-valid layout: six columns of two cells, three of one, five per row.
const FALLBACK_ROWS: [&[usize]; COLUMNS] = [
    &[0, 1],
    &[1, 2],
    &[0, 2],
    &[0, 1],
    &[1, 2],
    &[0, 2],
    &[0],
    &[1],
    &[2],
];

/// Produces valid ticket grids from a random source.
#[derive(Debug)]
pub struct TicketGenerator<R = StdRng> {
    rng: R,
    layout_attempts: usize,
    fallback_count: usize,
}

impl TicketGenerator<StdRng> {
    /// Creates a generator seeded from the operating system.
    pub fn from_os_rng() -> Self {
        Self::new(StdRng::from_os_rng())
    }

    /// Creates a reproducible generator.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> TicketGenerator<R> {
    /// Wraps a random source.
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            layout_attempts: MAX_LAYOUT_ATTEMPTS,
            fallback_count: 0,
        }
    }

    /// Overrides the skeleton retry bound.
    pub fn with_layout_attempts(mut self, attempts: usize) -> Self {
        self.layout_attempts = attempts;
        self
    }

    /// Number of tickets that had to use the fixed fallback layout.
    ///
    /// A non-zero value means ticket diversity was degraded.
    pub fn fallback_count(&self) -> usize {
        self.fallback_count
    }

    /// Generates a single grid.
    #[instrument(skip(self))]
    pub fn generate_grid(&mut self) -> Grid {
        let layout = self.layout();
        self.fill_values(&layout)
    }

    /// Generates the `ordinal`-th ticket (1-based, used for its id).
    pub fn generate(&mut self, ordinal: usize) -> Ticket {
        Ticket::new(TicketId::from_ordinal(ordinal), self.generate_grid())
    }

    /// Generates `count` independently randomized tickets `T-01..`.
    #[instrument(skip(self))]
    pub fn generate_batch(&mut self, count: usize) -> Vec<Ticket> {
        let tickets: Vec<Ticket> = (1..=count).map(|ordinal| self.generate(ordinal)).collect();
        debug!(count = tickets.len(), fallbacks = self.fallback_count, "Generated ticket batch");
        tickets
    }

    fn layout(&mut self) -> ColumnRows {
        let counts = self.column_counts();
        for attempt in 0..self.layout_attempts {
            if let Some(rows) = self.place_rows(&counts) {
                if attempt > 0 {
                    debug!(attempt, "Row placement succeeded after retry");
                }
                return rows;
            }
        }

        self.fallback_count += 1;
        warn!(
            attempts = self.layout_attempts,
            fallbacks = self.fallback_count,
            ?counts,
            "Ticket layout search exhausted, using fallback layout"
        );
        std::array::from_fn(|column| FALLBACK_ROWS[column].to_vec())
    }

    /// Column sizes in `[1, 3]` summing to fifteen.
    fn column_counts(&mut self) -> [usize; COLUMNS] {
        let mut counts = [1usize; COLUMNS];
        let mut total = COLUMNS;
        while total < NUMBERS_PER_TICKET {
            let column = self.rng.random_range(0..COLUMNS);
            if counts[column] < ROWS {
                counts[column] += 1;
                total += 1;
            }
        }
        counts
    }

    /// One randomized attempt at distributing column cells across rows.
    fn place_rows(&mut self, counts: &[usize; COLUMNS]) -> Option<ColumnRows> {
        let mut remaining = [NUMBERS_PER_ROW; ROWS];
        let mut rows: ColumnRows = std::array::from_fn(|_| Vec::new());

        let mut order: Vec<usize> = (0..COLUMNS).collect();
        order.shuffle(&mut self.rng);

        for column in order {
            let needed = counts[column];
            let mut available: Vec<usize> = (0..ROWS).filter(|&row| remaining[row] > 0).collect();
            if available.len() < needed {
                return None;
            }
            available.shuffle(&mut self.rng);
            available.truncate(needed);
            available.sort_unstable();
            for &row in &available {
                remaining[row] -= 1;
            }
            rows[column] = available;
        }

        remaining.iter().all(|&left| left == 0).then_some(rows)
    }

    /// Samples each column's values without replacement, ascending down the rows.
    fn fill_values(&mut self, layout: &ColumnRows) -> Grid {
        let mut grid = [[0u8; COLUMNS]; ROWS];
        for (column, rows) in layout.iter().enumerate() {
            let band = column_band(column);
            let start = *band.start();
            let width = usize::from(*band.end() - start) + 1;

            let mut values: Vec<u8> = index::sample(&mut self.rng, width, rows.len())
                .into_iter()
                .map(|offset| start + offset as u8)
                .collect();
            values.sort_unstable();

            for (&row, value) in rows.iter().zip(values) {
                grid[row][column] = value;
            }
        }
        grid
    }
}
