//! Named spots in the default 100x100 Busyville grid.
//!
//! Every spot lies on a main road (one coordinate a multiple of 10), so it is
//! routable on `busyville_roads(100)` without snapping.

/// A named grid cell.
#[derive(Debug, Clone)]
pub struct Spot {
    pub name: &'static str,
    pub x: i64,
    pub y: i64,
}

impl Spot {
    pub const fn new(name: &'static str, x: i64, y: i64) -> Self {
        Self { name, x, y }
    }

    pub fn coords(&self) -> (i64, i64) {
        (self.x, self.y)
    }
}

// ============================================================================
// Depots (contractor start locations)
// ============================================================================

pub const DEPOTS: &[Spot] = &[
    Spot::new("North Yard", 0, 0),
    Spot::new("Harbor Garage", 50, 50),
    Spot::new("East Lot", 90, 10),
    Spot::new("South Shed", 20, 90),
];

// ============================================================================
// Commercial block (10..30 x 10..30)
// ============================================================================

pub const DOWNTOWN: &[Spot] = &[
    Spot::new("Main & 1st", 10, 10),
    Spot::new("Market Hall", 20, 20),
    Spot::new("Old Bank", 30, 30),
    Spot::new("Corner Deli", 20, 14),
    Spot::new("Print Shop", 13, 20),
];

// ============================================================================
// Residential streets
// ============================================================================

pub const HOMES: &[Spot] = &[
    Spot::new("Maple Ct", 70, 20),
    Spot::new("Oak Ave", 80, 35),
    Spot::new("Birch Ln", 20, 70),
    Spot::new("Cedar Row", 35, 80),
    Spot::new("Elm St", 60, 10),
    Spot::new("Pine Loop", 10, 60),
];

// ============================================================================
// Industrial park (roads only every 10 cells)
// ============================================================================

pub const INDUSTRIAL: &[Spot] = &[
    Spot::new("Mill Gate", 70, 70),
    Spot::new("Depot Rd", 80, 64),
    Spot::new("Foundry", 63, 80),
];
