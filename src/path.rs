//! Shortest-path geometry on the road grid.

use serde::{Deserialize, Serialize};

use crate::grid::Location;

/// Sequence of road cells from origin to destination, both included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPath {
    cells: Vec<Location>,
}

impl GridPath {
    pub fn new(cells: Vec<Location>) -> Self {
        Self { cells }
    }

    pub fn cells(&self) -> &[Location] {
        &self.cells
    }

    /// Number of unit moves along the path.
    pub fn steps(&self) -> usize {
        self.cells.len().saturating_sub(1)
    }

    pub fn origin(&self) -> Option<&Location> {
        self.cells.first()
    }

    pub fn destination(&self) -> Option<&Location> {
        self.cells.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_excludes_origin() {
        let path = GridPath::new(vec![
            Location { x: 0, y: 0 },
            Location { x: 1, y: 0 },
            Location { x: 1, y: 1 },
        ]);
        assert_eq!(path.steps(), 2);
        assert_eq!(path.origin(), Some(&Location { x: 0, y: 0 }));
        assert_eq!(path.destination(), Some(&Location { x: 1, y: 1 }));
    }

    #[test]
    fn test_single_cell_path_has_no_steps() {
        let path = GridPath::new(vec![Location { x: 3, y: 3 }]);
        assert_eq!(path.steps(), 0);
    }

    #[test]
    fn test_empty_path() {
        let path = GridPath::new(vec![]);
        assert_eq!(path.steps(), 0);
        assert!(path.origin().is_none());
    }
}
