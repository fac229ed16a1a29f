//! ASCII battlefield renderer.
//!
//! Draws the board one character per cell for quick terminal review of a
//! run. Units are drawn over tiles; player 1 uses uppercase letters and
//! every other player lowercase.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use conquest_core::components::{PlayerId, UnitKind};
use conquest_core::math::GridPos;
use conquest_core::simulation::Simulation;
use conquest_core::tiles::{Tile, TileKind};

/// ASCII rendering configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsciiConfig {
    /// Print a legend and per-player unit counts under the map.
    pub show_legend: bool,
    /// Use ANSI colors per player.
    pub use_color: bool,
}

impl Default for AsciiConfig {
    fn default() -> Self {
        Self {
            show_legend: true,
            use_color: false,
        }
    }
}

mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const PLAYERS: [&str; 4] = ["\x1b[34m", "\x1b[31m", "\x1b[32m", "\x1b[33m"];
}

fn unit_char(kind: UnitKind, owner: PlayerId) -> char {
    let base = match kind {
        UnitKind::Infantry => 'i',
        UnitKind::Archer => 'a',
        UnitKind::Knight => 'k',
        UnitKind::Siege => 's',
    };
    if owner == 1 {
        base.to_ascii_uppercase()
    } else {
        base
    }
}

fn tile_char(kind: TileKind) -> char {
    match kind {
        TileKind::CapitalCity => '@',
        TileKind::City => 'C',
        TileKind::Mine => 'M',
        TileKind::Field => 'F',
        TileKind::Orchard => 'O',
        TileKind::Monastery => '+',
        TileKind::Marsh => '~',
        TileKind::Barracks => 'B',
        TileKind::Watchtower => '^',
    }
}

#[derive(Clone, Copy)]
struct Cell {
    glyph: char,
    owner: Option<PlayerId>,
}

/// Render the board.
#[must_use]
pub fn render_ascii(sim: &Simulation, tiles: &[Tile], config: &AsciiConfig) -> String {
    let size = sim.config().map_size as usize;
    let empty = Cell {
        glyph: '.',
        owner: None,
    };
    let mut grid = vec![vec![empty; size]; size];
    let mut put = |pos: GridPos, cell: Cell| {
        if let (Ok(x), Ok(y)) = (usize::try_from(pos.x), usize::try_from(pos.y)) {
            if x < size && y < size {
                grid[y][x] = cell;
            }
        }
    };

    for tile in tiles {
        let glyph = if tile.is_destroyed() {
            'x'
        } else {
            tile_char(tile.kind)
        };
        put(
            tile.position,
            Cell {
                glyph,
                owner: tile.owner,
            },
        );
    }

    let mut counts: BTreeMap<PlayerId, usize> = BTreeMap::new();
    for unit in sim.units().iter_sorted().filter(|u| !u.is_dead()) {
        *counts.entry(unit.owner).or_default() += 1;
        put(
            unit.position,
            Cell {
                glyph: unit_char(unit.kind, unit.owner),
                owner: Some(unit.owner),
            },
        );
    }

    let mut out = String::with_capacity(size * (size + 1) + 256);
    let _ = writeln!(out, "tick {}", sim.tick());
    for row in &grid {
        for cell in row {
            match (config.use_color, cell.owner) {
                (true, Some(owner)) => {
                    let color = colors::PLAYERS[(owner as usize).saturating_sub(1) % 4];
                    let _ = write!(out, "{color}{}{}", cell.glyph, colors::RESET);
                }
                (true, None) if cell.glyph == '.' => {
                    let _ = write!(out, "{}.{}", colors::DIM, colors::RESET);
                }
                _ => out.push(cell.glyph),
            }
        }
        out.push('\n');
    }

    if config.show_legend {
        out.push_str("units: I/i infantry  A/a archer  K/k knight  S/s siege\n");
        out.push_str("tiles: @ capital  C city  M mine  F field  O orchard  + monastery\n");
        out.push_str("       ~ marsh  B barracks  ^ watchtower  x destroyed\n");
        for (owner, count) in &counts {
            let _ = writeln!(out, "player {owner}: {count} units");
        }
        if let Some(winner) = sim.winner() {
            let _ = writeln!(out, "winner: player {winner}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use conquest_core::config::SimConfig;

    fn small_sim() -> Simulation {
        Simulation::new(SimConfig {
            map_size: 4,
            ..SimConfig::default()
        })
    }

    #[test]
    fn test_render_plain() {
        let mut sim = small_sim();
        sim.spawn_unit(UnitKind::Knight, 1, GridPos::new(1, 0));
        sim.spawn_unit(UnitKind::Archer, 2, GridPos::new(2, 3));
        let tiles = vec![
            Tile::new(1, TileKind::CapitalCity, GridPos::new(0, 0)).with_owner(1),
            Tile::new(2, TileKind::Marsh, GridPos::new(3, 3)),
        ];
        let config = AsciiConfig {
            show_legend: false,
            use_color: false,
        };

        let text = render_ascii(&sim, &tiles, &config);
        assert_eq!(text, "tick 0\n@K..\n....\n....\n..a~\n");
    }

    #[test]
    fn test_units_drawn_over_tiles() {
        let mut sim = small_sim();
        sim.spawn_unit(UnitKind::Siege, 2, GridPos::new(0, 0));
        let tiles = vec![Tile::new(1, TileKind::Mine, GridPos::new(0, 0))];

        let text = render_ascii(&sim, &tiles, &AsciiConfig::default());
        assert!(text.starts_with("tick 0\ns..."));
        assert!(text.contains("player 2: 1 units"));
    }

    #[test]
    fn test_color_output() {
        let mut sim = small_sim();
        sim.spawn_unit(UnitKind::Infantry, 1, GridPos::new(0, 0));
        let config = AsciiConfig {
            show_legend: false,
            use_color: true,
        };

        let text = render_ascii(&sim, &[], &config);
        assert!(text.contains("\x1b[34mI\x1b[0m"));
    }
}
