use std::fmt;
use std::fs;

use anyhow::{anyhow, bail, Context};
use rand::Rng;

use crate::common::{Position, SearchReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Start,
    End,
    Free,
    Wall,
    Path,
    Visited,
}

impl Role {
    fn symbol(self) -> char {
        match self {
            Role::Start => 'S',
            Role::End => 'E',
            Role::Free => '.',
            Role::Wall => '#',
            Role::Path => '*',
            Role::Visited => 'o',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    role: Role,
}

impl Tile {
    pub fn is_passable(&self) -> bool {
        self.role != Role::Wall
    }
}

/// Fixed-size 4-connected grid. Exactly one Start and one End cell exist at
/// all times; the mutators below refuse any edit that would break that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Map {
    pub height: usize,
    pub width: usize,
    grid: Vec<Vec<Tile>>,
    start: Position,
    end: Position,
}

impl Map {
    /// Open grid with start in the top-left and end in the bottom-right corner.
    pub fn new(height: usize, width: usize) -> anyhow::Result<Self> {
        if height * width < 2 {
            bail!("a {height}x{width} grid cannot hold distinct start and end cells");
        }
        let start = (0, 0);
        let end = (height - 1, width - 1);
        let mut grid = vec![vec![Tile { role: Role::Free }; width]; height];
        grid[start.0][start.1].role = Role::Start;
        grid[end.0][end.1].role = Role::End;
        Ok(Map {
            height,
            width,
            grid,
            start,
            end,
        })
    }

    /// Reads either the octile layout (`type`, `height N`, `width N`, `map`
    /// header followed by rows) or bare rows.
    pub fn from_file(path: &str, endpoints: Option<(Position, Position)>) -> anyhow::Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("failed to read map file {path}"))?;
        Self::parse(&text, endpoints).with_context(|| format!("error with map file: {path}"))
    }

    pub fn parse(text: &str, endpoints: Option<(Position, Position)>) -> anyhow::Result<Self> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .collect();

        let Some(first) = lines.first() else {
            bail!("map is empty");
        };
        if !first.starts_with("type") {
            return Self::from_rows(&lines, endpoints);
        }

        let height = header_value(lines.get(1), "height")?;
        let width = header_value(lines.get(2), "width")?;
        if lines.get(3).map(|line| line.trim()) != Some("map") {
            bail!("expected `map` after the header");
        }
        let rows = &lines[4..];
        if rows.len() != height {
            bail!("header declares {height} rows, found {}", rows.len());
        }
        let map = Self::from_rows(rows, endpoints)?;
        if map.width != width {
            bail!("header declares width {width}, found {}", map.width);
        }
        Ok(map)
    }

    /// Builds a map from rows of `.` (free), `S` (start), `E` (end) and any
    /// other character (wall). `endpoints` overrides the markers.
    pub fn from_rows<S: AsRef<str>>(
        rows: &[S],
        endpoints: Option<(Position, Position)>,
    ) -> anyhow::Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |row| row.as_ref().chars().count());
        if height == 0 || width == 0 {
            bail!("map has no cells");
        }

        let mut grid = Vec::with_capacity(height);
        let mut start = None;
        let mut end = None;
        for (x, line) in rows.iter().enumerate() {
            let line = line.as_ref();
            if line.chars().count() != width {
                bail!("row {x} has {} cells, expected {width}", line.chars().count());
            }
            let mut tiles_row = Vec::with_capacity(width);
            for (y, ch) in line.chars().enumerate() {
                let role = match ch {
                    '.' | 'G' => Role::Free,
                    'S' => {
                        if start.replace((x, y)).is_some() {
                            bail!("map has more than one start marker");
                        }
                        Role::Start
                    }
                    'E' => {
                        if end.replace((x, y)).is_some() {
                            bail!("map has more than one end marker");
                        }
                        Role::End
                    }
                    _ => Role::Wall,
                };
                tiles_row.push(Tile { role });
            }
            grid.push(tiles_row);
        }

        let (start, end) = match (endpoints, start, end) {
            (Some(endpoints), _, _) => endpoints,
            (None, Some(start), Some(end)) => (start, end),
            (None, None, _) => bail!("map has no start marker and no start was given"),
            (None, _, None) => bail!("map has no end marker and no end was given"),
        };

        let mut map = Map {
            height,
            width,
            grid,
            start,
            end,
        };
        if endpoints.is_some() {
            map.set_endpoints(start, end)?;
        }
        Ok(map)
    }

    /// Moves both endpoints at once; the old Start and End cells become Free.
    pub fn set_endpoints(&mut self, start: Position, end: Position) -> anyhow::Result<()> {
        for position in [start, end] {
            self.check_bounds(position)?;
            if self.is_wall(position) {
                bail!("endpoint {position:?} is a wall");
            }
        }
        if start == end {
            bail!("start and end are both {start:?}");
        }
        for x in 0..self.height {
            for y in 0..self.width {
                if matches!(self.grid[x][y].role, Role::Start | Role::End) {
                    self.grid[x][y].role = Role::Free;
                }
            }
        }
        self.set_role(start, Role::Start);
        self.set_role(end, Role::End);
        self.start = start;
        self.end = end;
        Ok(())
    }

    pub fn contains(&self, position: Position) -> bool {
        position.0 < self.height && position.1 < self.width
    }

    fn check_bounds(&self, position: Position) -> anyhow::Result<()> {
        if !self.contains(position) {
            bail!(
                "{position:?} is outside the {}x{} grid",
                self.height,
                self.width
            );
        }
        Ok(())
    }

    fn set_role(&mut self, position: Position, role: Role) {
        self.grid[position.0][position.1].role = role;
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn end(&self) -> Position {
        self.end
    }

    pub fn role(&self, position: Position) -> Role {
        self.grid[position.0][position.1].role
    }

    pub fn is_wall(&self, position: Position) -> bool {
        !self.grid[position.0][position.1].is_passable()
    }

    pub fn is_start(&self, position: Position) -> bool {
        position == self.start
    }

    pub fn is_end(&self, position: Position) -> bool {
        position == self.end
    }

    fn is_endpoint(&self, position: Position) -> bool {
        self.is_start(position) || self.is_end(position)
    }

    /// All positions, row-major.
    pub fn nodes(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.height).flat_map(move |x| (0..self.width).map(move |y| (x, y)))
    }

    /// In-bounds 4-neighbours in up, down, left, right order. Walls are
    /// included; callers filter with `is_wall`.
    pub fn get_neighbors(&self, position: Position) -> Vec<Position> {
        let directions = [(-1, 0), (1, 0), (0, -1), (0, 1)]; // Up, down, left, right
        let (x, y) = position;
        let mut neighbors = Vec::with_capacity(4);

        for &(dx, dy) in &directions {
            let new_x = x as i64 + dx;
            let new_y = y as i64 + dy;
            if new_x >= 0 && new_y >= 0 && new_x < self.height as i64 && new_y < self.width as i64
            {
                neighbors.push((new_x as usize, new_y as usize));
            }
        }

        neighbors
    }

    pub fn make_wall(&mut self, position: Position) -> anyhow::Result<()> {
        self.check_bounds(position)?;
        if self.is_endpoint(position) {
            bail!("cannot wall endpoint {position:?}");
        }
        self.set_role(position, Role::Wall);
        Ok(())
    }

    pub fn make_empty(&mut self, position: Position) -> anyhow::Result<()> {
        self.check_bounds(position)?;
        if self.is_endpoint(position) {
            bail!("cannot clear endpoint {position:?}");
        }
        self.set_role(position, Role::Free);
        Ok(())
    }

    /// Flips wall state and returns whether the cell is now a wall.
    pub fn toggle_wall(&mut self, position: Position) -> anyhow::Result<bool> {
        self.check_bounds(position)?;
        if self.is_wall(position) {
            self.make_empty(position)?;
            Ok(false)
        } else {
            self.make_wall(position)?;
            Ok(true)
        }
    }

    pub fn update_start(&mut self, position: Position) -> anyhow::Result<()> {
        self.check_bounds(position)?;
        if self.is_wall(position) || self.is_end(position) {
            bail!("cannot move start onto {position:?}");
        }
        let old = self.start;
        self.set_role(old, Role::Free);
        self.set_role(position, Role::Start);
        self.start = position;
        Ok(())
    }

    pub fn update_end(&mut self, position: Position) -> anyhow::Result<()> {
        self.check_bounds(position)?;
        if self.is_wall(position) || self.is_start(position) {
            bail!("cannot move end onto {position:?}");
        }
        let old = self.end;
        self.set_role(old, Role::Free);
        self.set_role(position, Role::End);
        self.end = position;
        Ok(())
    }

    /// Resets Path/Visited markings to Free; walls and endpoints are kept.
    pub fn clear_path(&mut self) {
        for row in &mut self.grid {
            for tile in row.iter_mut() {
                if matches!(tile.role, Role::Path | Role::Visited) {
                    tile.role = Role::Free;
                }
            }
        }
    }

    /// Resets every cell except the endpoints to Free.
    pub fn clear(&mut self) {
        for row in &mut self.grid {
            for tile in row.iter_mut() {
                if !matches!(tile.role, Role::Start | Role::End) {
                    tile.role = Role::Free;
                }
            }
        }
    }

    /// Turns each free cell into a wall with probability `density`.
    /// Returns how many walls were placed.
    pub fn scatter_walls<R: Rng + ?Sized>(
        &mut self,
        density: f64,
        rng: &mut R,
    ) -> anyhow::Result<usize> {
        if !(0.0..=1.0).contains(&density) {
            return Err(anyhow!("wall density must be within [0, 1], got {density}"));
        }
        let mut placed = 0;
        for row in &mut self.grid {
            for tile in row.iter_mut() {
                if tile.role == Role::Free && rng.gen_bool(density) {
                    tile.role = Role::Wall;
                    placed += 1;
                }
            }
        }
        Ok(placed)
    }

    /// Applies Visited and Path roles from a finished search. Endpoints and
    /// walls are left untouched.
    pub fn mark(&mut self, report: &SearchReport) {
        for &position in &report.visited {
            if self.role(position) == Role::Free {
                self.set_role(position, Role::Visited);
            }
        }
        for &position in &report.path {
            if !self.is_endpoint(position) && !self.is_wall(position) {
                self.set_role(position, Role::Path);
            }
        }
    }

    pub fn count(&self, role: Role) -> usize {
        self.grid
            .iter()
            .flatten()
            .filter(|tile| tile.role == role)
            .count()
    }
}

impl fmt::Display for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.grid {
            let line: String = row.iter().map(|tile| tile.role.symbol()).collect();
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

fn header_value(line: Option<&&str>, name: &str) -> anyhow::Result<usize> {
    let line = line.ok_or_else(|| anyhow!("missing `{name}` header line"))?;
    let mut parts = line.split_whitespace();
    if parts.next() != Some(name) {
        bail!("expected `{name} N`, got `{line}`");
    }
    let value = parts
        .next()
        .ok_or_else(|| anyhow!("`{name}` header has no value"))?;
    value
        .parse::<usize>()
        .with_context(|| format!("invalid {name} `{value}`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_read_map() {
        let map = Map::from_file("map_file/test/test.map", None).unwrap();

        assert_eq!(map.height, 5);
        assert_eq!(map.width, 5);
        assert_eq!(map.start(), (0, 0));
        assert_eq!(map.end(), (4, 4));

        assert!(!map.is_wall((0, 0)));
        assert!(map.is_wall((1, 1)));
        assert!(map.is_wall((1, 3)));
        assert!(map.is_wall((3, 1)));

        let neighbors = map.get_neighbors((1, 1));
        assert_eq!(neighbors, vec![(0, 1), (2, 1), (1, 0), (1, 2)]);
    }

    #[test]
    fn test_bare_rows_and_overrides() {
        let map = Map::parse("S..\n.#.\n..E\n", None).unwrap();
        assert_eq!((map.height, map.width), (3, 3));
        assert_eq!(map.role((0, 0)), Role::Start);
        assert_eq!(map.role((2, 2)), Role::End);

        let map = Map::parse("S..\n.#.\n..E\n", Some(((0, 2), (2, 0)))).unwrap();
        assert_eq!(map.start(), (0, 2));
        assert_eq!(map.end(), (2, 0));
        assert_eq!(map.role((0, 0)), Role::Free);
        assert_eq!(map.role((2, 2)), Role::Free);
        assert_eq!(map.count(Role::Start), 1);
        assert_eq!(map.count(Role::End), 1);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Map::parse("", None).is_err());
        assert!(Map::parse("S..\n..\n..E", None).is_err());
        assert!(Map::parse("...\n...", None).is_err());
        assert!(Map::parse("SS.\n..E", None).is_err());
        assert!(Map::parse("type octile\nheight 3\nwidth 2\nmap\nS.\n.E", None).is_err());
        assert!(Map::parse("S.#\n..E", Some(((0, 0), (0, 2)))).is_err());
    }

    #[test]
    fn test_neighbors_at_corner() {
        let map = Map::new(3, 4).unwrap();
        assert_eq!(map.get_neighbors((0, 0)), vec![(1, 0), (0, 1)]);
        assert_eq!(map.get_neighbors((2, 3)), vec![(1, 3), (2, 2)]);
        assert_eq!(map.nodes().count(), 12);
        assert_eq!(map.nodes().nth(5), Some((1, 1)));
    }

    #[test]
    fn test_mutators_protect_endpoints() {
        let mut map = Map::new(3, 3).unwrap();
        assert!(map.make_wall((0, 0)).is_err());
        assert!(map.toggle_wall((2, 2)).is_err());
        assert!(map.make_empty((0, 0)).is_err());
        assert!(map.make_wall((3, 0)).is_err());

        assert!(map.toggle_wall((1, 1)).unwrap());
        assert!(map.is_wall((1, 1)));
        assert!(map.update_start((1, 1)).is_err());
        assert!(map.update_end((0, 0)).is_err());
        assert!(!map.toggle_wall((1, 1)).unwrap());

        map.update_start((0, 1)).unwrap();
        assert_eq!(map.role((0, 0)), Role::Free);
        assert_eq!(map.role((0, 1)), Role::Start);
        map.update_end((1, 2)).unwrap();
        assert_eq!(map.role((2, 2)), Role::Free);
        assert_eq!(map.end(), (1, 2));
    }

    #[test]
    fn test_set_endpoints_swaps() {
        let mut map = Map::new(2, 3).unwrap();
        map.set_endpoints((1, 2), (0, 0)).unwrap();
        assert_eq!(map.start(), (1, 2));
        assert_eq!(map.end(), (0, 0));
        assert_eq!(map.to_string(), "E..\n..S\n");
        assert!(map.set_endpoints((0, 1), (0, 1)).is_err());
        assert!(map.set_endpoints((0, 1), (2, 0)).is_err());
    }

    #[test]
    fn test_mark_and_clear_path() {
        let mut map = Map::parse("S.#\n...\n..E", None).unwrap();
        let report = SearchReport {
            path: vec![(0, 1), (1, 1), (1, 2), (2, 2)],
            visited: vec![(0, 0), (0, 1), (1, 0), (1, 1), (1, 2)],
            expansions: 5,
        };
        map.mark(&report);
        assert_eq!(map.role((0, 0)), Role::Start);
        assert_eq!(map.role((2, 2)), Role::End);
        assert_eq!(map.role((1, 0)), Role::Visited);
        assert_eq!(map.role((1, 1)), Role::Path);
        assert_eq!(map.to_string(), "S*#\no**\n..E\n");

        map.clear_path();
        assert_eq!(map.to_string(), "S.#\n...\n..E\n");

        map.clear();
        assert_eq!(map.to_string(), "S..\n...\n..E\n");
    }

    #[test]
    fn test_scatter_walls() {
        let mut map = Map::new(10, 10).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        assert!(map.scatter_walls(1.5, &mut rng).is_err());

        let placed = map.scatter_walls(1.0, &mut rng).unwrap();
        assert_eq!(placed, 98);
        assert_eq!(map.count(Role::Wall), 98);
        assert!(!map.is_wall(map.start()));
        assert!(!map.is_wall(map.end()));

        map.clear();
        assert_eq!(map.scatter_walls(0.0, &mut rng).unwrap(), 0);
    }
}
