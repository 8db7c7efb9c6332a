//! The routing tile graph: a pure geometric post-process over placed
//! component rectangles.
//!
//! Construction follows five steps: component edges are extruded into
//! tile-lines, tiles are formed at tile-line intersections, adjacency is
//! derived through a corner-keyed map, each component records its
//! directly-adjacent tile per edge, and tiles are finally expanded to make
//! room for the routes assigned to them. Route positions within a tile are
//! evenly spaced indices over the tile's capacity.

use std::collections::{BTreeMap, BTreeSet};

use slotmap::{SlotMap, new_key_type};

use crate::eda::geometry::{Corner, Edge, IntersectType, Line, Orientation, Point, Rect};

new_key_type! {
    /// Key type for routing tiles.
    pub struct TileKey;
}

/// Per-tile route capacities, fixed at build time.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RoutingConfig {
    pub h_cap: u32,
    pub v_cap: u32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self { h_cap: 4, v_cap: 4 }
    }
}

/// A maximal component-free rectangle of the chip area.
#[derive(Debug)]
pub struct RoutingTile {
    /// Monotonically-assigned tile id, unique within the graph.
    pub id: u32,
    pub rect: Rect,
    north: Option<TileKey>,
    south: Option<TileKey>,
    east: Option<TileKey>,
    west: Option<TileKey>,
    h_cap: u32,
    v_cap: u32,
    h_routes: u32,
    v_routes: u32,
}

impl RoutingTile {
    fn new(id: u32, rect: Rect, config: RoutingConfig) -> Self {
        Self {
            id,
            rect,
            north: None,
            south: None,
            east: None,
            west: None,
            h_cap: config.h_cap,
            v_cap: config.v_cap,
            h_routes: 0,
            v_routes: 0,
        }
    }

    pub fn neighbor(&self, edge: Edge) -> Option<TileKey> {
        match edge {
            Edge::Top => self.north,
            Edge::Bottom => self.south,
            Edge::Left => self.west,
            Edge::Right => self.east,
        }
    }

    /// Adjacent tiles in north, south, west, east order.
    pub fn adjacent(&self) -> impl Iterator<Item = TileKey> {
        [self.north, self.south, self.west, self.east]
            .into_iter()
            .flatten()
    }

    fn set_neighbor(&mut self, edge: Edge, tile: Option<TileKey>) {
        match edge {
            Edge::Top => self.north = tile,
            Edge::Bottom => self.south = tile,
            Edge::Left => self.west = tile,
            Edge::Right => self.east = tile,
        }
    }

    pub fn capacity(&self, orientation: Orientation) -> u32 {
        match orientation {
            Orientation::Horizontal => self.h_cap,
            Orientation::Vertical => self.v_cap,
        }
    }

    pub fn route_count(&self, orientation: Orientation) -> u32 {
        match orientation {
            Orientation::Horizontal => self.h_routes,
            Orientation::Vertical => self.v_routes,
        }
    }

    /// Capacity minus assigned routes; negative when overfull.
    pub fn remaining_cap(&self, orientation: Orientation) -> i64 {
        i64::from(self.capacity(orientation)) - i64::from(self.route_count(orientation))
    }
}

/// A route's physical track within one tile.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RouteSlot {
    /// Offset from the tile's top (horizontal) or left (vertical) edge.
    pub index: u32,
    pub from: Point,
    pub to: Point,
}

/// A component rectangle together with its directly-adjacent tile per edge.
#[derive(Clone, Copy, Debug)]
pub struct PlacedComponent {
    pub rect: Rect,
    pub top: Option<TileKey>,
    pub bottom: Option<TileKey>,
    pub left: Option<TileKey>,
    pub right: Option<TileKey>,
}

impl PlacedComponent {
    pub fn tile(&self, edge: Edge) -> Option<TileKey> {
        match edge {
            Edge::Top => self.top,
            Edge::Bottom => self.bottom,
            Edge::Left => self.left,
            Edge::Right => self.right,
        }
    }
}

/// Input to the routing graph: an enclosing chip rectangle with its top-left
/// corner at the origin, and the placed component rectangles.
#[derive(Clone, Debug, Default)]
pub struct Placement {
    pub chip: Rect,
    pub components: Vec<Rect>,
}

/// The tiles surrounding each corner point, used to stitch adjacency.
#[derive(Default, Clone, Copy, Debug)]
struct TileGroup {
    top_left: Option<TileKey>,
    top_right: Option<TileKey>,
    bottom_left: Option<TileKey>,
    bottom_right: Option<TileKey>,
}

impl TileGroup {
    fn set(&mut self, corner: Corner, tile: TileKey) {
        match corner {
            Corner::TopLeft => self.top_left = Some(tile),
            Corner::TopRight => self.top_right = Some(tile),
            Corner::BottomLeft => self.bottom_left = Some(tile),
            Corner::BottomRight => self.bottom_right = Some(tile),
        }
    }

    /// Makes the tiles at the four quadrants of this corner point aware of
    /// each other.
    fn connect(&self, tiles: &mut SlotMap<TileKey, RoutingTile>) {
        if let Some(tl) = self.top_left {
            tiles[tl].set_neighbor(Edge::Bottom, self.bottom_left);
            tiles[tl].set_neighbor(Edge::Right, self.top_right);
        }
        if let Some(tr) = self.top_right {
            tiles[tr].set_neighbor(Edge::Left, self.top_left);
            tiles[tr].set_neighbor(Edge::Bottom, self.bottom_right);
        }
        if let Some(bl) = self.bottom_left {
            tiles[bl].set_neighbor(Edge::Top, self.top_left);
            tiles[bl].set_neighbor(Edge::Right, self.bottom_right);
        }
        if let Some(br) = self.bottom_right {
            tiles[br].set_neighbor(Edge::Left, self.bottom_left);
            tiles[br].set_neighbor(Edge::Top, self.top_right);
        }
    }
}

/// The routing tile graph.
#[derive(Debug, Default)]
pub struct RoutingGraph {
    tiles: SlotMap<TileKey, RoutingTile>,
    /// Tiles in id order.
    order: Vec<TileKey>,
    chip: Rect,
    components: Vec<PlacedComponent>,
}

impl RoutingGraph {
    /// Builds the tile graph for a placement with default capacities.
    pub fn build(placement: &Placement) -> Self {
        Self::build_with_config(placement, RoutingConfig::default())
    }

    pub fn build_with_config(placement: &Placement, config: RoutingConfig) -> Self {
        let chip = placement.chip;
        debug_assert_eq!(chip.top_left(), Point::new(0, 0), "Chip top-left sits at the origin");
        debug_assert!(
            placement.components.iter().all(|c| chip.contains_rect(c)),
            "All components lie within the chip"
        );

        // Horizontal and vertical bounding lines of every component.
        let mut hz_bounding = Vec::new();
        let mut vt_bounding = Vec::new();
        for rect in &placement.components {
            hz_bounding.push(rect.edge(Edge::Top));
            hz_bounding.push(rect.edge(Edge::Bottom));
            vt_bounding.push(rect.edge(Edge::Left));
            vt_bounding.push(rect.edge(Edge::Right));
        }

        // Edge extrusion: stretch each bounding line to the chip boundary,
        // then shorten from the endpoint closest to each crossing
        // perpendicular component edge. Identical tile-lines are
        // deduplicated.
        let mut hz_lines: Vec<Line> = Vec::new();
        for line in &hz_bounding {
            let y = line.p1().y;
            let mut stretched = Line::new(Point::new(chip.left(), y), Point::new(chip.right(), y));
            for crossing in &vt_bounding {
                if let Some(at) = stretched.intersect(crossing, IntersectType::Cross) {
                    if at.manhattan_distance(line.p1()) < at.manhattan_distance(line.p2()) {
                        stretched.set_p1(at);
                    } else {
                        stretched.set_p2(at);
                    }
                }
            }
            if !hz_lines.contains(&stretched) {
                hz_lines.push(stretched);
            }
        }
        let mut vt_lines: Vec<Line> = Vec::new();
        for line in &vt_bounding {
            let x = line.p1().x;
            let mut stretched = Line::new(Point::new(x, chip.top()), Point::new(x, chip.bottom()));
            for crossing in &hz_bounding {
                if let Some(at) = crossing.intersect(&stretched, IntersectType::Cross) {
                    if at.manhattan_distance(line.p1()) < at.manhattan_distance(line.p2()) {
                        stretched.set_p1(at);
                    } else {
                        stretched.set_p2(at);
                    }
                }
            }
            if !vt_lines.contains(&stretched) {
                vt_lines.push(stretched);
            }
        }

        // The chip boundary is a tile-line too.
        hz_lines.push(chip.edge(Edge::Top));
        hz_lines.push(chip.edge(Edge::Bottom));
        vt_lines.push(chip.edge(Edge::Left));
        vt_lines.push(chip.edge(Edge::Right));
        hz_lines.sort_by_key(|l| l.p1().y);
        vt_lines.sort_by_key(|l| l.p1().x);

        // Tile formation: scan horizontal lines top-to-bottom and vertical
        // lines left-to-right; every on-edge intersection is the bottom
        // corner of a candidate tile whose remaining corners lie on the
        // nearest intersecting tile-lines.
        let mut graph = RoutingGraph { chip, ..Default::default() };
        let mut groups: BTreeMap<Point, TileGroup> = BTreeMap::new();

        for hi in 1..hz_lines.len() {
            for vi in 1..vt_lines.len() {
                let hz = hz_lines[hi];
                let vt = vt_lines[vi];
                let Some(bottom) = hz.intersect(&vt, IntersectType::OnEdge) else {
                    continue;
                };

                // Locate the corner above the intersection.
                let Some((top_line, top)) = (0..hi).rev().find_map(|hi_rev| {
                    hz_lines[hi_rev]
                        .intersect(&vt, IntersectType::OnEdge)
                        .map(|p| (hz_lines[hi_rev], p))
                }) else {
                    continue;
                };

                let (bottom_left, bottom_right);
                if vt.p1().x == hz.p1().x {
                    // The bottom-left corner was found; the bottom-right is
                    // the next vertical line intersecting this one.
                    bottom_left = bottom;
                    let Some(br) = (vi + 1..vt_lines.len()).find_map(|vi_fwd| {
                        hz.intersect(&vt_lines[vi_fwd], IntersectType::OnEdge)
                    }) else {
                        continue;
                    };
                    bottom_right = br;
                } else {
                    // The bottom-right corner was found. If the top line
                    // terminates at this x, the candidate would pass through
                    // a component.
                    if top_line.p1().x == bottom.x {
                        continue;
                    }
                    bottom_right = bottom;
                    let Some(bl) = (0..vi).rev().find_map(|vi_rev| {
                        hz.intersect(&vt_lines[vi_rev], IntersectType::OnEdge)
                    }) else {
                        continue;
                    };
                    bottom_left = bl;
                }

                let top_left = Point::new(bottom_left.x, top.y);
                let rect = Rect::from_corners(top_left, bottom_right);
                if rect.w <= 0 || rect.h <= 0 {
                    continue;
                }
                // Tiles coinciding with a component rectangle are not
                // routing area.
                if placement.components.contains(&rect) {
                    continue;
                }

                let tile = graph.tile_at(rect).unwrap_or_else(|| {
                    let id = graph.order.len() as u32;
                    let key = graph.tiles.insert(RoutingTile::new(id, rect, config));
                    graph.order.push(key);
                    key
                });

                groups.entry(rect.top_left()).or_default().set(Corner::BottomRight, tile);
                groups.entry(rect.bottom_left()).or_default().set(Corner::TopRight, tile);
                groups.entry(rect.top_right()).or_default().set(Corner::BottomLeft, tile);
                groups.entry(rect.bottom_right()).or_default().set(Corner::TopLeft, tile);
            }
        }

        // Adjacency: tiles sharing a corner become neighbors across it.
        for group in groups.values() {
            group.connect(&mut graph.tiles);
        }

        // Component-to-tile association through the same corner map.
        graph.components = placement
            .components
            .iter()
            .map(|&rect| {
                let at = |p: Point| groups.get(&p).copied().unwrap_or_default();
                PlacedComponent {
                    rect,
                    top: at(rect.top_left()).top_right,
                    left: at(rect.top_left()).bottom_left,
                    right: at(rect.top_right()).bottom_right,
                    bottom: at(rect.bottom_left()).bottom_right,
                }
            })
            .collect();

        graph
    }

    pub fn chip(&self) -> Rect {
        self.chip
    }

    pub fn tile(&self, key: TileKey) -> &RoutingTile {
        &self.tiles[key]
    }

    /// Tiles in id order.
    pub fn tiles(&self) -> impl Iterator<Item = (TileKey, &RoutingTile)> {
        self.order.iter().map(|&k| (k, &self.tiles[k]))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The tile occupying exactly `rect`, if one exists.
    pub fn tile_at(&self, rect: Rect) -> Option<TileKey> {
        self.order.iter().copied().find(|&k| self.tiles[k].rect == rect)
    }

    pub fn components(&self) -> &[PlacedComponent] {
        &self.components
    }

    pub fn component(&self, rect: Rect) -> Option<&PlacedComponent> {
        self.components.iter().find(|c| c.rect == rect)
    }

    /// Registers one route crossing `tile` in the given orientation.
    pub fn register_route(&mut self, tile: TileKey, orientation: Orientation) {
        match orientation {
            Orientation::Horizontal => self.tiles[tile].h_routes += 1,
            Orientation::Vertical => self.tiles[tile].v_routes += 1,
        }
    }

    /// Evenly spaced track positions for the routes registered in `tile`:
    /// `index = round(k · capacity / (n + 1))` for `k = 1..=n`. Horizontal
    /// tracks run from the left to the right tile edge at the indexed
    /// offset below the top edge; vertical tracks analogously.
    pub fn route_slots(&self, tile: TileKey, orientation: Orientation) -> Vec<RouteSlot> {
        let tile = &self.tiles[tile];
        let n = tile.route_count(orientation);
        let cap = f64::from(tile.capacity(orientation));
        (1..=n)
            .map(|k| {
                let index = (f64::from(k) * cap / f64::from(n + 1)).round() as u32;
                let offset = index as i32;
                let (from, to) = match orientation {
                    Orientation::Horizontal => (
                        tile.rect.top_left().offset(0, offset),
                        tile.rect.top_right().offset(0, offset),
                    ),
                    Orientation::Vertical => (
                        tile.rect.top_left().offset(offset, 0),
                        tile.rect.bottom_left().offset(offset, 0),
                    ),
                };
                RouteSlot { index, from, to }
            })
            .collect()
    }

    /// Finds a path of adjacent tiles from `start` to `goal` (A* over the
    /// adjacency graph, manhattan distance between tile centers as the
    /// heuristic) and registers the route with every tile it leaves.
    pub fn find_route(&mut self, start: TileKey, goal: TileKey) -> Option<Vec<TileKey>> {
        let mut open: BTreeSet<TileKey> = BTreeSet::from([start]);
        let mut came_from: BTreeMap<TileKey, TileKey> = BTreeMap::new();
        let mut g_score: BTreeMap<TileKey, i32> = BTreeMap::from([(start, 0)]);
        let heuristic = |graph: &Self, a: TileKey, b: TileKey| {
            graph.tiles[a].rect.center().manhattan_distance(graph.tiles[b].rect.center())
        };
        let mut f_score: BTreeMap<TileKey, i32> =
            BTreeMap::from([(start, heuristic(self, start, goal))]);

        while let Some(&current) = open
            .iter()
            .min_by_key(|&&k| f_score.get(&k).copied().unwrap_or(i32::MAX))
        {
            if current == goal {
                return Some(self.reconstruct_route(&came_from, current));
            }
            open.remove(&current);

            for neighbor in self.tiles[current].adjacent().collect::<Vec<_>>() {
                let tentative = g_score
                    .get(&current)
                    .copied()
                    .unwrap_or(i32::MAX)
                    .saturating_add(heuristic(self, current, neighbor));
                if tentative < g_score.get(&neighbor).copied().unwrap_or(i32::MAX) {
                    came_from.insert(neighbor, current);
                    g_score.insert(neighbor, tentative);
                    f_score.insert(neighbor, tentative + heuristic(self, neighbor, goal));
                    open.insert(neighbor);
                }
            }
        }
        None
    }

    fn reconstruct_route(
        &mut self,
        came_from: &BTreeMap<TileKey, TileKey>,
        mut current: TileKey,
    ) -> Vec<TileKey> {
        let mut path = vec![current];
        while let Some(&previous) = came_from.get(&current) {
            // The tile being left tracks the route, in the orientation of
            // the move.
            let diff_x =
                self.tiles[previous].rect.center().x - self.tiles[current].rect.center().x;
            let orientation = if diff_x == 0 {
                Orientation::Vertical
            } else {
                Orientation::Horizontal
            };
            self.register_route(previous, orientation);
            current = previous;
            path.insert(0, current);
        }
        path
    }

    /// Expands tiles to make room for their routes: per row (resp. column),
    /// every tile takes the row's maximum of (route count, dimension) plus
    /// one, and positions are re-laid by a DFS from the north-west tile.
    /// Sizes and positions change; ids and adjacency do not. The chip
    /// rectangle grows to the bounding box of the expanded tiles.
    pub fn expand_tiles(&mut self) {
        let mut rows: BTreeMap<i32, Vec<TileKey>> = BTreeMap::new();
        let mut cols: BTreeMap<i32, Vec<TileKey>> = BTreeMap::new();
        for &key in &self.order {
            rows.entry(self.tiles[key].rect.y).or_default().push(key);
            cols.entry(self.tiles[key].rect.x).or_default().push(key);
        }

        let start = self.tile_at_point(self.chip.top_left());

        for row in rows.values() {
            let target = row
                .iter()
                .map(|&k| self.tiles[k].h_routes.max(self.tiles[k].rect.h as u32))
                .max()
                .unwrap_or(0)
                + 1;
            for &k in row {
                self.tiles[k].rect.h = target as i32;
            }
        }
        for col in cols.values() {
            let target = col
                .iter()
                .map(|&k| self.tiles[k].v_routes.max(self.tiles[k].rect.w as u32))
                .max()
                .unwrap_or(0)
                + 1;
            for &k in col {
                self.tiles[k].rect.w = target as i32;
            }
        }

        // Re-lay positions from the north-west tile outward.
        let Some(start) = start else { return };
        let mut placed: BTreeSet<TileKey> = BTreeSet::from([start]);
        let mut stack = vec![start];
        self.tiles[start].rect.x = self.chip.x;
        self.tiles[start].rect.y = self.chip.y;
        while let Some(key) = stack.pop() {
            let rect = self.tiles[key].rect;
            for edge in [Edge::Right, Edge::Bottom, Edge::Left, Edge::Top] {
                let Some(neighbor) = self.tiles[key].neighbor(edge) else { continue };
                if !placed.insert(neighbor) {
                    continue;
                }
                let size = self.tiles[neighbor].rect;
                let pos = match edge {
                    Edge::Right => Point::new(rect.right(), rect.y),
                    Edge::Bottom => Point::new(rect.x, rect.bottom()),
                    Edge::Left => Point::new(rect.x - size.w, rect.y),
                    Edge::Top => Point::new(rect.x, rect.y - size.h),
                };
                self.tiles[neighbor].rect.x = pos.x;
                self.tiles[neighbor].rect.y = pos.y;
                stack.push(neighbor);
            }
        }

        self.chip = self
            .order
            .iter()
            .map(|&k| self.tiles[k].rect)
            .reduce(|a, b| a.union(&b))
            .unwrap_or(self.chip);
    }

    /// The tile whose rectangle starts at `p`.
    fn tile_at_point(&self, p: Point) -> Option<TileKey> {
        self.order.iter().copied().find(|&k| self.tiles[k].rect.top_left() == p)
    }
}
