//! Geometric post-processing for the visual layer.
//!
//! Given placed component rectangles inside a chip rectangle, [`routing`]
//! derives the tile graph the wire renderer routes through. Everything here
//! is a pure function of the input rectangles; the simulation engine never
//! depends on it.

pub use geometry::{Corner, Edge, IntersectType, Line, Orientation, Point, Rect};
pub use routing::{
    Placement, PlacedComponent, RouteSlot, RoutingConfig, RoutingGraph, RoutingTile, TileKey,
};

pub mod geometry;
pub mod routing;
