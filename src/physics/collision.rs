//! Axis-aligned collision against the flattened world grid
//!
//! Positions and sizes are in pixels; the grid is in blocks of
//! `TILE_SIZE` pixels. Movement is resolved one axis at a time, x then y,
//! and split into sub-steps of at most half a tile so fast bodies cannot
//! skip over a one-block wall.

use glam::{IVec2, Vec2};

use crate::constants::*;
use crate::world::grid::WorldGrid;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    /// Top-left corner in world pixels.
    pub position: Vec2,
    pub size: IVec2,
    /// Pixels per tick.
    pub velocity: Vec2,
    pub on_ground: bool,
    /// World block of grid cell (0, 0) at the last resolve.
    pub grid_offset: IVec2,
}

impl Aabb {
    pub fn new(position: Vec2, size: IVec2) -> Self {
        Aabb {
            position,
            size,
            velocity: Vec2::ZERO,
            on_ground: false,
            grid_offset: IVec2::ZERO,
        }
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn min(&self) -> Vec2 {
        self.position
    }

    pub fn max(&self) -> Vec2 {
        self.position + self.size.as_vec2()
    }

    /// Inclusive range of block columns the box overlaps. Touching an edge
    /// does not count as overlap.
    pub fn block_columns(&self) -> (i32, i32) {
        tile_span(self.position.x, self.size.x as f32)
    }

    pub fn block_rows(&self) -> (i32, i32) {
        tile_span(self.position.y, self.size.y as f32)
    }

    /// True if the box overlaps world block `(block_x, block_y)`.
    pub fn intersects_block(&self, block_x: i32, block_y: i32) -> bool {
        let tile = TILE_SIZE as f32;
        let (bx, by) = (block_x as f32 * tile, block_y as f32 * tile);
        let (min, max) = (self.min(), self.max());
        min.x < bx + tile && max.x > bx && min.y < by + tile && max.y > by
    }
}

fn tile_span(start: f32, extent: f32) -> (i32, i32) {
    let tile = TILE_SIZE as f32;
    let first = (start / tile).floor() as i32;
    let last = ((start + extent) / tile).ceil() as i32 - 1;
    (first, last.max(first))
}

/// Nonzero cells are solid; anything outside the grid is open.
pub fn is_solid(grid: &WorldGrid, x: i32, y: i32) -> bool {
    grid.get(x, y).is_some_and(|cell| cell != 0)
}

fn solid_at_block(grid: &WorldGrid, block_x: i32, block_y: i32) -> bool {
    is_solid(grid, block_x - grid.offset_x(), block_y - grid.offset_y())
}

/// Move `aabb` by its velocity, stopping at solid cells.
pub fn resolve(aabb: &mut Aabb, grid: &WorldGrid) {
    aabb.grid_offset = IVec2::new(grid.offset_x(), grid.offset_y());
    resolve_horizontal(aabb, grid);
    aabb.on_ground = false;
    resolve_vertical(aabb, grid);
    snap_to_ground(aabb, grid);
}

fn sub_steps(velocity: f32) -> (i32, f32) {
    let half_tile = TILE_SIZE as f32 * 0.5;
    let steps = ((velocity.abs() / half_tile).ceil() as i32).max(1);
    (steps, velocity / steps as f32)
}

fn resolve_horizontal(aabb: &mut Aabb, grid: &WorldGrid) {
    if aabb.velocity.x == 0.0 {
        return;
    }
    let tile = TILE_SIZE as f32;
    let (steps, step) = sub_steps(aabb.velocity.x);

    for _ in 0..steps {
        aabb.position.x += step;
        let (x0, x1) = aabb.block_columns();
        let (y0, y1) = aabb.block_rows();
        let column_blocked = |x: i32| (y0..=y1).any(|y| solid_at_block(grid, x, y));

        let hit = if step > 0.0 {
            (x0..=x1).find(|&x| column_blocked(x))
        } else {
            (x0..=x1).rev().find(|&x| column_blocked(x))
        };

        if let Some(x) = hit {
            aabb.position.x = if step > 0.0 {
                x as f32 * tile - aabb.size.x as f32 - COLLISION_EPSILON
            } else {
                (x + 1) as f32 * tile + COLLISION_EPSILON
            };
            aabb.velocity.x = 0.0;
            return;
        }
    }
}

fn resolve_vertical(aabb: &mut Aabb, grid: &WorldGrid) {
    if aabb.velocity.y == 0.0 {
        return;
    }
    let tile = TILE_SIZE as f32;
    let (steps, step) = sub_steps(aabb.velocity.y);

    for _ in 0..steps {
        aabb.position.y += step;
        let (x0, x1) = aabb.block_columns();
        let (y0, y1) = aabb.block_rows();
        let row_blocked = |y: i32| (x0..=x1).any(|x| solid_at_block(grid, x, y));

        let hit = if step > 0.0 {
            (y0..=y1).find(|&y| row_blocked(y))
        } else {
            (y0..=y1).rev().find(|&y| row_blocked(y))
        };

        if let Some(y) = hit {
            if step > 0.0 {
                aabb.position.y = y as f32 * tile - aabb.size.y as f32 - COLLISION_EPSILON;
                aabb.on_ground = true;
            } else {
                aabb.position.y = (y + 1) as f32 * tile + COLLISION_EPSILON;
            }
            aabb.velocity.y = 0.0;
            return;
        }
    }
}

/// Settle a body resting just above a floor onto it, so standing still does
/// not alternate between grounded and airborne.
fn snap_to_ground(aabb: &mut Aabb, grid: &WorldGrid) {
    if aabb.on_ground || aabb.velocity.y < 0.0 {
        return;
    }
    let tile = TILE_SIZE as f32;
    let bottom = aabb.max().y;
    let floor_row = (bottom / tile).round() as i32;
    let gap = floor_row as f32 * tile - bottom;
    if !(0.0..=GROUND_SNAP_TOLERANCE).contains(&gap) {
        return;
    }

    let (x0, x1) = aabb.block_columns();
    if (x0..=x1).any(|x| solid_at_block(grid, x, floor_row)) {
        aabb.position.y = floor_row as f32 * tile - aabb.size.y as f32 - COLLISION_EPSILON;
        aabb.velocity.y = 0.0;
        aabb.on_ground = true;
    }
}
