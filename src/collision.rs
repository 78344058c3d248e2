use tracing::{debug, warn};

pub const MAX_ITERATIONS: usize = 50;

/// A node's footprint on the canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rectangle {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub owner_id: String,
}

impl Rectangle {
    pub fn new(owner_id: impl Into<String>, x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            owner_id: owner_id.into(),
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn center_x(&self) -> i32 {
        self.x + self.width / 2
    }

    pub fn center_y(&self) -> i32 {
        self.y + self.height / 2
    }

    pub fn overlaps_with(&self, other: &Rectangle) -> bool {
        !(self.right() <= other.x
            || other.right() <= self.x
            || self.bottom() <= other.y
            || other.bottom() <= self.y)
    }

    /// Euclidean distance between centres.
    pub fn distance_to(&self, other: &Rectangle) -> f64 {
        let dx = f64::from(self.center_x() - other.center_x());
        let dy = f64::from(self.center_y() - other.center_y());
        dx.hypot(dy)
    }

    /// Empty cells between the two rectangles along each axis, 0 when they
    /// touch or overlap on that axis.
    fn gap_to(&self, other: &Rectangle) -> (i32, i32) {
        let dx = (self.x - other.right()).max(other.x - self.right()).max(0);
        let dy = (self.y - other.bottom()).max(other.y - self.bottom()).max(0);
        (dx, dy)
    }
}

/// Separates rectangles that overlap or sit closer than `min_spacing`,
/// keeping every rectangle inside the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionResolver {
    pub canvas_width: i32,
    pub canvas_height: i32,
    pub min_spacing: i32,
}

impl CollisionResolver {
    pub fn new(canvas_width: i32, canvas_height: i32, min_spacing: i32) -> Self {
        Self {
            canvas_width,
            canvas_height,
            min_spacing,
        }
    }

    pub fn too_close(&self, a: &Rectangle, b: &Rectangle) -> bool {
        if a.overlaps_with(b) {
            return true;
        }
        let (dx, dy) = a.gap_to(b);
        dx < self.min_spacing && dy < self.min_spacing
    }

    /// Pairwise relaxation, at most `MAX_ITERATIONS` passes. Residual
    /// violations after the last pass are logged and returned as is.
    pub fn resolve(&self, rectangles: &[Rectangle]) -> Vec<Rectangle> {
        let mut rects = rectangles.to_vec();
        if rects.len() <= 1 {
            return rects;
        }

        for iteration in 0..MAX_ITERATIONS {
            let mut moved = false;

            for i in 0..rects.len() {
                for j in (i + 1)..rects.len() {
                    if !self.too_close(&rects[i], &rects[j]) {
                        continue;
                    }
                    moved = true;

                    let (head, tail) = rects.split_at_mut(j);
                    let (a, b) = (&mut head[i], &mut tail[0]);
                    self.separate(a, b);
                    self.clamp(a);
                    self.clamp(b);
                }
            }

            if !moved {
                debug!(iterations = iteration + 1, "collisions resolved");
                return rects;
            }
        }

        let remaining = self.violations(&rects);
        if remaining > 0 {
            warn!(remaining, "collision resolution hit the iteration cap");
        }
        rects
    }

    fn violations(&self, rects: &[Rectangle]) -> usize {
        let mut count = 0;
        for i in 0..rects.len() {
            for j in (i + 1)..rects.len() {
                if self.too_close(&rects[i], &rects[j]) {
                    count += 1;
                }
            }
        }
        count
    }

    /// Push `a` and `b` apart along the axis needing the smaller correction.
    fn separate(&self, a: &mut Rectangle, b: &mut Rectangle) {
        let overlap_x = a.right().min(b.right()) - a.x.max(b.x) + self.min_spacing;
        let overlap_y = a.bottom().min(b.bottom()) - a.y.max(b.y) + self.min_spacing;

        if overlap_x <= overlap_y {
            let step = half_up(overlap_x);
            if a.center_x() < b.center_x() {
                a.x -= step;
                b.x += step;
            } else {
                a.x += step;
                b.x -= step;
            }
        } else {
            let step = half_up(overlap_y);
            if a.center_y() < b.center_y() {
                a.y -= step;
                b.y += step;
            } else {
                a.y += step;
                b.y -= step;
            }
        }
    }

    fn clamp(&self, rect: &mut Rectangle) {
        rect.x = rect.x.max(0);
        rect.y = rect.y.max(0);
        if rect.right() > self.canvas_width {
            rect.x = (self.canvas_width - rect.width).max(0);
        }
        if rect.bottom() > self.canvas_height {
            rect.y = (self.canvas_height - rect.height).max(0);
        }
    }

    /// Columns and rows of the fallback grid for `count` rectangles.
    pub fn grid_shape(count: usize) -> (usize, usize) {
        if count == 0 {
            return (0, 0);
        }
        let mut cols = 1;
        while cols * cols < count {
            cols += 1;
        }
        (cols, count.div_ceil(cols))
    }

    /// Fallback placement: rectangles fill a square-ish grid row by row,
    /// each centred in its cell.
    pub fn arrange_in_grid(&self, rectangles: &[Rectangle]) -> Vec<Rectangle> {
        let (cols, rows) = Self::grid_shape(rectangles.len());
        if cols == 0 {
            return Vec::new();
        }
        let cell_width = self.canvas_width / cols as i32;
        let cell_height = self.canvas_height / rows as i32;

        rectangles
            .iter()
            .enumerate()
            .map(|(i, rect)| {
                let (row, col) = ((i / cols) as i32, (i % cols) as i32);
                let x = col * cell_width + (cell_width - rect.width) / 2;
                let y = row * cell_height + (cell_height - rect.height) / 2;
                Rectangle {
                    x: x.min(self.canvas_width - rect.width).max(0),
                    y: y.min(self.canvas_height - rect.height).max(0),
                    ..rect.clone()
                }
            })
            .collect()
    }
}

fn half_up(n: i32) -> i32 {
    (n + 1) / 2
}
