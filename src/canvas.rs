use crate::display_width::{center_offset, char_width, display_width};

/// Fixed-size character grid. Coordinates are signed so callers can draw
/// partly off-canvas; writes outside the grid are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsciiCanvas {
    cells: Vec<Vec<char>>,
    width: usize,
    height: usize,
}

/// Filler for the second column of a wide character.
const WIDE_TAIL: char = '\0';

impl AsciiCanvas {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            cells: vec![vec![' '; width]; height],
            width,
            height,
        }
    }

    fn index(&self, x: i32, y: i32) -> Option<(usize, usize)> {
        let (x, y) = (usize::try_from(x).ok()?, usize::try_from(y).ok()?);
        (x < self.width && y < self.height).then_some((x, y))
    }

    pub fn get(&self, x: i32, y: i32) -> Option<char> {
        self.index(x, y).map(|(x, y)| self.cells[y][x])
    }

    pub fn set(&mut self, x: i32, y: i32, ch: char) {
        let Some((col, row)) = self.index(x, y) else {
            return;
        };
        // Overwriting half of a wide character blanks the other half.
        if self.cells[row][col] == WIDE_TAIL && col > 0 {
            self.cells[row][col - 1] = ' ';
        }
        if col + 1 < self.width && self.cells[row][col + 1] == WIDE_TAIL {
            self.cells[row][col + 1] = ' ';
        }
        self.cells[row][col] = ch;
    }

    /// Write `text` starting at (x, y), giving wide characters two columns.
    pub fn write_text(&mut self, x: i32, y: i32, text: &str) {
        let mut col = x;
        for ch in text.chars() {
            let w = char_width(ch) as i32;
            self.set(col, y, ch);
            for extra in 1..w {
                if let Some((c, r)) = self.index(col + extra, y) {
                    self.cells[r][c] = WIDE_TAIL;
                }
            }
            col += w;
        }
    }

    /// Blank a rectangle.
    pub fn clear_rect(&mut self, x: i32, y: i32, width: i32, height: i32) {
        for row in y..y + height {
            for col in x..x + width {
                self.set(col, row, ' ');
            }
        }
    }

    /// Bresenham line. Without `ch`, the stroke is picked from the slope.
    pub fn draw_line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, ch: Option<char>) {
        let ch = ch.unwrap_or_else(|| line_char(x2 - x1, y2 - y1));
        for (x, y) in bresenham(x1, y1, x2, y2) {
            self.set(x, y, ch);
        }
    }

    /// Outline a box and centre `text` on its middle row. The box is widened
    /// so the label always fits between the borders. Returns the final width.
    pub fn draw_box(&mut self, x: i32, y: i32, width: i32, height: i32, text: &str) -> i32 {
        let text_width = display_width(text) as i32;
        let width = if text.is_empty() {
            width
        } else {
            width.max(text_width + 2)
        };
        if width < 2 || height < 2 {
            return width;
        }

        let (right, bottom) = (x + width - 1, y + height - 1);
        for col in x + 1..right {
            self.set(col, y, '-');
            self.set(col, bottom, '-');
        }
        for row in y + 1..bottom {
            self.set(x, row, '|');
            self.set(right, row, '|');
        }
        for (cx, cy) in [(x, y), (right, y), (x, bottom), (right, bottom)] {
            self.set(cx, cy, '+');
        }

        if !text.is_empty() {
            self.write_text(x + center_offset(width as usize, text) as i32, y + height / 2, text);
        }
        width
    }

    /// Approximate ellipse outline made of `o` marks.
    pub fn draw_circle(&mut self, cx: i32, cy: i32, rx: i32, ry: i32) {
        let step = if rx.max(ry) > 6 { 5 } else { 10 };
        for deg in (0..360_i32).step_by(step) {
            let rad = f64::from(deg).to_radians();
            let x = cx + (f64::from(rx) * rad.cos()).round() as i32;
            let y = cy + (f64::from(ry) * rad.sin()).round() as i32;
            self.set(x, y, 'o');
        }
    }

    /// Diamond through the midpoints of a `width` x `height` box centred on (cx, cy).
    pub fn draw_diamond(&mut self, cx: i32, cy: i32, width: i32, height: i32) {
        let (hw, hh) = (width / 2, height / 2);
        let (top, right, bottom, left) = ((cx, cy - hh), (cx + hw, cy), (cx, cy + hh), (cx - hw, cy));
        for ((x1, y1), (x2, y2)) in [(top, right), (right, bottom), (bottom, left), (left, top)] {
            self.draw_line(x1, y1, x2, y2, None);
        }
    }

    /// Line from (x1, y1) to (x2, y2) with a head on the destination cell.
    pub fn draw_arrow(&mut self, x1: i32, y1: i32, x2: i32, y2: i32) {
        self.draw_arrow_with(x1, y1, x2, y2, None);
    }

    /// Like [`draw_arrow`](Self::draw_arrow) with an explicit stroke character.
    pub fn draw_arrow_with(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, stroke: Option<char>) {
        self.draw_line(x1, y1, x2, y2, stroke);
        self.set(x2, y2, arrow_head(x2 - x1, y2 - y1));
    }
}

impl std::fmt::Display for AsciiCanvas {
    /// Rows joined by newlines, untrimmed.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, row) in self.cells.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            for &ch in row.iter().filter(|&&ch| ch != WIDE_TAIL) {
                write!(f, "{ch}")?;
            }
        }
        Ok(())
    }
}

/// Stroke for a line with the given deltas.
pub fn line_char(dx: i32, dy: i32) -> char {
    if dx.abs() < 2 {
        '|'
    } else if dy.abs() < 2 {
        '-'
    } else if (dx > 0) == (dy > 0) {
        '\\'
    } else {
        '/'
    }
}

/// Head pointing along the dominant axis of motion.
pub fn arrow_head(dx: i32, dy: i32) -> char {
    if dx.abs() > dy.abs() {
        if dx > 0 { '>' } else { '<' }
    } else if dy < 0 {
        '^'
    } else {
        'v'
    }
}

/// Integer Bresenham walk, both endpoints included.
pub fn bresenham(x1: i32, y1: i32, x2: i32, y2: i32) -> Vec<(i32, i32)> {
    let dx = (x2 - x1).abs();
    let dy = -(y2 - y1).abs();
    let sx = if x1 < x2 { 1 } else { -1 };
    let sy = if y1 < y2 { 1 } else { -1 };

    let mut points = Vec::with_capacity((dx - dy) as usize + 1);
    let (mut x, mut y) = (x1, y1);
    let mut err = dx + dy;
    loop {
        points.push((x, y));
        if x == x2 && y == y2 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rows(canvas: &AsciiCanvas) -> Vec<String> {
        canvas.to_string().lines().map(str::to_string).collect()
    }

    #[test]
    fn new_canvas_is_blank() {
        let canvas = AsciiCanvas::new(3, 2);
        assert_eq!(canvas.to_string(), "   \n   ");
    }

    #[test]
    fn out_of_bounds_writes_are_ignored() {
        let mut canvas = AsciiCanvas::new(3, 2);
        canvas.set(-1, 0, 'x');
        canvas.set(0, -1, 'x');
        canvas.set(3, 0, 'x');
        canvas.set(0, 2, 'x');
        canvas.draw_line(-5, 1, 10, 1, None);
        assert_eq!(rows(&canvas), vec!["   ", "---"]);
        assert_eq!(canvas.get(5, 5), None);
    }

    #[test]
    fn box_widens_to_fit_text() {
        let mut canvas = AsciiCanvas::new(10, 3);
        let width = canvas.draw_box(0, 0, 3, 3, "hello");
        assert!(width >= 7);
        assert_eq!(rows(&canvas), vec!["+-----+   ", "|hello|   ", "+-----+   "]);
    }

    #[test]
    fn box_centres_text() {
        let mut canvas = AsciiCanvas::new(9, 3);
        canvas.draw_box(0, 0, 9, 3, "Start");
        assert_eq!(rows(&canvas), vec!["+-------+", "| Start |", "+-------+"]);
    }

    #[test]
    fn box_with_wide_text() {
        let mut canvas = AsciiCanvas::new(8, 3);
        canvas.draw_box(0, 0, 8, 3, "开始");
        assert_eq!(rows(&canvas), vec!["+------+", "| 开始 |", "+------+"]);
    }

    #[test]
    fn overwriting_wide_char_clears_its_tail() {
        let mut canvas = AsciiCanvas::new(4, 1);
        canvas.write_text(0, 0, "开");
        canvas.set(1, 0, '|');
        assert_eq!(canvas.to_string(), " |  ");
    }

    #[test]
    fn line_char_by_slope() {
        assert_eq!(line_char(0, 5), '|');
        assert_eq!(line_char(1, -5), '|');
        assert_eq!(line_char(5, 1), '-');
        assert_eq!(line_char(4, 4), '\\');
        assert_eq!(line_char(-4, -4), '\\');
        assert_eq!(line_char(4, -4), '/');
    }

    #[test]
    fn bresenham_diagonal() {
        assert_eq!(bresenham(0, 0, 3, 3), vec![(0, 0), (1, 1), (2, 2), (3, 3)]);
        assert_eq!(bresenham(2, 0, 0, 0), vec![(2, 0), (1, 0), (0, 0)]);
        assert_eq!(bresenham(1, 1, 1, 1), vec![(1, 1)]);
    }

    #[test]
    fn draw_diagonal_line() {
        let mut canvas = AsciiCanvas::new(3, 3);
        canvas.draw_line(0, 2, 2, 0, None);
        assert_eq!(rows(&canvas), vec!["  /", " / ", "/  "]);
    }

    #[test]
    fn arrow_heads() {
        let mut canvas = AsciiCanvas::new(5, 1);
        canvas.draw_arrow(0, 0, 4, 0);
        assert_eq!(canvas.to_string(), "---->");

        let mut canvas = AsciiCanvas::new(5, 1);
        canvas.draw_arrow(4, 0, 0, 0);
        assert_eq!(canvas.to_string(), "<----");

        let mut canvas = AsciiCanvas::new(1, 3);
        canvas.draw_arrow(0, 0, 0, 2);
        assert_eq!(rows(&canvas), vec!["|", "|", "v"]);

        let mut canvas = AsciiCanvas::new(1, 3);
        canvas.draw_arrow_with(0, 2, 0, 0, Some(':'));
        assert_eq!(rows(&canvas), vec!["^", ":", ":"]);
    }

    #[test]
    fn circle_marks_cardinal_points() {
        let mut canvas = AsciiCanvas::new(9, 5);
        canvas.draw_circle(4, 2, 4, 2);
        assert_eq!(canvas.get(8, 2), Some('o'));
        assert_eq!(canvas.get(0, 2), Some('o'));
        assert_eq!(canvas.get(4, 0), Some('o'));
        assert_eq!(canvas.get(4, 4), Some('o'));
        assert_eq!(canvas.get(4, 2), Some(' '));
    }

    #[test]
    fn diamond_outline() {
        let mut canvas = AsciiCanvas::new(5, 3);
        canvas.draw_diamond(2, 1, 4, 2);
        assert_eq!(canvas.get(2, 0), Some('-'));
        assert_eq!(canvas.get(0, 1), Some('-'));
        assert_eq!(canvas.get(4, 1), Some('-'));
        assert_eq!(canvas.get(2, 2), Some('-'));
    }

    #[test]
    fn clear_rect_blanks_cells() {
        let mut canvas = AsciiCanvas::new(3, 3);
        canvas.draw_line(0, 1, 2, 1, Some('#'));
        canvas.clear_rect(1, 0, 5, 5);
        assert_eq!(rows(&canvas), vec!["   ", "#  ", "   "]);
    }
}
