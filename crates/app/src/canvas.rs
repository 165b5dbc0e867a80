//! Minimal software raster so the CLI can produce real images without a
//! graphics backend. Blur and antialiasing flags are accepted and ignored.

use std::io::{self, Write};

use spectrum_visualiser_core::render::PathCommand;
use spectrum_visualiser_core::{Canvas, Color, Paint, PaintStyle, Path, Point, Rect};

/// Segments used to flatten each Bezier curve.
const CURVE_STEPS: usize = 12;

pub struct PixelCanvas {
    width: usize,
    height: usize,
    pixels: Vec<[u8; 3]>,
    /// Scratch polygon reused by path filling.
    polygon: Vec<Point>,
}

impl PixelCanvas {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0; 3]; width * height],
            polygon: Vec::new(),
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 3]> {
        (x < self.width && y < self.height).then(|| self.pixels[y * self.width + x])
    }

    /// Number of pixels that are not pure black.
    pub fn lit_pixels(&self) -> usize {
        self.pixels.iter().filter(|p| **p != [0; 3]).count()
    }

    /// Writes the frame as a binary PPM (P6).
    pub fn write_ppm(&self, mut out: impl Write) -> io::Result<()> {
        write!(out, "P6\n{} {}\n255\n", self.width, self.height)?;
        for pixel in &self.pixels {
            out.write_all(pixel)?;
        }
        out.flush()
    }

    fn blend(&mut self, x: isize, y: isize, color: Color) {
        if x < 0 || y < 0 || x >= self.width as isize || y >= self.height as isize {
            return;
        }
        let dst = &mut self.pixels[y as usize * self.width + x as usize];
        let a = color.a as u32;
        let mix = |d: u8, s: u8| ((s as u32 * a + d as u32 * (255 - a)) / 255) as u8;
        *dst = [mix(dst[0], color.r), mix(dst[1], color.g), mix(dst[2], color.b)];
    }

    fn color_at(paint: &Paint, x: f32, y: f32) -> Color {
        let Some(gradient) = paint.gradient.as_ref().filter(|g| g.stops.len() >= 2) else {
            return paint.color;
        };
        let (dx, dy) = (gradient.end.x - gradient.start.x, gradient.end.y - gradient.start.y);
        let length = dx * dx + dy * dy;
        let t = if length > 0.0 {
            ((x - gradient.start.x) * dx + (y - gradient.start.y) * dy) / length
        } else {
            0.0
        };
        let (_, from) = gradient.stops[0];
        let (_, to) = gradient.stops[gradient.stops.len() - 1];
        from.lerp(to, t)
    }

    fn fill_span(&mut self, y: isize, x0: f32, x1: f32, paint: &Paint) {
        let start = x0.round().max(0.0) as isize;
        let end = x1.round().min(self.width as f32) as isize;
        for x in start..end {
            let color = Self::color_at(paint, x as f32, y as f32);
            self.blend(x, y, color);
        }
    }

    /// Bresenham line with a square brush for wider strokes.
    fn line(&mut self, from: Point, to: Point, paint: &Paint) {
        let brush = (paint.stroke_width.round() as isize).max(1);
        let half = brush / 2;
        let (mut x, mut y) = (from.x.round() as isize, from.y.round() as isize);
        let (x2, y2) = (to.x.round() as isize, to.y.round() as isize);
        let dx = (x2 - x).abs();
        let dy = -(y2 - y).abs();
        let sx = if x < x2 { 1 } else { -1 };
        let sy = if y < y2 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            let color = Self::color_at(paint, x as f32, y as f32);
            for by in 0..brush {
                for bx in 0..brush {
                    self.blend(x + bx - half, y + by - half, color);
                }
            }
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
    }

    /// Flattens `path` into `polygon` and returns the index ranges of its
    /// subpaths along with whether each was closed.
    fn flatten(path: &Path, polygon: &mut Vec<Point>) -> Vec<(usize, usize, bool)> {
        polygon.clear();
        let mut subpaths = Vec::new();
        let mut start = 0;
        let mut closed = false;
        let mut current = Point::default();

        for command in path.commands() {
            match *command {
                PathCommand::MoveTo(p) => {
                    if polygon.len() > start {
                        subpaths.push((start, polygon.len(), closed));
                    }
                    start = polygon.len();
                    closed = false;
                    polygon.push(p);
                    current = p;
                }
                PathCommand::LineTo(p) => {
                    polygon.push(p);
                    current = p;
                }
                PathCommand::QuadTo(c, p) => {
                    for i in 1..=CURVE_STEPS {
                        let t = i as f32 / CURVE_STEPS as f32;
                        let u = 1.0 - t;
                        polygon.push(Point::new(
                            u * u * current.x + 2.0 * u * t * c.x + t * t * p.x,
                            u * u * current.y + 2.0 * u * t * c.y + t * t * p.y,
                        ));
                    }
                    current = p;
                }
                PathCommand::CubicTo(c1, c2, p) => {
                    for i in 1..=CURVE_STEPS {
                        let t = i as f32 / CURVE_STEPS as f32;
                        let u = 1.0 - t;
                        let (a, b, c, d) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
                        polygon.push(Point::new(
                            a * current.x + b * c1.x + c * c2.x + d * p.x,
                            a * current.y + b * c1.y + c * c2.y + d * p.y,
                        ));
                    }
                    current = p;
                }
                PathCommand::Close => closed = true,
            }
        }
        if polygon.len() > start {
            subpaths.push((start, polygon.len(), closed));
        }
        subpaths
    }

    /// Even-odd scanline fill over every subpath at once.
    fn fill_polygon(&mut self, points: &[Point], subpaths: &[(usize, usize, bool)], paint: &Paint) {
        let Some(bounds) = polygon_bounds(points) else {
            return;
        };
        let top = bounds.top.floor().max(0.0) as isize;
        let bottom = bounds.bottom.ceil().min(self.height as f32) as isize;
        let mut crossings = Vec::new();

        for y in top..bottom {
            let scan = y as f32 + 0.5;
            crossings.clear();
            for &(start, end, _) in subpaths {
                let ring = &points[start..end];
                for (i, a) in ring.iter().enumerate() {
                    let b = ring[(i + 1) % ring.len()];
                    if (a.y <= scan) != (b.y <= scan) {
                        crossings.push(a.x + (scan - a.y) / (b.y - a.y) * (b.x - a.x));
                    }
                }
            }
            crossings.sort_by(f32::total_cmp);
            for pair in crossings.chunks_exact(2) {
                self.fill_span(y, pair[0], pair[1], paint);
            }
        }
    }
}

fn polygon_bounds(points: &[Point]) -> Option<Rect> {
    let first = points.first()?;
    Some(points.iter().fold(Rect::new(first.x, first.y, first.x, first.y), |r, p| {
        Rect::new(r.left.min(p.x), r.top.min(p.y), r.right.max(p.x), r.bottom.max(p.y))
    }))
}

impl Canvas for PixelCanvas {
    fn width(&self) -> f32 {
        self.width as f32
    }

    fn height(&self) -> f32 {
        self.height as f32
    }

    fn clear(&mut self, color: Color) {
        self.pixels.fill([color.r, color.g, color.b]);
    }

    fn draw_rect(&mut self, rect: Rect, paint: &Paint) {
        match paint.style {
            PaintStyle::Fill => {
                let top = rect.top.round().max(0.0) as isize;
                let bottom = rect.bottom.round().min(self.height as f32) as isize;
                for y in top..bottom {
                    self.fill_span(y, rect.left, rect.right, paint);
                }
            }
            PaintStyle::Stroke => {
                let corners = [
                    Point::new(rect.left, rect.top),
                    Point::new(rect.right, rect.top),
                    Point::new(rect.right, rect.bottom),
                    Point::new(rect.left, rect.bottom),
                ];
                for i in 0..4 {
                    self.line(corners[i], corners[(i + 1) % 4], paint);
                }
            }
        }
    }

    fn draw_circle(&mut self, center: Point, radius: f32, paint: &Paint) {
        if radius <= 0.0 {
            return;
        }
        match paint.style {
            PaintStyle::Fill => {
                let top = (center.y - radius).floor() as isize;
                let bottom = (center.y + radius).ceil() as isize;
                for y in top..=bottom {
                    let dy = y as f32 + 0.5 - center.y;
                    let span = radius * radius - dy * dy;
                    if span > 0.0 {
                        let half = span.sqrt();
                        self.fill_span(y, center.x - half, center.x + half, paint);
                    }
                }
            }
            PaintStyle::Stroke => {
                let steps = ((radius * std::f32::consts::TAU) as usize).clamp(8, 720);
                let mut previous = Point::new(center.x + radius, center.y);
                for i in 1..=steps {
                    let angle = i as f32 / steps as f32 * std::f32::consts::TAU;
                    let next = center.polar(angle, radius);
                    self.line(previous, next, paint);
                    previous = next;
                }
            }
        }
    }

    fn draw_line(&mut self, from: Point, to: Point, paint: &Paint) {
        self.line(from, to, paint);
    }

    fn draw_path(&mut self, path: &Path, paint: &Paint) {
        let mut polygon = std::mem::take(&mut self.polygon);
        let subpaths = Self::flatten(path, &mut polygon);

        match paint.style {
            PaintStyle::Fill => self.fill_polygon(&polygon, &subpaths, paint),
            PaintStyle::Stroke => {
                for &(start, end, closed) in &subpaths {
                    let ring = &polygon[start..end];
                    for pair in ring.windows(2) {
                        self.line(pair[0], pair[1], paint);
                    }
                    if closed && ring.len() > 2 {
                        self.line(ring[ring.len() - 1], ring[0], paint);
                    }
                }
            }
        }
        self.polygon = polygon;
    }

    /// Glyphs render as solid cells; there is no font here.
    fn draw_text(&mut self, text: &str, origin: Point, size: f32, paint: &Paint) {
        let advance = size * 0.6;
        let mut cell = Rect::new(
            origin.x,
            origin.y - size * 0.8,
            origin.x + advance * 0.8,
            origin.y,
        );
        let fill = Paint {
            style: PaintStyle::Fill,
            ..paint.clone()
        };
        for c in text.chars() {
            if !c.is_whitespace() {
                self.draw_rect(cell, &fill);
            }
            cell = Rect::new(cell.left + advance, cell.top, cell.right + advance, cell.bottom);
        }
    }

    fn displace_rows(&mut self, band: Rect, offset: f32) {
        let shift = offset.round() as isize;
        if shift == 0 {
            return;
        }
        let top = band.top.round().max(0.0) as usize;
        let bottom = (band.bottom.round().max(0.0) as usize).min(self.height);
        let width = self.width as isize;

        for y in top..bottom {
            let row = &mut self.pixels[y * self.width..(y + 1) * self.width];
            if shift.abs() >= width {
                row.fill([0; 3]);
            } else if shift > 0 {
                row.rotate_right(shift as usize);
                row[..shift as usize].fill([0; 3]);
            } else {
                let n = (-shift) as usize;
                row.rotate_left(n);
                let len = row.len();
                row[len - n..].fill([0; 3]);
            }
        }
    }
}
