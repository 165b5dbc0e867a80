use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect};
use crate::quality::FilterLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Scales the existing alpha by `factor` in [0, 1].
    pub fn with_alpha(self, factor: f32) -> Self {
        let a = (self.a as f32 * factor.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }

    pub fn lerp(self, other: Color, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Self {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }

    /// Multiplies the colour channels, keeping alpha.
    pub fn shade(self, factor: f32) -> Self {
        let f = factor.max(0.0);
        let scale = |c: u8| (c as f32 * f).round().min(255.0) as u8;
        Self {
            r: scale(self.r),
            g: scale(self.g),
            b: scale(self.b),
            a: self.a,
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaintStyle {
    #[default]
    Fill,
    Stroke,
}

/// Linear gradient between two points.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Gradient {
    pub start: Point,
    pub end: Point,
    pub stops: Vec<(f32, Color)>,
}

/// Brush description handed to the graphics backend with every draw call.
#[derive(Debug, Clone, PartialEq)]
pub struct Paint {
    pub color: Color,
    pub style: PaintStyle,
    pub stroke_width: f32,
    pub antialias: bool,
    pub filter: FilterLevel,
    pub blur_radius: f32,
    pub gradient: Option<Gradient>,
}

impl Paint {
    pub fn fill(color: Color) -> Self {
        Self {
            color,
            ..Self::default()
        }
    }

    pub fn stroke(color: Color, width: f32) -> Self {
        Self {
            color,
            style: PaintStyle::Stroke,
            stroke_width: width,
            ..Self::default()
        }
    }

    /// Restores defaults while keeping the gradient stop allocation.
    pub fn reset(&mut self) {
        let stops = self.gradient.take().map(|mut g| {
            g.stops.clear();
            g.stops
        });
        *self = Self::default();
        if let Some(stops) = stops {
            self.gradient = Some(Gradient {
                stops,
                ..Gradient::default()
            });
        }
    }

    /// Sets a two-stop vertical/linear gradient, reusing stop storage.
    pub fn set_gradient(&mut self, start: Point, end: Point, from: Color, to: Color) {
        let gradient = self.gradient.get_or_insert_with(Gradient::default);
        gradient.start = start;
        gradient.end = end;
        gradient.stops.clear();
        gradient.stops.push((0.0, from));
        gradient.stops.push((1.0, to));
    }

    pub fn has_gradient(&self) -> bool {
        self.gradient.as_ref().is_some_and(|g| !g.stops.is_empty())
    }
}

impl Default for Paint {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            style: PaintStyle::Fill,
            stroke_width: 1.0,
            antialias: true,
            filter: FilterLevel::None,
            blur_radius: 0.0,
            gradient: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    QuadTo(Point, Point),
    CubicTo(Point, Point, Point),
    Close,
}

/// Reusable vector path. `reset` keeps the command buffer's capacity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    commands: Vec<PathCommand>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(&mut self, p: Point) -> &mut Self {
        self.commands.push(PathCommand::MoveTo(p));
        self
    }

    pub fn line_to(&mut self, p: Point) -> &mut Self {
        self.commands.push(PathCommand::LineTo(p));
        self
    }

    pub fn quad_to(&mut self, control: Point, end: Point) -> &mut Self {
        self.commands.push(PathCommand::QuadTo(control, end));
        self
    }

    pub fn cubic_to(&mut self, c1: Point, c2: Point, end: Point) -> &mut Self {
        self.commands.push(PathCommand::CubicTo(c1, c2, end));
        self
    }

    pub fn close(&mut self) -> &mut Self {
        self.commands.push(PathCommand::Close);
        self
    }

    pub fn reset(&mut self) {
        self.commands.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    /// Bounding box of every point, control points included.
    pub fn bounds(&self) -> Option<Rect> {
        let mut points = self.commands.iter().flat_map(|command| {
            let pts: [Option<Point>; 3] = match *command {
                PathCommand::MoveTo(p) | PathCommand::LineTo(p) => [Some(p), None, None],
                PathCommand::QuadTo(c, p) => [Some(c), Some(p), None],
                PathCommand::CubicTo(a, b, p) => [Some(a), Some(b), Some(p)],
                PathCommand::Close => [None, None, None],
            };
            pts.into_iter().flatten()
        });

        let first = points.next()?;
        let init = Rect::new(first.x, first.y, first.x, first.y);
        Some(points.fold(init, |r, p| {
            Rect::new(r.left.min(p.x), r.top.min(p.y), r.right.max(p.x), r.bottom.max(p.y))
        }))
    }
}

/// Drawing surface supplied by the graphics backend.
pub trait Canvas {
    fn width(&self) -> f32;
    fn height(&self) -> f32;

    fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width(), self.height())
    }

    fn clear(&mut self, color: Color);
    fn draw_rect(&mut self, rect: Rect, paint: &Paint);
    fn draw_circle(&mut self, center: Point, radius: f32, paint: &Paint);
    fn draw_line(&mut self, from: Point, to: Point, paint: &Paint);
    fn draw_path(&mut self, path: &Path, paint: &Paint);
    fn draw_text(&mut self, text: &str, origin: Point, size: f32, paint: &Paint);
    /// Shifts the already drawn pixels inside `band` horizontally by `offset`.
    fn displace_rows(&mut self, band: Rect, offset: f32);
}

/// A single call captured by [`RecordingCanvas`].
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear(Color),
    Rect { rect: Rect, paint: Paint },
    Circle { center: Point, radius: f32, paint: Paint },
    Line { from: Point, to: Point, paint: Paint },
    Path { path: Path, paint: Paint },
    Text { text: String, origin: Point, size: f32, paint: Paint },
    Displace { band: Rect, offset: f32 },
}

/// Canvas that records draw calls instead of rasterising them.
#[derive(Debug, Clone)]
pub struct RecordingCanvas {
    width: f32,
    height: f32,
    commands: Vec<DrawCommand>,
}

impl RecordingCanvas {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn count(&self, predicate: impl Fn(&DrawCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| predicate(c)).count()
    }
}

impl Canvas for RecordingCanvas {
    fn width(&self) -> f32 {
        self.width
    }

    fn height(&self) -> f32 {
        self.height
    }

    fn clear(&mut self, color: Color) {
        self.commands.push(DrawCommand::Clear(color));
    }

    fn draw_rect(&mut self, rect: Rect, paint: &Paint) {
        self.commands.push(DrawCommand::Rect {
            rect,
            paint: paint.clone(),
        });
    }

    fn draw_circle(&mut self, center: Point, radius: f32, paint: &Paint) {
        self.commands.push(DrawCommand::Circle {
            center,
            radius,
            paint: paint.clone(),
        });
    }

    fn draw_line(&mut self, from: Point, to: Point, paint: &Paint) {
        self.commands.push(DrawCommand::Line {
            from,
            to,
            paint: paint.clone(),
        });
    }

    fn draw_path(&mut self, path: &Path, paint: &Paint) {
        self.commands.push(DrawCommand::Path {
            path: path.clone(),
            paint: paint.clone(),
        });
    }

    fn draw_text(&mut self, text: &str, origin: Point, size: f32, paint: &Paint) {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            origin,
            size,
            paint: paint.clone(),
        });
    }

    fn displace_rows(&mut self, band: Rect, offset: f32) {
        self.commands.push(DrawCommand::Displace { band, offset });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paint_reset_keeps_gradient_capacity() {
        let mut paint = Paint::fill(Color::rgb(10, 20, 30));
        paint.set_gradient(Point::new(0.0, 0.0), Point::new(0.0, 10.0), Color::BLACK, Color::WHITE);
        let capacity = paint.gradient.as_ref().unwrap().stops.capacity();

        paint.reset();
        assert_eq!(paint.color, Color::WHITE);
        assert!(!paint.has_gradient());
        assert_eq!(paint.gradient.as_ref().unwrap().stops.capacity(), capacity);
    }

    #[test]
    fn path_bounds_cover_control_points() {
        let mut path = Path::new();
        path.move_to(Point::new(0.0, 10.0))
            .cubic_to(Point::new(5.0, -5.0), Point::new(8.0, 20.0), Point::new(10.0, 10.0))
            .close();

        assert_eq!(path.bounds(), Some(Rect::new(0.0, -5.0, 10.0, 20.0)));
        path.reset();
        assert_eq!(path.bounds(), None);
    }

    #[test]
    fn colour_helpers() {
        assert_eq!(Color::WHITE.with_alpha(0.5).a, 128);
        assert_eq!(Color::BLACK.lerp(Color::WHITE, 0.5).r, 128);
        assert_eq!(Color::rgb(100, 200, 250).shade(2.0), Color::rgb(200, 255, 255));
    }

    #[test]
    fn recording_canvas_captures_calls() {
        let mut canvas = RecordingCanvas::new(100.0, 50.0);
        canvas.draw_rect(Rect::new(0.0, 0.0, 1.0, 1.0), &Paint::default());
        canvas.displace_rows(Rect::new(0.0, 0.0, 100.0, 4.0), 3.0);

        assert_eq!(canvas.bounds(), Rect::new(0.0, 0.0, 100.0, 50.0));
        assert_eq!(canvas.count(|c| matches!(c, DrawCommand::Displace { .. })), 1);
    }
}
