//! Rotating, lit cube whose projection runs on a background thread.
//!
//! The render thread posts [`CubeRequest`]s into a one-slot channel and reads
//! whatever [`CubeSnapshot`] the worker last wrote into a triple buffer.
//! Neither side waits on the other; a slow projection just means the previous
//! snapshot is drawn again.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};
use triple_buffer::{triple_buffer, Input, Output};

use crate::config::VisualiserConfig;
use crate::geometry::{Point, Rect, Vec3};
use crate::quality::QualityChange;
use crate::timeline::Rotation;
use crate::Result;

use super::{Canvas, DrawResources, DrawStrategy, FrameContext, PaintStyle, StyleKind};

/// Camera distance used for the perspective divide.
const CAMERA_DISTANCE: f32 = 4.0;
const AMBIENT: f32 = 0.3;
const DIFFUSE: f32 = 0.7;
const SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

/// Per-axis share of the configured rotation speed.
const AXIS_RATES: [f32; 3] = [0.6, 1.0, 0.25];

const FACES: [[usize; 4]; 6] = [
    [0, 2, 6, 4],
    [1, 3, 7, 5],
    [0, 1, 5, 4],
    [2, 3, 7, 6],
    [0, 1, 3, 2],
    [4, 5, 7, 6],
];

/// Everything needed to project one frame of the cube.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubeRequest {
    /// Rotation around x, y and z in radians.
    pub angles: Vec3,
    pub center: Point,
    /// Half the edge length in pixels, before perspective.
    pub size: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedFace {
    /// Indices into [`CubeSnapshot::vertices`], in winding order.
    pub corners: [usize; 4],
    /// Mean view-space depth; larger is further away.
    pub depth: f32,
    /// Lambert term with ambient floor, in [0.3, 1.0].
    pub light: f32,
}

/// Immutable result of one projection.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeSnapshot {
    pub vertices: [Point; 8],
    /// Sorted far to near, so drawing in order paints hidden faces first.
    pub faces: Vec<ProjectedFace>,
    pub bounds: Rect,
}

/// Rotates, projects and depth-sorts the unit cube described by `request`.
pub fn project_cube(request: &CubeRequest) -> CubeSnapshot {
    let light_dir = Vec3::new(0.3, -0.5, -1.0).normalized();
    let Vec3 { x: ax, y: ay, z: az } = request.angles;

    let mut view = [Vec3::default(); 8];
    let mut vertices = [Point::default(); 8];
    for (i, (v, p)) in view.iter_mut().zip(vertices.iter_mut()).enumerate() {
        let corner = Vec3::new(
            if i & 1 == 0 { -1.0 } else { 1.0 },
            if i & 2 == 0 { -1.0 } else { 1.0 },
            if i & 4 == 0 { -1.0 } else { 1.0 },
        );
        *v = corner.rotate(ax, ay, az);
        let scale = request.size * CAMERA_DISTANCE / (CAMERA_DISTANCE + v.z);
        *p = Point::new(request.center.x + v.x * scale, request.center.y + v.y * scale);
    }

    let mut faces: Vec<ProjectedFace> = FACES
        .iter()
        .map(|&corners| {
            let sum = corners.iter().fold(Vec3::default(), |acc, &i| {
                Vec3::new(acc.x + view[i].x, acc.y + view[i].y, acc.z + view[i].z)
            });
            let centroid = Vec3::new(sum.x / 4.0, sum.y / 4.0, sum.z / 4.0);
            // The cube is centred on the origin, so the centroid is the normal.
            let normal = centroid.normalized();
            ProjectedFace {
                corners,
                depth: centroid.z,
                light: normal.dot(light_dir).max(0.0) * DIFFUSE + AMBIENT,
            }
        })
        .collect();
    faces.sort_by(|a, b| b.depth.total_cmp(&a.depth));

    let first = vertices[0];
    let bounds = vertices.iter().fold(Rect::new(first.x, first.y, first.x, first.y), |r, p| {
        Rect::new(r.left.min(p.x), r.top.min(p.y), r.right.max(p.x), r.bottom.max(p.y))
    });

    CubeSnapshot {
        vertices,
        faces,
        bounds,
    }
}

type Published = Option<Arc<CubeSnapshot>>;

/// Signals the owner when the worker thread leaves, however it leaves.
struct ExitSignal(Sender<()>);

impl Drop for ExitSignal {
    fn drop(&mut self) {
        let _ = self.0.try_send(());
    }
}

/// Background projector with a one-slot inbox and a triple-buffered outbox.
struct GeometryWorker {
    requests: Option<Sender<CubeRequest>>,
    snapshots: Output<Published>,
    handle: Option<JoinHandle<()>>,
    exited: Receiver<()>,
}

impl GeometryWorker {
    fn spawn() -> Result<Self> {
        let (request_tx, request_rx) = bounded::<CubeRequest>(1);
        let (exit_tx, exited) = bounded::<()>(1);
        let (mut publish, snapshots) = triple_buffer::<Published>(&None);
        let handle = thread::Builder::new()
            .name("cube-geometry".into())
            .spawn(move || {
                let _signal = ExitSignal(exit_tx);
                run(&request_rx, &mut publish);
            })?;
        debug!("cube geometry worker started");

        Ok(Self {
            requests: Some(request_tx),
            snapshots,
            handle: Some(handle),
            exited,
        })
    }

    fn submit(&self, request: CubeRequest) {
        if let Some(requests) = &self.requests {
            // A full slot means the worker is still busy; the next frame asks again.
            let _ = requests.try_send(request);
        }
    }

    /// Latest published snapshot, `None` until the first projection lands.
    fn latest(&mut self) -> Published {
        self.snapshots.read().clone()
    }

    fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        // Disconnecting the inbox ends the worker loop.
        self.requests = None;

        match self.exited.recv_timeout(SHUTDOWN_TIMEOUT) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    warn!("cube geometry worker panicked");
                }
                debug!("cube geometry worker stopped");
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    timeout_ms = SHUTDOWN_TIMEOUT.as_millis() as u64,
                    "cube geometry worker did not stop in time, detaching"
                );
            }
        }
    }

    fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl fmt::Debug for GeometryWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeometryWorker")
            .field("running", &self.is_running())
            .finish()
    }
}

impl Drop for GeometryWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(requests: &Receiver<CubeRequest>, publish: &mut Input<Published>) {
    while let Ok(request) = requests.recv() {
        let request = requests.try_iter().last().unwrap_or(request);
        publish.write(Some(Arc::new(project_cube(&request))));
    }
}

/// A shaded cube spinning faster as the music gets louder.
#[derive(Debug)]
pub struct CubeStyle {
    spin: [Rotation; 3],
    worker: Option<GeometryWorker>,
    current: Option<Arc<CubeSnapshot>>,
}

impl CubeStyle {
    pub fn new() -> Self {
        Self {
            spin: AXIS_RATES.map(|rate| Rotation::new(0.6 * rate, 4.0 * rate, 1.5)),
            worker: None,
            current: None,
        }
    }

    fn request(&self, ctx: &FrameContext<'_>) -> CubeRequest {
        let [x, y, z] = self.spin.each_ref().map(Rotation::angle);
        let side = ctx.viewport.width().min(ctx.viewport.height());
        let pulse = 1.0 + ctx.intensity.min(1.5) * 0.3 * ctx.tunables.amplitude_scale;
        CubeRequest {
            angles: Vec3::new(x, y, z),
            center: ctx.viewport.center(),
            size: side * ctx.tunables.radius_proportion * 0.6 * pulse,
        }
    }

    pub fn snapshot(&self) -> Option<&CubeSnapshot> {
        self.current.as_deref()
    }
}

impl Default for CubeStyle {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawStrategy for CubeStyle {
    fn style(&self) -> StyleKind {
        StyleKind::Cube
    }

    fn initialize(&mut self, _config: &VisualiserConfig) -> Result<()> {
        if self.worker.is_none() {
            self.worker = Some(GeometryWorker::spawn()?);
        }
        Ok(())
    }

    fn configure(&mut self, config: &VisualiserConfig, _quality: &QualityChange) {
        for (rotation, rate) in self.spin.iter_mut().zip(AXIS_RATES) {
            rotation.speed = config.style.rotation_speed * rate;
            rotation.max_speed = config.style.max_rotation_speed * rate;
        }
    }

    fn advance(&mut self, ctx: &FrameContext<'_>) {
        for rotation in &mut self.spin {
            rotation.advance(ctx.delta, ctx.intensity);
        }
        let request = self.request(ctx);

        match self.worker.as_mut().filter(|w| w.is_running()) {
            Some(worker) => {
                worker.submit(request);
                if let Some(latest) = worker.latest() {
                    self.current = Some(latest);
                } else if self.current.is_none() {
                    // Nothing published yet; project this frame inline.
                    self.current = Some(Arc::new(project_cube(&request)));
                }
            }
            None => self.current = Some(Arc::new(project_cube(&request))),
        }
    }

    fn bounds(&self, _ctx: &FrameContext<'_>) -> Option<Rect> {
        self.current.as_ref().map(|snapshot| snapshot.bounds)
    }

    fn draw(
        &mut self,
        ctx: &FrameContext<'_>,
        canvas: &mut dyn Canvas,
        resources: &mut DrawResources,
    ) {
        let Some(snapshot) = self.current.clone() else {
            return;
        };

        let mut fill = resources.paint(ctx.base_paint);
        fill.style = PaintStyle::Fill;
        let mut edge = None;
        if ctx.profile.advanced_effects {
            let mut p = resources.paint(ctx.base_paint);
            p.style = PaintStyle::Stroke;
            p.stroke_width = 1.5;
            p.color = ctx.base_paint.color.shade(1.4);
            edge = Some(p);
        }
        let mut path = resources.path();

        for face in &snapshot.faces {
            path.reset();
            let [a, b, c, d] = face.corners.map(|i| snapshot.vertices[i]);
            path.move_to(a).line_to(b).line_to(c).line_to(d).close();

            fill.color = ctx.base_paint.color.shade(face.light);
            canvas.draw_path(&path, &fill);
            if let Some(edge) = edge.as_deref() {
                canvas.draw_path(&path, edge);
            }
        }

        resources.release_path(path);
        if let Some(edge) = edge {
            resources.release_paint(edge);
        }
        resources.release_paint(fill);
    }

    fn shutdown(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
        }
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn request(angles: Vec3) -> CubeRequest {
        CubeRequest {
            angles,
            center: Point::new(100.0, 100.0),
            size: 40.0,
        }
    }

    #[test]
    fn faces_are_sorted_far_to_near() {
        let snapshot = project_cube(&request(Vec3::new(0.4, 0.9, 0.1)));
        assert_eq!(snapshot.faces.len(), 6);
        assert!(snapshot.faces.windows(2).all(|w| w[0].depth >= w[1].depth));
        assert!(snapshot
            .faces
            .iter()
            .all(|f| (AMBIENT..=AMBIENT + DIFFUSE + 1e-5).contains(&f.light)));
    }

    #[test]
    fn unrotated_cube_shows_its_front_face_last() {
        let snapshot = project_cube(&request(Vec3::default()));
        let front = snapshot.faces.last().unwrap();
        assert_eq!(front.corners, [0, 1, 3, 2]);
        assert!((front.depth + 1.0).abs() < 1e-5);

        // Nearer corners are pushed outward by perspective.
        let near = snapshot.vertices[0];
        let far = snapshot.vertices[4];
        assert!(near.x < far.x);
        assert!(snapshot.bounds.contains(Point::new(100.0, 100.0)));
    }

    #[test]
    fn worker_publishes_snapshots_and_stops() {
        let mut worker = GeometryWorker::spawn().unwrap();
        let wanted = request(Vec3::new(0.2, 0.3, 0.0));
        worker.submit(wanted);

        let deadline = Instant::now() + Duration::from_secs(2);
        let published = loop {
            if let Some(snapshot) = worker.latest() {
                break snapshot;
            }
            assert!(Instant::now() < deadline, "worker never published");
            thread::sleep(Duration::from_millis(5));
        };
        assert_eq!(*published, project_cube(&wanted));

        worker.stop();
        assert!(!worker.is_running());
        worker.stop();
    }

    #[test]
    fn idle_worker_stops_without_a_timeout() {
        let mut worker = GeometryWorker::spawn().unwrap();
        assert!(worker.latest().is_none());

        let started = Instant::now();
        worker.stop();
        assert!(started.elapsed() < SHUTDOWN_TIMEOUT);
        assert!(!worker.is_running());
    }

    #[test]
    fn first_frame_is_projected_inline() {
        use crate::config::StyleTunables;
        use crate::quality::{QualityLevel, QualityProfile};
        use crate::render::{DrawCommand, Paint, RecordingCanvas};

        let profile = QualityProfile::for_level(QualityLevel::High);
        let tunables = StyleTunables::default();
        let paint = Paint::default();
        let spectrum = [0.0; 8];
        let ctx = FrameContext {
            spectrum: &spectrum,
            intensity: 0.0,
            viewport: Rect::new(0.0, 0.0, 200.0, 200.0),
            delta: 0.016,
            time: 0.0,
            profile: &profile,
            tunables: &tunables,
            base_paint: &paint,
            bar_width: 8.0,
            bar_spacing: 2.0,
        };

        let mut style = CubeStyle::new();
        style.initialize(&VisualiserConfig::default()).unwrap();
        style.advance(&ctx);
        assert!(style.snapshot().is_some());
        assert!(style.bounds(&ctx).is_some_and(|b| b.intersects(&ctx.viewport)));

        let mut resources = DrawResources::new(&VisualiserConfig::default(), profile);
        let mut canvas = RecordingCanvas::new(200.0, 200.0);
        style.draw(&ctx, &mut canvas, &mut resources);
        // Fill plus edge for each of the six faces.
        assert_eq!(canvas.count(|c| matches!(c, DrawCommand::Path { .. })), 12);

        style.shutdown();
        assert!(style.worker.is_none());
        assert!(style.snapshot().is_none());
    }
}
