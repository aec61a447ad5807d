//! Point-cloud canvas: a [`Renderer`] that hands frames to the egui painter.

use std::sync::{Arc, Mutex};

use egui::{pos2, Color32, Painter, Pos2, Rect, Stroke};
use glam::{Mat3, Vec3};
use morphcloud_platform::{DetectionFrame, RenderFrame, Renderer, Result, Transform, HAND_CONNECTIONS};

/// Camera distance from the origin along +z.
const CAMERA_Z: f32 = 3.0;
const FOV_Y_DEGREES: f32 = 75.0;
const NEAR: f32 = 0.1;

/// Latest frame as copied out of the engine.
#[derive(Debug, Clone, Default)]
pub struct CloudSnapshot {
    pub positions: Vec<Vec3>,
    pub colors: Vec<Vec3>,
    pub particle_size: f32,
    pub transform: Transform,
}

/// Shared read side of a [`CanvasRenderer`].
#[derive(Debug, Clone, Default)]
pub struct CanvasView {
    latest: Arc<Mutex<CloudSnapshot>>,
}

impl CanvasView {
    pub fn snapshot(&self) -> CloudSnapshot {
        self.latest.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

pub struct CanvasRenderer {
    latest: Arc<Mutex<CloudSnapshot>>,
}

impl CanvasRenderer {
    pub fn new() -> (Self, CanvasView) {
        let view = CanvasView::default();
        let renderer = Self {
            latest: Arc::clone(&view.latest),
        };
        (renderer, view)
    }
}

impl Renderer for CanvasRenderer {
    fn render_frame(&mut self, frame: &RenderFrame<'_>) -> Result<()> {
        let positions: &[Vec3] = bytemuck::try_cast_slice(frame.positions).map_err(|e| format!("positions: {e:?}"))?;
        let colors: &[Vec3] = bytemuck::try_cast_slice(frame.colors).map_err(|e| format!("colors: {e:?}"))?;

        let mut latest = self.latest.lock().unwrap_or_else(|p| p.into_inner());
        latest.positions.clear();
        latest.positions.extend_from_slice(positions);
        latest.colors.clear();
        latest.colors.extend_from_slice(colors);
        latest.particle_size = frame.particle_size;
        latest.transform = frame.transform;
        Ok(())
    }
}

/// Perspective projection of one cloud point into `viewport`.
///
/// Returns the screen position and the pixels-per-unit at that depth, or
/// `None` for points behind the near plane.
pub fn project(point: Vec3, rotation: &Mat3, viewport: Rect) -> Option<(Pos2, f32)> {
    let p = *rotation * point;
    let depth = CAMERA_Z - p.z;
    if depth < NEAR {
        return None;
    }
    let focal = 1.0 / (FOV_Y_DEGREES.to_radians() / 2.0).tan();
    let pixels = focal / depth * viewport.height() / 2.0;
    let center = viewport.center();
    Some((pos2(center.x + p.x * pixels, center.y - p.y * pixels), pixels))
}

pub fn rotation(transform: &Transform) -> Mat3 {
    Mat3::from_rotation_y(transform.rotation_y) * Mat3::from_rotation_x(transform.rotation_x)
}

pub fn paint_cloud(painter: &Painter, viewport: Rect, cloud: &CloudSnapshot) {
    painter.rect_filled(viewport, 0.0, Color32::BLACK);
    let rotation = rotation(&cloud.transform);

    let mut projected: Vec<(f32, Pos2, f32, Color32)> = cloud
        .positions
        .iter()
        .zip(&cloud.colors)
        .filter_map(|(p, c)| {
            let (screen, pixels) = project(*p, &rotation, viewport)?;
            let radius = (cloud.particle_size * pixels / 2.0).max(0.5);
            Some((pixels, screen, radius, to_color32(*c)))
        })
        .collect();
    // Far points first.
    projected.sort_by(|a, b| a.0.total_cmp(&b.0));
    for (_, screen, radius, color) in projected {
        painter.circle_filled(screen, radius, color);
    }
}

/// Hand skeletons in a small inset, in image coordinates.
pub fn paint_landmarks(painter: &Painter, inset: Rect, frame: &DetectionFrame) {
    painter.rect_filled(inset, 4.0, Color32::from_black_alpha(160));
    let to_screen = |x: f32, y: f32| pos2(inset.left() + x * inset.width(), inset.top() + y * inset.height());
    let bone = Stroke::new(1.5, Color32::from_rgb(0, 255, 0));

    for hand in &frame.hands {
        for &(a, b) in HAND_CONNECTIONS.iter() {
            if let (Some(a), Some(b)) = (hand.get(a), hand.get(b)) {
                painter.line_segment([to_screen(a.x, a.y), to_screen(b.x, b.y)], bone);
            }
        }
        for point in &hand.points {
            painter.circle_filled(to_screen(point.x, point.y), 2.0, Color32::RED);
        }
    }
}

fn to_color32(c: Vec3) -> Color32 {
    let c = c.clamp(Vec3::ZERO, Vec3::ONE) * 255.0;
    Color32::from_rgb(c.x as u8, c.y as u8, c.z as u8)
}
