//! Box overlay generation.
//!
//! The renderer never touches a graphics API; it emits [`DrawCommand`]s in
//! overlay pixel coordinates into a [`DrawSink`].

use glam::{DVec3, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::esp::{CameraPose, project};
use crate::heap::EntityData;
use crate::memory::WindowRect;

/// Default hitbox when the entity has no bounding box.
const DEFAULT_HALF_WIDTH: f32 = 0.3;
const DEFAULT_HEIGHT: f32 = 1.8;

/// Rectangles smaller than this on either axis are not drawn.
const MIN_BOX_SIZE: f32 = 2.0;

/// Vertical gap between a label and the top of its box.
const LABEL_OFFSET: f32 = 14.0;

/// RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const RED: Color = Color::new(255, 38, 38, 255);
    pub const WHITE: Color = Color::new(255, 255, 255, 255);

    /// Pack as ARGB.
    pub fn to_argb(self) -> u32 {
        (u32::from(self.a) << 24)
            | (u32::from(self.r) << 16)
            | (u32::from(self.g) << 8)
            | u32::from(self.b)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::RED
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EspStyle {
    pub enabled: bool,
    pub thickness: f32,
    pub show_labels: bool,
    pub show_distance: bool,
    pub show_snaplines: bool,
    pub max_draw_dist: f32,
    pub color: Color,
}

impl Default for EspStyle {
    fn default() -> Self {
        Self {
            enabled: true,
            thickness: 2.0,
            show_labels: true,
            show_distance: true,
            show_snaplines: false,
            max_draw_dist: 256.0,
            color: Color::default(),
        }
    }
}

/// Drawable area of the overlay: the target window's client rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn origin(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }

    fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

impl From<WindowRect> for Viewport {
    fn from(rect: WindowRect) -> Self {
        Self::new(
            rect.x as f32,
            rect.y as f32,
            rect.width as f32,
            rect.height as f32,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Rect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        color: Color,
        thickness: f32,
    },
    Line {
        from: Vec2,
        to: Vec2,
        color: Color,
        thickness: f32,
    },
    Text {
        x: f32,
        y: f32,
        text: String,
        color: Color,
    },
}

/// Receiver of draw commands, e.g. an overlay window's draw list.
pub trait DrawSink {
    fn draw(&mut self, command: DrawCommand);
}

impl DrawSink for Vec<DrawCommand> {
    fn draw(&mut self, command: DrawCommand) {
        self.push(command);
    }
}

pub struct EspRenderer {
    pub style: EspStyle,
    pub camera: CameraPose,
}

impl EspRenderer {
    pub fn new(style: EspStyle, camera: CameraPose) -> Self {
        Self { style, camera }
    }

    /// Draw every valid entity in range. Returns the number of boxes drawn.
    pub fn render<S: DrawSink + ?Sized>(
        &self,
        entities: &[EntityData],
        viewport: &Viewport,
        sink: &mut S,
    ) -> usize {
        if !self.style.enabled || viewport.is_empty() {
            return 0;
        }

        // Project camera-relative: world coordinates lose precision in f32
        // far from the origin.
        let eye = self.camera.position.as_dvec3();
        let view_projection = CameraPose {
            position: Vec3::ZERO,
            ..self.camera
        }
        .view_projection(viewport.aspect());
        let snap_origin = Vec2::new(
            viewport.x + viewport.width * 0.5,
            viewport.y + viewport.height,
        );
        let color = self.style.color;
        let mut drawn = 0;

        for entity in entities.iter().filter(|e| e.valid) {
            let distance = entity.position().distance(eye) as f32;
            if distance > self.style.max_draw_dist {
                continue;
            }

            let (min, max) = world_box(entity);
            let (min, max) = ((min - eye).as_vec3(), (max - eye).as_vec3());
            let mut screen_min = Vec2::splat(f32::MAX);
            let mut screen_max = Vec2::splat(f32::MIN);
            let mut projected = 0;

            for corner in box_corners(min, max) {
                let Some(point) = project(corner, &view_projection, viewport.width, viewport.height)
                else {
                    continue;
                };
                let point = point + viewport.origin();
                screen_min = screen_min.min(point);
                screen_max = screen_max.max(point);
                projected += 1;
            }

            if projected == 0 {
                continue;
            }

            let screen_min = screen_min.max(viewport.origin());
            let screen_max =
                screen_max.min(viewport.origin() + Vec2::new(viewport.width, viewport.height));
            let size = screen_max - screen_min;
            if size.x < MIN_BOX_SIZE || size.y < MIN_BOX_SIZE {
                continue;
            }

            sink.draw(DrawCommand::Rect {
                x: screen_min.x,
                y: screen_min.y,
                w: size.x,
                h: size.y,
                color,
                thickness: self.style.thickness,
            });

            if self.style.show_snaplines {
                sink.draw(DrawCommand::Line {
                    from: snap_origin,
                    to: Vec2::new((screen_min.x + screen_max.x) * 0.5, screen_min.y),
                    color,
                    thickness: 1.0,
                });
            }

            if let Some(text) = self.label(entity.index, distance) {
                sink.draw(DrawCommand::Text {
                    x: screen_min.x,
                    y: screen_min.y - LABEL_OFFSET,
                    text,
                    color,
                });
            }

            drawn += 1;
        }

        drawn
    }

    /// Render into a fresh command list.
    pub fn commands(&self, entities: &[EntityData], viewport: &Viewport) -> Vec<DrawCommand> {
        let mut commands = Vec::new();
        self.render(entities, viewport, &mut commands);
        commands
    }

    fn label(&self, index: usize, distance: f32) -> Option<String> {
        match (self.style.show_labels, self.style.show_distance) {
            (true, true) => Some(format!("#{} [{:.0}m]", index, distance)),
            (true, false) => Some(format!("#{}", index)),
            (false, true) => Some(format!("{:.0}m", distance)),
            (false, false) => None,
        }
    }
}

/// World-space box for an entity: its bounding box if it has any extent,
/// otherwise a default hitbox standing on its position.
fn world_box(entity: &EntityData) -> (DVec3, DVec3) {
    let bb = &entity.bounding_box;
    if bb.has_extent() {
        return (bb.min(), bb.max());
    }

    let p = entity.position();
    let half = f64::from(DEFAULT_HALF_WIDTH);
    (
        DVec3::new(p.x - half, p.y, p.z - half),
        DVec3::new(p.x + half, p.y + f64::from(DEFAULT_HEIGHT), p.z + half),
    )
}

fn box_corners(min: Vec3, max: Vec3) -> [Vec3; 8] {
    [
        Vec3::new(min.x, min.y, min.z),
        Vec3::new(max.x, min.y, min.z),
        Vec3::new(min.x, max.y, min.z),
        Vec3::new(max.x, max.y, min.z),
        Vec3::new(min.x, min.y, max.z),
        Vec3::new(max.x, min.y, max.z),
        Vec3::new(min.x, max.y, max.z),
        Vec3::new(max.x, max.y, max.z),
    ]
}
