use std::ops::Sub;

use eframe::egui;
use egui::{Color32, ColorImage, Pos2, Rect, TextureOptions, Vec2};
use image::RgbaImage;
use rand::Rng;

// ============================================================================
// GEOMETRY
// ============================================================================

/// Integer point in canvas-local coordinates (origin at the canvas top-left).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

// ============================================================================
// POLICIES
// ============================================================================

/// What happens to placed images when the canvas changes size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RelayoutPolicy {
    /// Every image gets a fresh random position inside the new bounds.
    #[default]
    Randomize,
    /// Positions are kept as they are.
    Preserve,
}

impl RelayoutPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayoutPolicy::Randomize => "randomize",
            RelayoutPolicy::Preserve => "preserve",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "randomize" => Some(RelayoutPolicy::Randomize),
            "preserve" => Some(RelayoutPolicy::Preserve),
            _ => None,
        }
    }
}

/// Which image wins a pointer-down when several overlap the point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum HitTestOrder {
    /// The image painted last (visually on top).
    #[default]
    Topmost,
    /// The earliest-added image, regardless of paint order.
    FirstAdded,
}

impl HitTestOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            HitTestOrder::Topmost => "topmost",
            HitTestOrder::FirstAdded => "first",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "topmost" | "top" => Some(HitTestOrder::Topmost),
            "first" | "first_added" => Some(HitTestOrder::FirstAdded),
            _ => None,
        }
    }
}

/// Outcome of choosing a random position for an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// The image fits and lies fully inside the canvas.
    Fitted,
    /// The canvas is narrower and/or shorter than the image; the offending
    /// axis was pinned to 0.
    Clamped,
}

/// Random top-left corner so that an `image_w`×`image_h` image fits inside
/// a `canvas_w`×`canvas_h` canvas.  An axis where the image does not fit
/// collapses to the range `[0, 0]`.
pub fn random_position<R: Rng + ?Sized>(
    canvas_w: u32,
    canvas_h: u32,
    image_w: u32,
    image_h: u32,
    rng: &mut R,
) -> (Point, Placement) {
    let max_x = canvas_w.checked_sub(image_w);
    let max_y = canvas_h.checked_sub(image_h);
    let placement = if max_x.is_some() && max_y.is_some() {
        Placement::Fitted
    } else {
        Placement::Clamped
    };
    let x = rng.gen_range(0..=clamp_i32(max_x.unwrap_or(0)));
    let y = rng.gen_range(0..=clamp_i32(max_y.unwrap_or(0)));
    (Point::new(x, y), placement)
}

fn clamp_i32(v: u32) -> i32 {
    v.min(i32::MAX as u32) as i32
}

// ============================================================================
// CANVAS STATE
// ============================================================================

/// A decoded bitmap and where it currently sits on the canvas.
/// The bitmap is fixed once placed; only the position moves.
pub struct PlacedImage {
    bitmap: RgbaImage,
    pub position: Point,
    /// GPU texture, uploaded on first paint.
    texture: Option<egui::TextureHandle>,
}

impl PlacedImage {
    pub fn new(bitmap: RgbaImage, position: Point) -> Self {
        Self {
            bitmap,
            position,
            texture: None,
        }
    }

    pub fn bitmap(&self) -> &RgbaImage {
        &self.bitmap
    }

    pub fn width(&self) -> u32 {
        self.bitmap.width()
    }

    pub fn height(&self) -> u32 {
        self.bitmap.height()
    }

    /// Half-open bounding box test: `x <= p.x < x + w` (same for y).
    pub fn contains(&self, p: Point) -> bool {
        let dx = p.x as i64 - self.position.x as i64;
        let dy = p.y as i64 - self.position.y as i64;
        dx >= 0 && dy >= 0 && dx < self.width() as i64 && dy < self.height() as i64
    }
}

/// An image currently held by the pointer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DragState {
    /// Index into [`CanvasState::images`].
    pub index: usize,
    /// Pointer position minus image origin at pickup.
    pub offset: Point,
}

/// The arrangement of placed images plus the transient drag state.
///
/// Collection order is paint order: later entries draw over earlier ones.
/// Images are never removed, so a [`DragState`] index stays valid for the
/// life of the drag.
pub struct CanvasState {
    pub width: u32,
    pub height: u32,
    images: Vec<PlacedImage>,
    drag: Option<DragState>,
    pub relayout: RelayoutPolicy,
    pub hit_test: HitTestOrder,
}

impl CanvasState {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            images: Vec::new(),
            drag: None,
            relayout: RelayoutPolicy::default(),
            hit_test: HitTestOrder::default(),
        }
    }

    pub fn with_policies(mut self, relayout: RelayoutPolicy, hit_test: HitTestOrder) -> Self {
        self.relayout = relayout;
        self.hit_test = hit_test;
        self
    }

    pub fn images(&self) -> &[PlacedImage] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn dragging(&self) -> Option<DragState> {
        self.drag
    }

    /// Append `bitmap` at a random position where it is fully visible.
    pub fn add_image<R: Rng + ?Sized>(&mut self, bitmap: RgbaImage, rng: &mut R) -> Placement {
        let (position, placement) =
            random_position(self.width, self.height, bitmap.width(), bitmap.height(), rng);
        if placement == Placement::Clamped {
            crate::log_warn!(
                "Canvas {}x{} is smaller than image {}x{}; placed at {:?}",
                self.width,
                self.height,
                bitmap.width(),
                bitmap.height(),
                position
            );
        }
        self.images.push(PlacedImage::new(bitmap, position));
        placement
    }

    /// Index of the image under `p`, honoring [`HitTestOrder`].
    pub fn hit_test(&self, p: Point) -> Option<usize> {
        match self.hit_test {
            HitTestOrder::Topmost => self.images.iter().rposition(|img| img.contains(p)),
            HitTestOrder::FirstAdded => self.images.iter().position(|img| img.contains(p)),
        }
    }

    /// Pick up the image under `p`, if any.
    pub fn pointer_down(&mut self, p: Point) -> Option<usize> {
        let index = self.hit_test(p)?;
        let offset = p - self.images[index].position;
        self.drag = Some(DragState { index, offset });
        Some(index)
    }

    /// Move the held image so the grab point follows `p`.  No bounds
    /// clamping: an image may be dragged partly or fully off the canvas.
    /// Returns `true` when a position changed.
    pub fn pointer_move(&mut self, p: Point) -> bool {
        let Some(drag) = self.drag else { return false };
        let Some(image) = self.images.get_mut(drag.index) else {
            self.drag = None;
            return false;
        };
        let new_position = p - drag.offset;
        if image.position == new_position {
            return false;
        }
        image.position = new_position;
        true
    }

    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    /// Record a new canvas size and apply the [`RelayoutPolicy`].
    /// Returns `false` when the size did not actually change.
    pub fn resize<R: Rng + ?Sized>(&mut self, width: u32, height: u32, rng: &mut R) -> bool {
        if self.width == width && self.height == height {
            return false;
        }
        self.width = width;
        self.height = height;
        if self.relayout == RelayoutPolicy::Randomize {
            let clamped = self.relayout_random(rng);
            if clamped > 0 {
                crate::log_warn!(
                    "Canvas {}x{} is smaller than {} of {} images; pinned to the edge",
                    width,
                    height,
                    clamped,
                    self.images.len()
                );
            }
        }
        true
    }

    /// Give every image a fresh random position inside the current bounds.
    /// Returns how many images did not fit and were pinned to 0.
    pub fn relayout_random<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        let mut clamped = 0;
        for image in &mut self.images {
            let (position, placement) =
                random_position(self.width, self.height, image.width(), image.height(), rng);
            image.position = position;
            if placement == Placement::Clamped {
                clamped += 1;
            }
        }
        clamped
    }

    /// Stack every image on the first image's position.
    /// Returns `false` when there are fewer than two images.
    pub fn group_at_first(&mut self) -> bool {
        if self.images.len() < 2 {
            return false;
        }
        let anchor = self.images[0].position;
        for image in &mut self.images[1..] {
            image.position = anchor;
        }
        true
    }
}

// ============================================================================
// CANVAS WIDGET
// ============================================================================

/// egui view over a [`CanvasState`]: paints the images and maps pointer
/// input into canvas-local coordinates.
pub struct Canvas {
    pub background: Color32,
    pub border: Color32,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            background: Color32::from_rgb(0xF0, 0xF0, 0xF0),
            border: Color32::from_rgb(0xCC, 0xCC, 0xCC),
        }
    }
}

impl Canvas {
    pub fn new(background: Color32) -> Self {
        Self {
            background,
            ..Default::default()
        }
    }

    pub fn show<R: Rng + ?Sized>(
        &mut self,
        ui: &mut egui::Ui,
        state: &mut CanvasState,
        rng: &mut R,
    ) -> egui::Response {
        let available_size = ui.available_size();
        let (response, painter) = ui.allocate_painter(available_size, egui::Sense::click_and_drag());
        let canvas_rect = response.rect;

        // ---- Resize ----
        let (w, h) = (canvas_rect.width().max(0.0) as u32, canvas_rect.height().max(0.0) as u32);
        if state.resize(w, h, rng) && !state.is_empty() {
            crate::log_info!(
                "Canvas resized to {}x{} ({} relayout of {} images)",
                w,
                h,
                state.relayout.as_str(),
                state.len()
            );
        }

        // ---- Pointer ----
        let (pressed, released, pointer_pos) = ui.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.pointer.interact_pos(),
            )
        });
        let to_local = |p: Pos2| -> Point {
            let v = p - canvas_rect.min;
            Point::new(v.x.floor() as i32, v.y.floor() as i32)
        };

        if pressed
            && response.hovered()
            && let Some(pos) = pointer_pos
        {
            state.pointer_down(to_local(pos));
        }
        if state.dragging().is_some() {
            if let Some(pos) = pointer_pos
                && state.pointer_move(to_local(pos))
            {
                ui.ctx().request_repaint();
            }
            ui.ctx().output_mut(|o| o.cursor_icon = egui::CursorIcon::Grabbing);
        }
        if released {
            state.pointer_up();
        }

        // ---- Paint ----
        painter.rect_filled(canvas_rect, 0.0, self.background);
        let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
        for (i, placed) in state.images.iter_mut().enumerate() {
            let texture = placed.texture.get_or_insert_with(|| {
                let size = [placed.bitmap.width() as usize, placed.bitmap.height() as usize];
                let color_image = ColorImage::from_rgba_unmultiplied(size, placed.bitmap.as_raw());
                ui.ctx()
                    .load_texture(format!("placed_image_{}", i), color_image, TextureOptions::LINEAR)
            });
            let min = canvas_rect.min + Vec2::new(placed.position.x as f32, placed.position.y as f32);
            let image_rect = Rect::from_min_size(
                min,
                Vec2::new(placed.bitmap.width() as f32, placed.bitmap.height() as f32),
            );
            painter.image(texture.id(), image_rect, uv, Color32::WHITE);
        }
        painter.rect_stroke(canvas_rect, 0.0, egui::Stroke::new(1.0, self.border));
        response
    }
}
