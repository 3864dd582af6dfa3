use crate::text::render_paragraph_pixmap;
use ab_glyph::FontArc;
use anyhow::Result;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use stimkit_cache::intern_text;
use stimkit_core::{Display, Element};
use stimkit_timing::{HighPrecisionTimer, Timer};
use tiny_skia::{Color, Pixmap, Rect};

pub struct FrameStats {
    pub clear: Duration,
    pub draw: Duration,
    pub copy: Duration,
    pub total: Duration,
    pub dirty_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TextKey {
    intern_id: usize,
    size_bits: u32,
    wrap_bits: u32,
    color: [u8; 4],
}

/// Offscreen rasterizer for display element lists.
///
/// Keeps a premultiplied canvas, clears and presents only dirty regions,
/// and caches rasterized text by interner id. Works without a font, in
/// which case text elements are skipped.
pub struct SkiaRenderer {
    width: u32,
    height: u32,

    font: Option<FontArc>,
    text_cache: HashMap<TextKey, Arc<Pixmap>>,

    canvas: Pixmap,
    background: [u8; 4],
    dirty_regions: Vec<Rect>,
    first_frame: bool,

    component_timers: HashMap<&'static str, RefCell<HighPrecisionTimer>>,
    clear_buffer: Vec<u8>,
}

fn background_buffer(color: [u8; 4], width: u32, height: u32) -> Vec<u8> {
    color
        .into_iter()
        .cycle()
        .take((width * height * 4) as usize)
        .collect()
}

impl SkiaRenderer {
    pub fn new(width: u32, height: u32, font: Option<FontArc>) -> Self {
        if font.is_none() {
            println!("No font loaded, text elements will be skipped");
        }

        let background = [0, 0, 0, 255];
        let mut canvas = Pixmap::new(width, height).expect("canvas pixmap");
        canvas.fill(Color::from_rgba8(
            background[0],
            background[1],
            background[2],
            background[3],
        ));

        SkiaRenderer {
            width,
            height,
            font,
            text_cache: HashMap::new(),
            canvas,
            background,
            dirty_regions: Vec::with_capacity(16),
            first_frame: true,
            component_timers: ["draw", "clear", "copy", "total"]
                .iter()
                .map(|&k| (k, RefCell::new(HighPrecisionTimer::new())))
                .collect(),
            clear_buffer: background_buffer(background, width, height),
        }
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) {
        self.width = new_width;
        self.height = new_height;
        self.canvas = Pixmap::new(new_width, new_height).expect("canvas pixmap");
        self.canvas.fill(Color::from_rgba8(
            self.background[0],
            self.background[1],
            self.background[2],
            self.background[3],
        ));
        self.clear_buffer = background_buffer(self.background, new_width, new_height);
        self.dirty_regions.clear();
        self.first_frame = true;
    }

    fn set_background(&mut self, color: [u8; 4]) {
        if self.background == color {
            return;
        }
        self.background = color;
        self.canvas
            .fill(Color::from_rgba8(color[0], color[1], color[2], color[3]));
        self.clear_buffer = background_buffer(color, self.width, self.height);
        self.dirty_regions.clear();
        self.first_frame = true;
    }

    /// Render one frame of the given display into `frame_buffer`
    /// (RGBA, `width * height * 4` bytes). `field_on` comes from the
    /// queue's frame view; a switching display in its background
    /// half-cycle draws nothing over the cleared canvas.
    pub fn render_frame(
        &mut self,
        display: Option<&Display>,
        field_on: bool,
        frame_buffer: &mut [u8],
        timer: &mut HighPrecisionTimer,
    ) -> Result<FrameStats> {
        let background = display.map(|d| d.background_color()).unwrap_or([0, 0, 0, 255]);
        self.set_background(background);

        if self.first_frame {
            self.first_frame = false;
            frame_buffer.copy_from_slice(&self.clear_buffer);
            self.dirty_regions.clear();
        }

        let old_dirty = std::mem::take(&mut self.dirty_regions);

        let t_clear = {
            let t = timer.now();
            self.clear_dirty(&old_dirty);
            timer.elapsed(t)
        };

        let t_draw = {
            let t = timer.now();
            if field_on {
                if let Some(display) = display {
                    self.draw_display(display);
                }
            }
            timer.elapsed(t)
        };

        let mut present_rects = old_dirty;
        present_rects.extend_from_slice(&self.dirty_regions);
        Self::coalesce_dirty(&mut present_rects);

        let t_copy = {
            let t = timer.now();
            for rect in &present_rects {
                self.copy_dirty_region(*rect, frame_buffer);
            }
            timer.elapsed(t)
        };

        let total = t_clear + t_draw + t_copy;
        self.component_timers["draw"].borrow_mut().record_frame(t_draw);
        self.component_timers["clear"].borrow_mut().record_frame(t_clear);
        self.component_timers["copy"].borrow_mut().record_frame(t_copy);
        timer.record_frame(total);

        Ok(FrameStats {
            clear: t_clear,
            draw: t_draw,
            copy: t_copy,
            total,
            dirty_count: self.dirty_regions.len(),
        })
    }

    fn draw_display(&mut self, display: &Display) {
        for element in &display.elements {
            match element {
                Element::Bar {
                    x,
                    y,
                    width,
                    height,
                    color,
                } => self.fill_rect_solid(*x, *y, *width, *height, *color),
                Element::Text {
                    content,
                    size_px,
                    color,
                    x,
                    y,
                    max_width,
                } => self.draw_text(content, *size_px, *color, (*x, *y), *max_width),
                Element::Command { .. } => {}
            }
        }
    }

    fn draw_text(
        &mut self,
        content: &str,
        size_px: f32,
        color: [u8; 4],
        pos: (f32, f32),
        max_width: Option<f32>,
    ) {
        let Some(font) = self.font.clone() else {
            return;
        };
        let key = TextKey {
            intern_id: intern_text(content),
            size_bits: size_px.to_bits(),
            wrap_bits: max_width.map(f32::to_bits).unwrap_or(0),
            color,
        };
        let pm = match self.text_cache.get(&key) {
            Some(pm) => Arc::clone(pm),
            None => {
                let pm = Arc::new(render_paragraph_pixmap(
                    content,
                    size_px,
                    &font,
                    Color::from_rgba8(color[0], color[1], color[2], color[3]),
                    max_width,
                ));
                self.text_cache.insert(key, Arc::clone(&pm));
                pm
            }
        };
        self.blit_pixmap(&pm, pos);
    }

    /// Solid axis-aligned bar. Opaque colors take a per-row memcpy path,
    /// translucent ones blend premultiplied.
    fn fill_rect_solid(&mut self, x: f32, y: f32, w: f32, h: f32, color: [u8; 4]) {
        let x0 = x.floor().max(0.0).min(self.width as f32) as usize;
        let y0 = y.floor().max(0.0).min(self.height as f32) as usize;
        let x1 = (x + w).ceil().max(0.0).min(self.width as f32) as usize;
        let y1 = (y + h).ceil().max(0.0).min(self.height as f32) as usize;
        if x1 <= x0 || y1 <= y0 {
            return;
        }

        let stride = self.width as usize * 4;
        let canvas_data = self.canvas.data_mut();

        if color[3] == 255 {
            let row: Vec<u8> = color
                .into_iter()
                .cycle()
                .take((x1 - x0) * 4)
                .collect();
            for row_y in y0..y1 {
                let off = row_y * stride + x0 * 4;
                canvas_data[off..off + row.len()].copy_from_slice(&row);
            }
        } else {
            let sa = color[3] as u32;
            let sr = color[0] as u32 * sa / 255;
            let sg = color[1] as u32 * sa / 255;
            let sb = color[2] as u32 * sa / 255;
            let inv = 255 - sa;
            for row_y in y0..y1 {
                for col_x in x0..x1 {
                    let i = row_y * stride + col_x * 4;
                    canvas_data[i] = (sr + (canvas_data[i] as u32 * inv + 127) / 255) as u8;
                    canvas_data[i + 1] =
                        (sg + (canvas_data[i + 1] as u32 * inv + 127) / 255) as u8;
                    canvas_data[i + 2] =
                        (sb + (canvas_data[i + 2] as u32 * inv + 127) / 255) as u8;
                    canvas_data[i + 3] =
                        (sa + (canvas_data[i + 3] as u32 * inv + 127) / 255) as u8;
                }
            }
        }

        if let Some(rect) = Rect::from_xywh(
            x0 as f32,
            y0 as f32,
            (x1 - x0) as f32,
            (y1 - y0) as f32,
        ) {
            self.dirty_regions.push(rect);
        }
    }

    /// Blit a cached pixmap centered on `pos`, clipped to the canvas.
    fn blit_pixmap(&mut self, pixmap: &Pixmap, pos: (f32, f32)) {
        let w = pixmap.width() as usize;
        let h = pixmap.height() as usize;

        let x0 = (pos.0 - w as f32 * 0.5).floor() as i32;
        let y0 = (pos.1 - h as f32 * 0.5).floor() as i32;

        let dst_x_start = x0.max(0) as usize;
        let dst_y_start = y0.max(0) as usize;
        let dst_x_end = (x0 + w as i32).clamp(0, self.width as i32) as usize;
        let dst_y_end = (y0 + h as i32).clamp(0, self.height as i32) as usize;

        let src_x_start = if x0 < 0 { (-x0) as usize } else { 0 };
        let src_y_start = if y0 < 0 { (-y0) as usize } else { 0 };

        if dst_x_end <= dst_x_start || dst_y_end <= dst_y_start {
            return;
        }
        let max_w = dst_x_end - dst_x_start;
        let max_h = dst_y_end - dst_y_start;

        let src_data = pixmap.data();
        let src_stride = pixmap.width() as usize;
        let dst_stride = self.width as usize;
        let dst_data = self.canvas.data_mut();

        // Opaque regions take a straight memcpy per row
        let mut fully_opaque = true;
        'opaque_check: for row_y in 0..max_h {
            let row_start = (src_y_start + row_y) * src_stride + src_x_start;
            for col_x in 0..max_w {
                if src_data[(row_start + col_x) * 4 + 3] != 255 {
                    fully_opaque = false;
                    break 'opaque_check;
                }
            }
        }

        if fully_opaque {
            for row_y in 0..max_h {
                let src_off = ((src_y_start + row_y) * src_stride + src_x_start) * 4;
                let dst_off = ((dst_y_start + row_y) * dst_stride + dst_x_start) * 4;
                dst_data[dst_off..dst_off + max_w * 4]
                    .copy_from_slice(&src_data[src_off..src_off + max_w * 4]);
            }
        } else {
            for row_y in 0..max_h {
                for col_x in 0..max_w {
                    let src_idx = ((src_y_start + row_y) * src_stride + (src_x_start + col_x)) * 4;
                    let dst_idx = ((dst_y_start + row_y) * dst_stride + (dst_x_start + col_x)) * 4;

                    let sr = src_data[src_idx] as u32;
                    let sg = src_data[src_idx + 1] as u32;
                    let sb = src_data[src_idx + 2] as u32;
                    let sa = src_data[src_idx + 3] as u32;
                    let inv = 255 - sa;

                    dst_data[dst_idx] =
                        (sr + (dst_data[dst_idx] as u32 * inv + 127) / 255) as u8;
                    dst_data[dst_idx + 1] =
                        (sg + (dst_data[dst_idx + 1] as u32 * inv + 127) / 255) as u8;
                    dst_data[dst_idx + 2] =
                        (sb + (dst_data[dst_idx + 2] as u32 * inv + 127) / 255) as u8;
                    dst_data[dst_idx + 3] =
                        (sa + (dst_data[dst_idx + 3] as u32 * inv + 127) / 255) as u8;
                }
            }
        }

        if let Some(rect) = Rect::from_xywh(
            dst_x_start as f32,
            dst_y_start as f32,
            max_w as f32,
            max_h as f32,
        ) {
            self.dirty_regions.push(rect);
        }
    }

    fn clear_dirty(&mut self, dirty: &[Rect]) {
        let stride = self.width as usize * 4;
        let canvas_data = self.canvas.data_mut();

        for rect in dirty {
            let x0 = rect.x().floor().max(0.0).min(self.width as f32) as usize;
            let y0 = rect.y().floor().max(0.0).min(self.height as f32) as usize;
            let x1 = (rect.x() + rect.width()).ceil().min(self.width as f32) as usize;
            let y1 = (rect.y() + rect.height()).ceil().min(self.height as f32) as usize;
            if x1 <= x0 || y1 <= y0 {
                continue;
            }
            let row_len = (x1 - x0) * 4;
            for row_y in y0..y1 {
                let off = row_y * stride + x0 * 4;
                canvas_data[off..off + row_len]
                    .copy_from_slice(&self.clear_buffer[off..off + row_len]);
            }
        }
    }

    fn copy_dirty_region(&self, dirty: Rect, frame_buffer: &mut [u8]) {
        let x0 = dirty.x().floor().max(0.0).min(self.width as f32) as usize;
        let y0 = dirty.y().floor().max(0.0).min(self.height as f32) as usize;
        let x1 = (dirty.x() + dirty.width()).ceil().min(self.width as f32) as usize;
        let y1 = (dirty.y() + dirty.height()).ceil().min(self.height as f32) as usize;
        if x1 <= x0 || y1 <= y0 {
            return;
        }

        let bytes = (x1 - x0) * 4;
        let stride = self.width as usize * 4;
        let canvas_data = self.canvas.data();

        for row_y in y0..y1 {
            let off = row_y * stride + x0 * 4;
            frame_buffer[off..off + bytes].copy_from_slice(&canvas_data[off..off + bytes]);
        }
    }

    fn coalesce_dirty(rects: &mut Vec<Rect>) {
        rects.sort_by(|a, b| a.y().total_cmp(&b.y()).then(a.x().total_cmp(&b.x())));
        let mut out: Vec<Rect> = Vec::with_capacity(rects.len());
        for r in rects.drain(..) {
            if let Some(last) = out.last_mut() {
                let same_row =
                    (r.y() - last.y()).abs() < 1.0 && (r.height() - last.height()).abs() < 1.0;
                let touching = r.x() <= last.x() + last.width() + 1.0;
                if same_row && touching {
                    let nx = last.x().min(r.x());
                    let nx2 = (last.x() + last.width()).max(r.x() + r.width());
                    if let Some(merged) = Rect::from_xywh(nx, last.y(), nx2 - nx, last.height()) {
                        *last = merged;
                        continue;
                    }
                }
            }
            out.push(r);
        }
        *rects = out;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stimkit_core::catalog;

    fn pixel(buffer: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * width + x) * 4) as usize;
        [buffer[i], buffer[i + 1], buffer[i + 2], buffer[i + 3]]
    }

    #[test]
    fn fill_screen_covers_the_viewport() {
        let mut display = catalog::fill_screen().unwrap();
        display.create((64, 48)).unwrap();

        let mut renderer = SkiaRenderer::new(64, 48, None);
        let mut buffer = vec![0u8; 64 * 48 * 4];
        let mut timer = HighPrecisionTimer::new();

        renderer
            .render_frame(Some(&display), true, &mut buffer, &mut timer)
            .unwrap();

        assert_eq!(pixel(&buffer, 64, 0, 0), [128, 128, 128, 255]);
        assert_eq!(pixel(&buffer, 64, 32, 24), [128, 128, 128, 255]);
        assert_eq!(pixel(&buffer, 64, 63, 47), [128, 128, 128, 255]);
    }

    #[test]
    fn switching_display_alternates_field_and_background() {
        let mut display = catalog::black_switching().unwrap();
        display.create((32, 32)).unwrap();

        let mut renderer = SkiaRenderer::new(32, 32, None);
        let mut buffer = vec![0u8; 32 * 32 * 4];
        let mut timer = HighPrecisionTimer::new();

        renderer
            .render_frame(Some(&display), true, &mut buffer, &mut timer)
            .unwrap();
        assert_eq!(pixel(&buffer, 32, 16, 16), [0, 0, 0, 255]);

        renderer
            .render_frame(Some(&display), false, &mut buffer, &mut timer)
            .unwrap();
        assert_eq!(pixel(&buffer, 32, 16, 16), [255, 255, 255, 255]);
        assert_eq!(pixel(&buffer, 32, 0, 31), [255, 255, 255, 255]);
    }

    #[test]
    fn text_is_skipped_without_a_font() {
        let mut display = catalog::message().unwrap();
        display.create((32, 32)).unwrap();

        let mut renderer = SkiaRenderer::new(32, 32, None);
        let mut buffer = vec![0u8; 32 * 32 * 4];
        let mut timer = HighPrecisionTimer::new();

        let stats = renderer
            .render_frame(Some(&display), true, &mut buffer, &mut timer)
            .unwrap();
        assert_eq!(stats.dirty_count, 0);
        assert_eq!(pixel(&buffer, 32, 16, 16), [0, 0, 0, 255]);
    }

    #[test]
    fn empty_frame_clears_to_black() {
        let mut renderer = SkiaRenderer::new(16, 16, None);
        let mut buffer = vec![255u8; 16 * 16 * 4];
        let mut timer = HighPrecisionTimer::new();

        renderer.render_frame(None, true, &mut buffer, &mut timer).unwrap();
        assert_eq!(pixel(&buffer, 16, 8, 8), [0, 0, 0, 255]);
    }

    #[test]
    fn resize_rebuilds_the_canvas() {
        let mut display = catalog::fill_screen().unwrap();
        display.create((64, 48)).unwrap();

        let mut renderer = SkiaRenderer::new(32, 32, None);
        renderer.resize(64, 48);
        let mut buffer = vec![0u8; 64 * 48 * 4];
        let mut timer = HighPrecisionTimer::new();

        renderer
            .render_frame(Some(&display), true, &mut buffer, &mut timer)
            .unwrap();
        assert_eq!(pixel(&buffer, 64, 63, 47), [128, 128, 128, 255]);
    }

    #[test]
    fn coalesce_merges_touching_rects_in_a_row() {
        let mut rects = vec![
            Rect::from_xywh(0.0, 0.0, 10.0, 5.0).unwrap(),
            Rect::from_xywh(10.0, 0.0, 10.0, 5.0).unwrap(),
            Rect::from_xywh(0.0, 10.0, 10.0, 5.0).unwrap(),
        ];
        SkiaRenderer::coalesce_dirty(&mut rects);
        assert_eq!(rects.len(), 2);
        assert_eq!(rects[0].width(), 20.0);
    }

    #[test]
    fn blit_centers_and_clips_at_edges() {
        let mut renderer = SkiaRenderer::new(16, 16, None);
        let pm = crate::text::solid_pixmap(8, 8, [10, 20, 30, 255]);

        renderer.blit_pixmap(&pm, (0.0, 0.0));
        renderer.blit_pixmap(&pm, (8.0, 8.0));

        let mut buffer = vec![0u8; 16 * 16 * 4];
        renderer.copy_dirty_region(Rect::from_xywh(0.0, 0.0, 16.0, 16.0).unwrap(), &mut buffer);

        assert_eq!(pixel(&buffer, 16, 0, 0), [10, 20, 30, 255]);
        assert_eq!(pixel(&buffer, 16, 8, 8), [10, 20, 30, 255]);
        assert_eq!(pixel(&buffer, 16, 15, 15), [0, 0, 0, 255]);
    }

    #[test]
    fn translucent_bar_blends_over_background() {
        let mut renderer = SkiaRenderer::new(8, 8, None);
        let mut buffer = vec![0u8; 8 * 8 * 4];
        let mut timer = HighPrecisionTimer::new();

        // Prime an empty black frame, then blend a half-alpha white bar.
        renderer.render_frame(None, true, &mut buffer, &mut timer).unwrap();
        renderer.fill_rect_solid(0.0, 0.0, 8.0, 8.0, [255, 255, 255, 128]);
        renderer.copy_dirty_region(
            Rect::from_xywh(0.0, 0.0, 8.0, 8.0).unwrap(),
            &mut buffer,
        );

        let px = pixel(&buffer, 8, 4, 4);
        assert_eq!(px[3], 255);
        assert!(px[0] > 100 && px[0] < 156, "got {px:?}");
    }
}
