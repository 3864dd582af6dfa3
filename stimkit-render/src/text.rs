use ab_glyph::{point, Font, FontArc, Glyph, PxScale, ScaleFont};
use anyhow::{Context, Result};
use std::path::Path;
use tiny_skia::{Color, Paint, Pixmap, PixmapPaint, PremultipliedColorU8, Rect, Transform};

/// Load a TTF/OTF file for text displays.
pub fn load_font(path: &Path) -> Result<FontArc> {
    let bytes =
        std::fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
    FontArc::try_from_vec(bytes).with_context(|| format!("parsing font {}", path.display()))
}

/// Greedy word wrap against a pixel width. Embedded newlines are hard
/// breaks; a blank line stays blank.
pub fn wrap_lines(font: &FontArc, size_px: f32, text: &str, max_width: f32) -> Vec<String> {
    let sf = font.as_scaled(PxScale::from(size_px));
    let space_w = sf.h_advance(font.glyph_id(' '));
    let measure =
        |s: &str| -> f32 { s.chars().map(|ch| sf.h_advance(font.glyph_id(ch))).sum() };

    let mut lines = Vec::new();
    for raw_line in text.split('\n') {
        let mut current = String::new();
        let mut current_w = 0.0f32;
        for word in raw_line.split_whitespace() {
            let word_w = measure(word);
            let needed = if current.is_empty() {
                word_w
            } else {
                current_w + space_w + word_w
            };
            if !current.is_empty() && needed > max_width {
                lines.push(std::mem::take(&mut current));
                current_w = 0.0;
            }
            if !current.is_empty() {
                current.push(' ');
                current_w += space_w;
            }
            current.push_str(word);
            current_w += word_w;
        }
        lines.push(current);
    }
    lines
}

/// Rasterize one line into a tight transparent pixmap.
pub fn render_text_pixmap(text: &str, font_size: f32, font: &FontArc, color: Color) -> Pixmap {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    // Layout with baseline at ascent
    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    // Union pixel bounds from outlined glyphs
    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;

    for g in &glyphs {
        if let Some(out) = font.outline_glyph(g.clone()) {
            let b = out.px_bounds();
            min_x = min_x.min(b.min.x);
            min_y = min_y.min(b.min.y);
            max_x = max_x.max(b.max.x);
            max_y = max_y.max(b.max.y);
        }
    }

    if min_x == f32::INFINITY {
        return Pixmap::new(1, 1).expect("pixmap");
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;

    let mut pm = Pixmap::new(w, h).expect("pixmap");

    // Rasterize with premultiplied alpha blending
    let stride = pm.width() as usize;
    let dst = pm.pixels_mut();

    let cu = [
        (color.red() * 255.0) as u8,
        (color.green() * 255.0) as u8,
        (color.blue() * 255.0) as u8,
        (color.alpha() * 255.0) as u8,
    ];

    for g in &glyphs {
        if let Some(out) = font.outline_glyph(g.clone()) {
            let b = out.px_bounds();
            out.draw(|x, y, cov| {
                if cov <= f32::EPSILON {
                    return;
                }
                let fx = x as f32 + b.min.x - min_x;
                let fy = y as f32 + b.min.y - min_y;

                let ix = fx.floor() as i32;
                let iy = fy.floor() as i32;
                if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                    return;
                }

                let i = iy as usize * stride + ix as usize;
                if i >= dst.len() {
                    return;
                }

                // Premultiply source by (coverage * alpha)
                let a_lin = (cov * cu[3] as f32 / 255.0).clamp(0.0, 1.0);
                let sr = (cu[0] as f32 * a_lin) as u8;
                let sg = (cu[1] as f32 * a_lin) as u8;
                let sb = (cu[2] as f32 * a_lin) as u8;
                let sa = (a_lin * 255.0) as u8;

                let Some(src) = PremultipliedColorU8::from_rgba(sr, sg, sb, sa) else {
                    return;
                };
                let bg = dst[i];

                // Porter-Duff over in premultiplied space
                let inv = 1.0 - (sa as f32 / 255.0);
                let r = src.red().saturating_add((bg.red() as f32 * inv) as u8);
                let g2 = src.green().saturating_add((bg.green() as f32 * inv) as u8);
                let b2 = src.blue().saturating_add((bg.blue() as f32 * inv) as u8);
                let a = src.alpha().saturating_add((bg.alpha() as f32 * inv) as u8);

                if let Some(px) = PremultipliedColorU8::from_rgba(r, g2, b2, a) {
                    dst[i] = px;
                }
            });
        }
    }

    pm
}

/// Rasterize a paragraph: wrapped when `max_width` is given, hard line
/// breaks otherwise, lines centered on each other.
pub fn render_paragraph_pixmap(
    text: &str,
    font_size: f32,
    font: &FontArc,
    color: Color,
    max_width: Option<f32>,
) -> Pixmap {
    let lines = match max_width {
        Some(w) => wrap_lines(font, font_size, text, w),
        None => text.split('\n').map(str::to_string).collect(),
    };

    let sf = font.as_scaled(PxScale::from(font_size));
    let line_height = (sf.ascent() - sf.descent() + sf.line_gap()).ceil().max(1.0);

    let line_pixmaps: Vec<Option<Pixmap>> = lines
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                None
            } else {
                Some(render_text_pixmap(line, font_size, font, color))
            }
        })
        .collect();

    let total_w = line_pixmaps
        .iter()
        .flatten()
        .map(|pm| pm.width())
        .max()
        .unwrap_or(1)
        .max(1);
    let total_h = ((lines.len().max(1) as f32) * line_height).ceil() as u32;

    let mut out = Pixmap::new(total_w, total_h).expect("pixmap");
    for (i, pm) in line_pixmaps.iter().enumerate() {
        let Some(pm) = pm else { continue };
        let x = ((total_w - pm.width()) / 2) as i32;
        let y = (i as f32 * line_height) as i32;
        out.draw_pixmap(
            x,
            y,
            pm.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }
    out
}

/// Solid opaque pixmap, used by tests and benches as a stand-in glyph.
pub fn solid_pixmap(width: u32, height: u32, color: [u8; 4]) -> Pixmap {
    let mut pm = Pixmap::new(width.max(1), height.max(1)).expect("pixmap");
    let mut paint = Paint::default();
    paint.anti_alias = false;
    paint.set_color(Color::from_rgba8(color[0], color[1], color[2], color[3]));
    if let Some(rect) = Rect::from_xywh(0.0, 0.0, pm.width() as f32, pm.height() as f32) {
        pm.fill_rect(rect, &paint, Transform::identity(), None);
    }
    pm
}
