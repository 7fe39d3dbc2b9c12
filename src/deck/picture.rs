//! Fitting a replacement image into a template picture frame.

use crate::xmltext::{self, find_element, find_elements, start_tags};
use std::io::Cursor;

/// Pixel dimensions of encoded image bytes, if the format is recognised.
pub fn image_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::io::Reader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Frame geometry in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

impl Frame {
    /// Largest frame of the image's aspect ratio centred inside `self`.
    pub fn fit(self, width: u32, height: u32) -> Frame {
        if width == 0 || height == 0 || self.cx <= 0 || self.cy <= 0 {
            return self;
        }
        let image_ratio = width as f64 / height as f64;
        let frame_ratio = self.cx as f64 / self.cy as f64;
        if frame_ratio > image_ratio {
            let cx = (self.cy as f64 * image_ratio).round() as i64;
            Frame {
                x: self.x + (self.cx - cx) / 2,
                cx,
                ..self
            }
        } else {
            let cy = (self.cx as f64 / image_ratio).round() as i64;
            Frame {
                y: self.y + (self.cy - cy) / 2,
                cy,
                ..self
            }
        }
    }
}

/// Resize every `<p:pic>` embedding `rel_id` so an image of the given
/// pixel size keeps its aspect ratio inside the original frame.
///
/// Pictures without an explicit `<a:xfrm>` inherit geometry from the
/// layout and are left alone.
pub fn fit_picture(xml: &str, rel_id: &str, (width, height): (u32, u32)) -> String {
    let mut out = xml.to_string();

    for pic in find_elements(xml, "pic").iter().rev() {
        let body = &xml[pic.open.start..pic.end];
        let embeds = start_tags(body, "blip")
            .iter()
            .any(|t| t.attr("r:embed") == Some(rel_id));
        if !embeds {
            continue;
        }
        let Some(xfrm) = find_element(body, "xfrm") else {
            continue;
        };
        let xfrm_text = &body[xfrm.open.start..xfrm.end];
        let Some(fitted) = refit_xfrm(xfrm_text, width, height) else {
            continue;
        };
        let start = pic.open.start + xfrm.open.start;
        let end = pic.open.start + xfrm.end;
        out = xmltext::splice(&out, start, end, &fitted);
    }

    out
}

/// Rewrite the `off`/`ext` children of one `<a:xfrm>` element.
fn refit_xfrm(xfrm: &str, width: u32, height: u32) -> Option<String> {
    let off = *start_tags(xfrm, "off").first()?;
    let ext = *start_tags(xfrm, "ext").first()?;
    let number = |tag: &xmltext::Tag<'_>, name: &str| tag.attr(name)?.trim().parse::<i64>().ok();

    let frame = Frame {
        x: number(&off, "x")?,
        y: number(&off, "y")?,
        cx: number(&ext, "cx")?,
        cy: number(&ext, "cy")?,
    };
    let fitted = frame.fit(width, height);
    if fitted == frame {
        return None;
    }

    let new_off = format!(r#"<{}off x="{}" y="{}"/>"#, off.prefix(), fitted.x, fitted.y);
    let new_ext = format!(r#"<{}ext cx="{}" cy="{}"/>"#, ext.prefix(), fitted.cx, fitted.cy);
    let mut edits = [(off.start, off.end, new_off), (ext.start, ext.end, new_ext)];
    edits.sort_by_key(|(start, _, _)| std::cmp::Reverse(*start));

    let mut text = xfrm.to_string();
    for (start, end, replacement) in &edits {
        text = xmltext::splice(&text, *start, *end, replacement);
    }
    Some(text)
}
