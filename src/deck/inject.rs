//! Copying one template slide into the output package.

use super::clone::{AssetCloner, RelContext};
use super::picture::{fit_picture, image_dimensions};
use super::placeholder::{strip_marker, substitute, Placeholders};
use super::state::{presentation_part, RunState};
use crate::container::Package;
use crate::content_types::{extension_for_mime, CT_SLIDE};
use crate::error::{Error, Result};
use crate::rels::{self, RelKind};
use base64::Engine;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Where a new slide lands relative to the presentation's existing slides.
///
/// Variants order the same way the slides end up in the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Position {
    /// Before every existing slide
    Start,
    /// After the existing slides, before `End` slides
    Middle,
    /// After everything else
    End,
}

/// A slide injected in this run, pending integration into the slide list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideRecord {
    /// `N` of the new `slideN.xml`
    pub slide_number: u32,
    /// `<p:sldId id>`, assigned at finalize
    pub slide_id: Option<u32>,
    /// Presentation relationship ID, assigned at finalize
    pub rel_id: Option<String>,
    pub position: Position,
    /// Part name of the new slide
    pub part_name: String,
    /// Template slide number it was copied from
    pub template_slide: u32,
}

/// Image bytes destined for a template picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    /// `data:<mime>;base64,...` URI or bare base64 text
    Inline(String),
    /// Image file on disk
    File(PathBuf),
    /// Raw bytes with their file extension
    Bytes { data: Vec<u8>, extension: String },
}

impl ImagePayload {
    /// Decode the payload into bytes and a lower-case extension.
    pub fn load(&self) -> Result<(Vec<u8>, String)> {
        match self {
            ImagePayload::Inline(text) => decode_inline(text),
            ImagePayload::File(path) => {
                let data = std::fs::read(path)?;
                let extension = match path.extension().and_then(|e| e.to_str()) {
                    Some(ext) => ext.to_ascii_lowercase(),
                    None => sniff_extension(&data)?,
                };
                Ok((data, extension))
            }
            ImagePayload::Bytes { data, extension } => {
                Ok((data.clone(), extension.trim_start_matches('.').to_ascii_lowercase()))
            }
        }
    }
}

fn decode_inline(text: &str) -> Result<(Vec<u8>, String)> {
    let text = text.trim();
    let (mime, encoded) = match text.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| Error::InvalidData("data URI without payload".to_string()))?;
            if !header.ends_with(";base64") {
                return Err(Error::InvalidData(format!("unsupported data URI encoding: {}", header)));
            }
            (Some(header.trim_end_matches(";base64")), data)
        }
        None => (None, text),
    };

    let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let data = base64::engine::general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| Error::InvalidData(format!("invalid base64 image: {}", e)))?;

    let extension = match mime {
        Some(mime) => extension_for_mime(mime)
            .map(String::from)
            .ok_or_else(|| Error::InvalidData(format!("unsupported image type: {}", mime)))?,
        None => sniff_extension(&data)?,
    };
    Ok((data, extension))
}

fn sniff_extension(data: &[u8]) -> Result<String> {
    let format = image::guess_format(data)?;
    format
        .extensions_str()
        .first()
        .map(|ext| ext.to_string())
        .ok_or_else(|| Error::InvalidData("unrecognised image format".to_string()))
}

/// One slide copy request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideRequest {
    /// File number of the template slide (`slideN.xml`)
    pub template_slide: u32,
    pub position: Position,
    pub placeholders: Option<Placeholders>,
    pub image: Option<ImagePayload>,
    /// Marker token removed from the slide text once an image is placed
    pub image_marker: Option<String>,
}

impl SlideRequest {
    pub fn new(template_slide: u32, position: Position) -> Self {
        Self {
            template_slide,
            position,
            placeholders: None,
            image: None,
            image_marker: None,
        }
    }

    pub fn with_placeholders(mut self, values: Placeholders) -> Self {
        self.placeholders = Some(values);
        self
    }

    pub fn with_image(mut self, image: ImagePayload, marker: Option<String>) -> Self {
        self.image = Some(image);
        self.image_marker = marker;
        self
    }
}

/// Result of an injection request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectOutcome {
    Injected(SlideRecord),
    /// The template lacks the requested slide
    Skipped { reason: String },
}

impl InjectOutcome {
    pub fn record(&self) -> Option<&SlideRecord> {
        match self {
            InjectOutcome::Injected(record) => Some(record),
            InjectOutcome::Skipped { .. } => None,
        }
    }

    pub fn is_injected(&self) -> bool {
        matches!(self, InjectOutcome::Injected(_))
    }
}

/// Copy a template slide into the output package.
///
/// The slide's layout chain, media and other parts are cloned through
/// [`AssetCloner`]; the slide itself is only recorded as pending until
/// [`finalize`](super::patch::finalize) lists it in `presentation.xml`.
pub fn inject_slide(
    template: &Package,
    output: &mut Package,
    state: &mut RunState,
    request: &SlideRequest,
) -> Result<InjectOutcome> {
    if state.is_finalized() {
        return Err(Error::InvalidData(
            "cannot inject after the presentation was finalized".to_string(),
        ));
    }

    let template_root = rels::parent_dir(&presentation_part(template)).to_string();
    let source = if template_root.is_empty() {
        format!("slides/slide{}.xml", request.template_slide)
    } else {
        format!("{}/slides/slide{}.xml", template_root, request.template_slide)
    };
    let Some(source_xml) = template.get_text(&source) else {
        let reason = format!("template has no slide {}", request.template_slide);
        warn!(slide = request.template_slide, "{}; skipped", reason);
        return Ok(InjectOutcome::Skipped { reason });
    };

    let slide_number = state.ids.next_slide_number();
    let new_path = state.root_path(&format!("slides/slide{}.xml", slide_number));
    let mut xml = source_xml.to_string();

    state.image_overrides_mut().clear();
    if let Some(image) = &request.image {
        let (bytes, extension) = image.load()?;
        let dimensions = image_dimensions(&bytes);

        let mut cloner = AssetCloner::new(template, output, state);
        let picture_rel = cloner
            .template_rels(&source)?
            .into_iter()
            .find(|r| r.kind() == RelKind::Image && !r.external);
        match picture_rel {
            Some(picture_rel) => {
                let media = cloner.write_media(bytes, &extension, "report_image");
                debug!(slide = %new_path, media = %media, "placed image");
                state.image_overrides_mut().insert(picture_rel.id.clone(), media);
                if let Some(size) = dimensions {
                    xml = fit_picture(&xml, &picture_rel.id, size);
                }
            }
            None => warn!(
                slide = request.template_slide,
                "template slide has no picture to replace; image ignored"
            ),
        }
        if let Some(marker) = &request.image_marker {
            xml = strip_marker(&xml, marker)?;
        }
    }

    if let Some(values) = request.placeholders.as_ref().filter(|v| !v.is_empty()) {
        xml = substitute(&xml, values)?;
    }

    output.put(&new_path, xml);
    state.record_injected(&source, &new_path);

    let ctx = RelContext {
        owner_slide: Some(&new_path),
        template_slide: Some(&source),
        image_overrides: true,
        drop_layouts: false,
    };
    let mut cloner = AssetCloner::new(template, output, state);
    let slide_rels = cloner.clone_rels(&source, &new_path, ctx)?;
    cloner.write_rels(&source, &new_path, &slide_rels);

    state.image_overrides_mut().clear();
    state.register_part(&new_path, CT_SLIDE);

    let record = SlideRecord {
        slide_number,
        slide_id: None,
        rel_id: None,
        position: request.position,
        part_name: new_path,
        template_slide: request.template_slide,
    };
    debug!(
        template_slide = request.template_slide,
        part = %record.part_name,
        position = ?record.position,
        "injected slide"
    );
    state.pending.push(record.clone());
    Ok(InjectOutcome::Injected(record))
}
