//! One output deck under construction.

use super::inject::{inject_slide, InjectOutcome, SlideRecord, SlideRequest};
use super::patch::finalize;
use super::skeleton::skeleton;
use super::state::RunState;
use crate::container::Package;
use crate::error::Result;

/// Template, output package and run state for one output file.
///
/// ```no_run
/// use reportdeck::{DeckBuilder, Package, Position, SlideRequest};
///
/// let template = Package::open("template.pptx")?;
/// let mut deck = DeckBuilder::from_template(&template)?;
/// deck.inject(&SlideRequest::new(1, Position::Start))?;
/// let (output, _slides) = deck.finish()?;
/// output.write_to("report.pptx")?;
/// # Ok::<(), reportdeck::Error>(())
/// ```
#[derive(Debug)]
pub struct DeckBuilder<'t> {
    template: &'t Package,
    output: Package,
    state: RunState,
}

impl<'t> DeckBuilder<'t> {
    /// Inject into an existing deck.
    pub fn new(template: &'t Package, output: Package) -> Result<Self> {
        let state = RunState::new(&output)?;
        Ok(Self {
            template,
            output,
            state,
        })
    }

    /// Inject into a slide-free copy of the template, reusing its layouts,
    /// masters, themes and media instead of cloning them again.
    pub fn from_template(template: &'t Package) -> Result<Self> {
        Self::from_skeleton(template, skeleton(template)?)
    }

    /// Like [`DeckBuilder::from_template`] with a skeleton built earlier,
    /// so batches strip the template only once.
    pub fn from_skeleton(template: &'t Package, output: Package) -> Result<Self> {
        let mut state = RunState::new(&output)?;
        state.clones.adopt_shared(template, &output);
        Ok(Self {
            template,
            output,
            state,
        })
    }

    /// Copy one template slide.
    pub fn inject(&mut self, request: &SlideRequest) -> Result<InjectOutcome> {
        inject_slide(self.template, &mut self.output, &mut self.state, request)
    }

    /// Slides injected so far.
    pub fn pending(&self) -> &[SlideRecord] {
        &self.state.pending
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Finalize the presentation and hand back the package with the
    /// records of every injected slide.
    pub fn finish(mut self) -> Result<(Package, Vec<SlideRecord>)> {
        let records = finalize(&mut self.output, &mut self.state)?;
        Ok((self.output, records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::fixtures;
    use crate::deck::inject::Position;
    use crate::rels;

    #[test]
    fn test_from_template_reuses_shared_parts() {
        let template = fixtures::template();
        let mut deck = DeckBuilder::from_template(&template).unwrap();
        deck.inject(&SlideRequest::new(1, Position::Start)).unwrap();
        deck.inject(&SlideRequest::new(7, Position::End)).unwrap();
        assert_eq!(deck.pending().len(), 2);
        let (output, records) = deck.finish().unwrap();

        assert!(!output.contains("ppt/slideMasters/slideMaster2.xml"));
        assert!(!output.contains("ppt/slideLayouts/slideLayout3.xml"));
        let closing = &records[1].part_name;
        let closing_rels =
            rels::parse(output.get_text(&rels::rels_path_for(closing)).unwrap()).unwrap();
        assert_eq!(closing_rels[0].target, "../slideLayouts/slideLayout1.xml");

        // Media removed from the skeleton is cloned back under a new name.
        let image = closing_rels.iter().find(|r| r.id == "rId2").unwrap();
        let media = rels::resolve(closing, &image.target);
        assert!(media.starts_with("ppt/media/template_media_"));
        assert!(output.contains(&media));
    }

    #[test]
    fn test_round_trip_through_bytes() {
        let template = fixtures::template();
        let mut deck = DeckBuilder::new(&template, fixtures::base_deck(&[256])).unwrap();
        deck.inject(&SlideRequest::new(6, Position::End)).unwrap();
        let (output, _) = deck.finish().unwrap();

        let bytes = output.serialize().unwrap();
        let reopened = Package::from_bytes(&bytes).unwrap();
        assert_eq!(
            reopened.get_text("ppt/presentation.xml"),
            output.get_text("ppt/presentation.xml")
        );
        assert_eq!(output.serialize().unwrap(), bytes);
    }
}
