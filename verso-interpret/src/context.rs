//! The interpreter context: graphics state stack, path builder and the
//! bookkeeping shared by one (possibly recursive) page rendition.

use std::sync::Arc;

use kurbo::{Affine, BezPath, Point};
use log::warn;

use crate::InterpreterSettings;
use crate::clip::ClipRegion;
use crate::coords::PageGeometry;
use crate::device::Device;
use crate::error::{InterpreterWarning, StructuralError};
use crate::interpret::state::State;
use crate::paint::FillRule;
use crate::session::Session;

/// The mutable heart of one page rendition.
///
/// Nested renditions (forms, soft-mask groups, annotation appearances)
/// get their own `Context`; only the [`Session`] is shared.
pub struct Context {
    states: Vec<State>,
    path: BezPath,
    sub_path_start: Point,
    last_point: Point,
    pending_clip: Option<FillRule>,
    root_transforms: Vec<Affine>,
    last_device_clip: Option<u128>,
    pub(crate) geometry: PageGeometry,
    pub(crate) session: Session,
    pub(crate) settings: InterpreterSettings,
}

impl Context {
    /// Create a context for a page.
    pub fn new(geometry: PageGeometry, session: Session, settings: InterpreterSettings) -> Self {
        let initial_transform = geometry.base_transform();
        let clip = ClipRegion::page(geometry.device_rect());

        Self::new_with(geometry, session, settings, initial_transform, clip)
    }

    pub(crate) fn new_with(
        geometry: PageGeometry,
        session: Session,
        settings: InterpreterSettings,
        initial_transform: Affine,
        clip: Arc<ClipRegion>,
    ) -> Self {
        Self {
            states: vec![State::new(initial_transform, clip)],
            path: BezPath::new(),
            sub_path_start: Point::default(),
            last_point: Point::default(),
            pending_clip: None,
            root_transforms: vec![initial_transform],
            last_device_clip: None,
            geometry,
            session,
            settings,
        }
    }

    pub(crate) fn save_state(&mut self) {
        let cur = self
            .states
            .last()
            .cloned()
            .expect("context always holds at least one state");
        self.states.push(cur);
    }

    /// Pop one state. Fails when the pop would remove the root state: a
    /// stray restore indicates a malformed stream, and silently ignoring
    /// it would desynchronize everything that follows.
    pub(crate) fn restore_state(&mut self) -> Result<(), StructuralError> {
        if self.states.len() > 1 {
            self.states.pop();
            Ok(())
        } else {
            Err(StructuralError::UnbalancedRestore)
        }
    }

    pub(crate) fn num_states(&self) -> usize {
        self.states.len()
    }

    pub(crate) fn get(&self) -> &State {
        self.states.last().unwrap()
    }

    pub(crate) fn get_mut(&mut self) -> &mut State {
        self.states.last_mut().unwrap()
    }

    pub(crate) fn path(&self) -> &BezPath {
        &self.path
    }

    pub(crate) fn path_mut(&mut self) -> &mut BezPath {
        &mut self.path
    }

    pub(crate) fn sub_path_start(&self) -> Point {
        self.sub_path_start
    }

    pub(crate) fn set_sub_path_start(&mut self, p: Point) {
        self.sub_path_start = p;
    }

    pub(crate) fn last_point(&self) -> Point {
        self.last_point
    }

    pub(crate) fn set_last_point(&mut self, p: Point) {
        self.last_point = p;
    }

    pub(crate) fn pending_clip(&self) -> Option<FillRule> {
        self.pending_clip
    }

    pub(crate) fn set_pending_clip(&mut self, rule: Option<FillRule>) {
        self.pending_clip = rule;
    }

    pub(crate) fn pre_concat_transform(&mut self, transform: Affine) {
        self.get_mut().ctm *= transform;
    }

    /// The transform of the space patterns are anchored in: the CTM at
    /// the entry of the innermost form, not at the paint site.
    pub(crate) fn root_transform(&self) -> Affine {
        self.root_transforms
            .last()
            .copied()
            .unwrap_or(Affine::IDENTITY)
    }

    pub(crate) fn push_root_transform(&mut self) {
        self.root_transforms.push(self.get().ctm);
    }

    pub(crate) fn pop_root_transform(&mut self) {
        if self.root_transforms.len() > 1 {
            self.root_transforms.pop();
        } else {
            warn!("attempted to pop the page root transform");
        }
    }

    /// Shrink the current clip region by a device-space path.
    pub(crate) fn intersect_clip(&mut self, path: BezPath, rule: FillRule) {
        let state = self.get_mut();
        state.clip = state.clip.intersect(path, rule);
    }

    /// Push the current clip to the device if it differs from the one
    /// last applied. Identity is tracked here: some devices hand out
    /// fresh objects on every query, so asking them is useless.
    pub(crate) fn sync_clip(&mut self, device: &mut impl Device) {
        let clip = self.get().clip.clone();
        if self.last_device_clip != Some(clip.key()) {
            device.set_clip(&clip);
            self.last_device_clip = Some(clip.key());
        }
    }

    /// Report degraded output through the warning sink and the log.
    pub(crate) fn warn(&self, warning: InterpreterWarning) {
        warn!("{warning:?}");
        (self.settings.warning_sink)(warning);
    }
}
