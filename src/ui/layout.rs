//! Layout synchronization between the placeholder region and the map view
//!
//! Keeps the native view congruent with the region the web layer reports.
//! A region is converted with a single density sample and applied to the
//! view in one relayout. Regions reported before the map is ready are held
//! back and replayed once it is.

use tracing::debug;

use crate::domain::coords::{self, Density, NativeFrame};
use crate::domain::core::Region;
use crate::platform::map_sdk::MapView;

/// Outcome of a region request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutOutcome {
    Applied(NativeFrame),
    Queued,
}

/// Tracks the current placeholder region and what was last applied
#[derive(Debug, Default)]
pub struct LayoutSynchronizer {
    /// Last region requested by the web layer, verbatim
    region: Option<Region>,
    /// Set while a region waits for the map to become ready
    pending: bool,
    /// Frame most recently pushed to the view
    applied: Option<NativeFrame>,
}

impl LayoutSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a region and apply it when the view can take it
    ///
    /// `view` is `None` while the surface is not ready yet.
    pub fn apply_region(
        &mut self,
        region: Region,
        density: Density,
        view: Option<&mut dyn MapView>,
    ) -> LayoutOutcome {
        self.region = Some(region);

        match view {
            Some(view) => LayoutOutcome::Applied(self.push_frame(region, density, view)),
            None => {
                debug!(?region, "map not ready, layout queued");
                self.pending = true;
                LayoutOutcome::Queued
            }
        }
    }

    /// Apply a queued region once the map reports ready
    pub fn replay(&mut self, density: Density, view: &mut dyn MapView) -> Option<NativeFrame> {
        if !self.pending {
            return None;
        }
        self.pending = false;

        let region = self.region?;
        debug!(?region, "replaying queued layout");
        Some(self.push_frame(region, density, view))
    }

    fn push_frame(&mut self, region: Region, density: Density, view: &mut dyn MapView) -> NativeFrame {
        let frame = coords::region_to_native(region, density);
        view.apply_frame(frame);
        self.pending = false;
        self.applied = Some(frame);
        frame
    }

    /// The region last requested, in bridge pixels
    pub fn current_region(&self) -> Option<Region> {
        self.region
    }

    pub fn applied_frame(&self) -> Option<NativeFrame> {
        self.applied
    }

    pub fn has_pending(&self) -> bool {
        self.pending
    }

    /// Forget everything; used on surface teardown
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::core::Rect;
    use crate::platform::headless::HeadlessMapView;

    #[test]
    fn applies_scaled_frame_immediately() {
        let mut sync = LayoutSynchronizer::new();
        let mut view = HeadlessMapView::detached();
        let density = Density::new(2.0).unwrap();

        let outcome = sync.apply_region(Region::new(10, 20, 300, 400), density, Some(&mut view));

        let expected = NativeFrame::Rect(Rect::new(20, 40, 600, 800));
        assert_eq!(outcome, LayoutOutcome::Applied(expected));
        assert_eq!(view.frame(), expected);
        assert_eq!(view.relayout_count(), 1);
        assert_eq!(sync.applied_frame(), Some(expected));

        sync.reset();
        assert_eq!(sync.applied_frame(), None);
    }

    #[test]
    fn queues_until_ready_then_replays_latest() {
        let mut sync = LayoutSynchronizer::new();
        let density = Density::new(3.0).unwrap();

        assert_eq!(sync.apply_region(Region::new(0, 0, 10, 10), density, None), LayoutOutcome::Queued);
        assert_eq!(sync.apply_region(Region::new(5, 5, 50, 50), density, None), LayoutOutcome::Queued);
        assert!(sync.has_pending());

        let mut view = HeadlessMapView::detached();
        let frame = sync.replay(density, &mut view);
        assert_eq!(frame, Some(NativeFrame::Rect(Rect::new(15, 15, 150, 150))));
        assert_eq!(view.relayout_count(), 1);
        assert!(!sync.has_pending());

        // Nothing left to replay
        assert_eq!(sync.replay(density, &mut view), None);
    }

    #[test]
    fn region_reported_verbatim_regardless_of_density() {
        let mut sync = LayoutSynchronizer::new();
        let mut view = HeadlessMapView::detached();
        let density = Density::new(2.625).unwrap();

        sync.apply_region(Region::new(10, 20, 300, 400), density, Some(&mut view));
        assert_eq!(sync.current_region(), Some(Region::new(10, 20, 300, 400)));
    }

    #[test]
    fn degenerate_region_fills_parent() {
        let mut sync = LayoutSynchronizer::new();
        let mut view = HeadlessMapView::detached();

        let outcome = sync.apply_region(Region::new(10, 20, 0, 400), Density::UNIT, Some(&mut view));
        assert_eq!(outcome, LayoutOutcome::Applied(NativeFrame::Fill));
    }
}
