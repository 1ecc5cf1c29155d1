use super::repo::AreaRepository;
use super::schema::{Area, AreaError, AreaInput, AreaRejection, DraftArea, SubmitOutcome};
use crate::conf::Conf;
use crate::geofence::GeoPoint;
use geo::{Distance, Haversine, Point};
use std::sync::Mutex;
use tracing::{info, warn};

#[derive(PartialEq, Eq, Debug, Clone, Copy, strum::Display)]
pub enum FlowState {
    Idle,
    AdjustingRadius,
    Confirming,
    Submitting,
}

/// Orchestrates the two-phase create/edit flow for watch areas.
///
/// One instance per map session, owned by the screen that renders the flow.
/// It exclusively owns the draft and the cached area list; the UI reads both
/// through accessors and mutates neither directly. The flow is
/// `Idle → AdjustingRadius → Confirming → Submitting`, with cancel semantics
/// that differ per state: cancel from Confirming steps back to
/// AdjustingRadius keeping the draft, only cancel from AdjustingRadius
/// destroys it.
pub struct AreaLifecycleController<R: AreaRepository> {
    repo: R,
    conf: Conf,
    flow: Mutex<Flow>,
}

#[derive(Debug)]
struct Flow {
    state: FlowState,
    draft: Option<DraftArea>,
    areas: Vec<Area>,
    // True while a delete is awaited, keeps submits out in the meantime
    deleting: bool,
}

impl<R: AreaRepository> AreaLifecycleController<R> {
    pub fn new(repo: R, conf: Conf) -> Self {
        AreaLifecycleController {
            repo,
            conf,
            flow: Mutex::new(Flow {
                state: FlowState::Idle,
                draft: None,
                areas: vec![],
                deleting: false,
            }),
        }
    }

    pub fn state(&self) -> FlowState {
        self.flow.lock().unwrap().state
    }

    pub fn draft(&self) -> Option<DraftArea> {
        self.flow.lock().unwrap().draft.clone()
    }

    pub fn areas(&self) -> Vec<Area> {
        self.flow.lock().unwrap().areas.clone()
    }

    /// Replaces the cached area list wholesale. On failure the previous
    /// cache, the draft and the flow state are all left untouched.
    pub async fn refresh_areas(&self) -> Result<(), AreaError> {
        match self.repo.list_areas().await {
            Ok(areas) => {
                info!(count = areas.len(), "Refreshed area list");
                self.flow.lock().unwrap().areas = areas;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Area list refresh failed, keeping cached data");
                Err(e)
            }
        }
    }

    /// Starts the creation flow with a draft at the given center (usually the
    /// current viewport center) and the default radius. Refused while another
    /// flow is active, only one draft may exist.
    pub fn start_create(&self, center: GeoPoint) -> bool {
        let mut flow = self.flow.lock().unwrap();
        if flow.state != FlowState::Idle {
            warn!(state = %flow.state, "Refusing to start create, flow already active");
            return false;
        }
        flow.draft = Some(DraftArea {
            center,
            radius_meters: self.conf.default_radius_meters,
            editing_area_id: None,
        });
        flow.state = FlowState::AdjustingRadius;
        true
    }

    /// Starts the edit flow for a cached area, copying its center and radius
    /// into the draft.
    pub fn start_edit(&self, area_id: &str) -> bool {
        let mut flow = self.flow.lock().unwrap();
        if flow.state != FlowState::Idle {
            warn!(state = %flow.state, "Refusing to start edit, flow already active");
            return false;
        }
        let Some(area) = flow.areas.iter().find(|it| it.id == area_id) else {
            warn!(area_id, "Refusing to edit unknown area");
            return false;
        };
        let draft = DraftArea {
            center: area.center(),
            radius_meters: area.radius_meters,
            editing_area_id: Some(area.id.clone()),
        };
        flow.draft = Some(draft);
        flow.state = FlowState::AdjustingRadius;
        true
    }

    /// Map taps reposition the draft, but only while the radius is being
    /// adjusted and a draft actually exists.
    pub fn set_draft_center(&self, center: GeoPoint) {
        let mut flow = self.flow.lock().unwrap();
        if flow.state != FlowState::AdjustingRadius {
            return;
        }
        if let Some(draft) = &mut flow.draft {
            draft.center = center;
        }
    }

    /// Clamps into the configured radius range.
    pub fn set_draft_radius(&self, radius_meters: f64) {
        let mut flow = self.flow.lock().unwrap();
        if flow.state != FlowState::AdjustingRadius {
            return;
        }
        if let Some(draft) = &mut flow.draft {
            draft.radius_meters =
                radius_meters.clamp(self.conf.min_radius_meters, self.conf.max_radius_meters);
        }
    }

    /// Placement confirmed, move on to the name/address step.
    pub fn confirm_placement(&self) -> bool {
        let mut flow = self.flow.lock().unwrap();
        if flow.state != FlowState::AdjustingRadius || flow.draft.is_none() {
            return false;
        }
        flow.state = FlowState::Confirming;
        true
    }

    /// From Confirming this steps back to AdjustingRadius with the draft
    /// intact. From AdjustingRadius it destroys the draft and returns to
    /// Idle. A no-op while a submit is in flight.
    pub fn cancel(&self) {
        let mut flow = self.flow.lock().unwrap();
        match flow.state {
            FlowState::Confirming => flow.state = FlowState::AdjustingRadius,
            FlowState::AdjustingRadius => {
                flow.draft = None;
                flow.state = FlowState::Idle;
            }
            FlowState::Idle | FlowState::Submitting => {}
        }
    }

    /// Submits the confirmed draft. Exactly one network call per confirmed
    /// flow: a second submit while one is in flight returns
    /// [`SubmitOutcome::Ignored`] without queueing. Client-side checks (name,
    /// duplicate separation, create quota) run before any network call. On
    /// success the draft is destroyed and the caller should refresh the area
    /// list; on failure the flow returns to Confirming with the draft
    /// preserved so the user can retry.
    pub async fn submit(&self, name: &str, address_text: Option<String>) -> SubmitOutcome {
        let (input, editing_area_id) = {
            let mut flow = self.flow.lock().unwrap();
            if flow.state != FlowState::Confirming {
                warn!(state = %flow.state, "Ignoring submit outside of Confirming");
                return SubmitOutcome::Ignored;
            }
            if flow.deleting {
                warn!("Ignoring submit while a delete is in flight");
                return SubmitOutcome::Ignored;
            }
            let Some(draft) = flow.draft.clone() else {
                warn!("Ignoring submit without a draft");
                return SubmitOutcome::Ignored;
            };
            let name = name.trim();
            if name.is_empty() {
                return SubmitOutcome::Failed(AreaError::Validation {
                    title: "Name required".into(),
                    message: "Give this area a name before saving".into(),
                });
            }
            if let Some(existing) = self.find_duplicate(&flow, &draft) {
                return SubmitOutcome::Failed(AreaError::Duplicate {
                    existing_area_name: existing,
                });
            }
            if draft.editing_area_id.is_none() && flow.areas.len() >= self.conf.max_areas {
                return SubmitOutcome::QuotaExceeded {
                    max_areas: self.conf.max_areas,
                };
            }
            flow.state = FlowState::Submitting;
            (
                AreaInput {
                    name: name.to_owned(),
                    latitude: draft.center.latitude,
                    longitude: draft.center.longitude,
                    radius_meters: draft.radius_meters,
                    address_text,
                },
                draft.editing_area_id,
            )
        };
        let result = match &editing_area_id {
            Some(id) => self.repo.update_area(id, &input).await,
            None => self.repo.create_area(&input).await,
        };
        let mut flow = self.flow.lock().unwrap();
        match result {
            Ok(area) => {
                info!(area_id = %area.id, "Area saved");
                flow.draft = None;
                flow.state = FlowState::Idle;
                SubmitOutcome::Saved(area)
            }
            Err(AreaRejection::Quota { max_areas }) => {
                flow.state = FlowState::Confirming;
                SubmitOutcome::QuotaExceeded { max_areas }
            }
            Err(AreaRejection::Error(e)) => {
                warn!(error = %e, "Area submit failed");
                flow.state = FlowState::Confirming;
                SubmitOutcome::Failed(e)
            }
        }
    }

    /// Deletes a persisted area and drops it from the cache. Refused while a
    /// submit is in flight, and submits are refused while the delete runs.
    pub async fn delete_area(&self, area_id: &str) -> Result<(), AreaError> {
        {
            let mut flow = self.flow.lock().unwrap();
            if flow.state == FlowState::Submitting || flow.deleting {
                return Err(AreaError::Validation {
                    title: "Busy".into(),
                    message: "Another request is still in flight".into(),
                });
            }
            flow.deleting = true;
        }
        let result = self.repo.delete_area(area_id).await;
        let mut flow = self.flow.lock().unwrap();
        flow.deleting = false;
        result?;
        flow.areas.retain(|it| it.id != area_id);
        Ok(())
    }

    // Cached areas closer than the minimum separation count as duplicates.
    // The area currently being edited is exempt from the check.
    fn find_duplicate(&self, flow: &Flow, draft: &DraftArea) -> Option<String> {
        flow.areas
            .iter()
            .filter(|it| draft.editing_area_id.as_deref() != Some(it.id.as_str()))
            .find(|it| {
                separation_meters(&draft.center, &it.center()) < self.conf.min_separation_meters
            })
            .map(|it| it.name.clone())
    }
}

fn separation_meters(a: &GeoPoint, b: &GeoPoint) -> f64 {
    Haversine::distance(
        Point::new(a.longitude, a.latitude),
        Point::new(b.longitude, b.latitude),
    )
}

#[cfg(test)]
mod test {
    use super::{AreaLifecycleController, FlowState};
    use crate::area::{AreaError, AreaRejection, SubmitOutcome};
    use crate::conf::Conf;
    use crate::geofence::GeoPoint;
    use crate::test::{mock_area, MockAreaRepository};

    fn point(latitude: f64, longitude: f64) -> GeoPoint {
        GeoPoint {
            latitude,
            longitude,
        }
    }

    fn controller() -> AreaLifecycleController<MockAreaRepository> {
        AreaLifecycleController::new(MockAreaRepository::default(), Conf::default())
    }

    #[tokio::test]
    async fn create_flow_submits_latest_draft() {
        let repo = MockAreaRepository::default();
        let controller = AreaLifecycleController::new(repo.clone(), Conf::default());
        assert!(controller.start_create(point(52.0, 4.9)));
        assert_eq!(FlowState::AdjustingRadius, controller.state());
        controller.set_draft_radius(50.0);
        controller.set_draft_radius(150.0);
        controller.set_draft_center(point(52.1, 5.0));
        assert!(controller.confirm_placement());
        let outcome = controller.submit("Home", Some("Canal street 1".into())).await;
        assert!(matches!(outcome, SubmitOutcome::Saved(_)));
        assert_eq!(FlowState::Idle, controller.state());
        assert!(controller.draft().is_none());
        let calls = repo.create_calls();
        assert_eq!(1, calls.len());
        assert_eq!("Home", calls[0].name);
        assert_eq!(52.1, calls[0].latitude);
        assert_eq!(5.0, calls[0].longitude);
        assert_eq!(150.0, calls[0].radius_meters);
        assert_eq!(Some("Canal street 1".into()), calls[0].address_text);
    }

    #[test]
    fn radius_clamps_to_configured_range() {
        let controller = controller();
        controller.start_create(point(52.0, 4.9));
        controller.set_draft_radius(10.0);
        assert_eq!(50.0, controller.draft().unwrap().radius_meters);
        controller.set_draft_radius(9_999.0);
        assert_eq!(150.0, controller.draft().unwrap().radius_meters);
    }

    #[test]
    fn single_flow_invariant() {
        let controller = controller();
        assert!(controller.start_create(point(52.0, 4.9)));
        assert!(!controller.start_create(point(53.0, 6.0)));
        assert!(!controller.start_edit("a1"));
        assert_eq!(point(52.0, 4.9), controller.draft().unwrap().center);
    }

    #[test]
    fn cancel_from_confirming_keeps_draft() {
        let controller = controller();
        controller.start_create(point(52.0, 4.9));
        controller.confirm_placement();
        controller.cancel();
        assert_eq!(FlowState::AdjustingRadius, controller.state());
        assert!(controller.draft().is_some());
        controller.cancel();
        assert_eq!(FlowState::Idle, controller.state());
        assert!(controller.draft().is_none());
    }

    #[test]
    fn center_taps_ignored_outside_adjusting() {
        let controller = controller();
        controller.start_create(point(52.0, 4.9));
        controller.confirm_placement();
        controller.set_draft_center(point(1.0, 1.0));
        assert_eq!(point(52.0, 4.9), controller.draft().unwrap().center);
    }

    #[tokio::test]
    async fn empty_name_fails_validation_without_network_call() {
        let repo = MockAreaRepository::default();
        let controller = AreaLifecycleController::new(repo.clone(), Conf::default());
        controller.start_create(point(52.0, 4.9));
        controller.confirm_placement();
        let outcome = controller.submit("   ", None).await;
        assert!(matches!(
            outcome,
            SubmitOutcome::Failed(AreaError::Validation { .. })
        ));
        assert_eq!(FlowState::Confirming, controller.state());
        assert!(repo.create_calls().is_empty());
    }

    #[tokio::test]
    async fn nearby_cached_area_fails_duplicate_precheck() {
        let repo = MockAreaRepository::default();
        repo.set_areas(vec![mock_area("a1", "Home", 52.0, 4.9)]);
        let controller = AreaLifecycleController::new(repo.clone(), Conf::default());
        controller.refresh_areas().await.unwrap();
        controller.start_create(point(52.0001, 4.9001));
        controller.confirm_placement();
        let draft_before = controller.draft().unwrap();
        let outcome = controller.submit("Work", None).await;
        assert_eq!(
            SubmitOutcome::Failed(AreaError::Duplicate {
                existing_area_name: "Home".into()
            }),
            outcome
        );
        assert_eq!(FlowState::Confirming, controller.state());
        assert_eq!(draft_before, controller.draft().unwrap());
        assert!(repo.create_calls().is_empty());
    }

    #[tokio::test]
    async fn duplicate_from_repository_preserves_draft() {
        let repo = MockAreaRepository::default();
        repo.push_create_response(
            0,
            Err(AreaRejection::Error(AreaError::Duplicate {
                existing_area_name: "Home".into(),
            })),
        );
        let controller = AreaLifecycleController::new(repo.clone(), Conf::default());
        controller.start_create(point(52.0, 4.9));
        controller.confirm_placement();
        let draft_before = controller.draft().unwrap();
        let outcome = controller.submit("Work", None).await;
        assert_eq!(
            SubmitOutcome::Failed(AreaError::Duplicate {
                existing_area_name: "Home".into()
            }),
            outcome
        );
        assert_eq!(FlowState::Confirming, controller.state());
        assert_eq!(draft_before, controller.draft().unwrap());
    }

    #[tokio::test]
    async fn network_failure_preserves_draft() {
        let repo = MockAreaRepository::default();
        repo.push_create_response(
            0,
            Err(AreaRejection::Error(AreaError::Network {
                title: "Connection failed".into(),
                message: "timeout".into(),
            })),
        );
        let controller = AreaLifecycleController::new(repo.clone(), Conf::default());
        controller.start_create(point(52.0, 4.9));
        controller.confirm_placement();
        let outcome = controller.submit("Work", None).await;
        assert!(matches!(
            outcome,
            SubmitOutcome::Failed(AreaError::Network { .. })
        ));
        assert_eq!(FlowState::Confirming, controller.state());
        assert!(controller.draft().is_some());
    }

    #[tokio::test]
    async fn quota_refuses_sixth_area_without_network_call() {
        let repo = MockAreaRepository::default();
        repo.set_areas(
            (0..5)
                .map(|i| mock_area(&format!("a{}", i), &format!("Area {}", i), 10.0 * i as f64, 0.0))
                .collect(),
        );
        let controller = AreaLifecycleController::new(repo.clone(), Conf::default());
        controller.refresh_areas().await.unwrap();
        controller.start_create(point(80.0, 80.0));
        controller.confirm_placement();
        let outcome = controller.submit("One too many", None).await;
        assert_eq!(SubmitOutcome::QuotaExceeded { max_areas: 5 }, outcome);
        assert_eq!(FlowState::Confirming, controller.state());
        assert!(controller.draft().is_some());
        assert!(repo.create_calls().is_empty());
    }

    #[tokio::test]
    async fn edit_flow_updates_and_bypasses_quota() {
        let repo = MockAreaRepository::default();
        repo.set_areas(
            (0..5)
                .map(|i| mock_area(&format!("a{}", i), &format!("Area {}", i), 10.0 * i as f64, 0.0))
                .collect(),
        );
        let controller = AreaLifecycleController::new(repo.clone(), Conf::default());
        controller.refresh_areas().await.unwrap();
        assert!(controller.start_edit("a2"));
        let draft = controller.draft().unwrap();
        assert_eq!(point(20.0, 0.0), draft.center);
        assert_eq!(Some("a2".into()), draft.editing_area_id);
        // Keeping the old center must not trip the duplicate check on itself
        controller.set_draft_radius(120.0);
        controller.confirm_placement();
        let outcome = controller.submit("Area 2 renamed", None).await;
        assert!(matches!(outcome, SubmitOutcome::Saved(_)));
        let updates = repo.update_calls();
        assert_eq!(1, updates.len());
        assert_eq!("a2", updates[0].0);
        assert_eq!(120.0, updates[0].1.radius_meters);
        assert!(repo.create_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_submit_is_ignored() {
        let repo = MockAreaRepository::default();
        repo.push_create_response(5_000, Ok(mock_area("a1", "Home", 52.0, 4.9)));
        let controller = AreaLifecycleController::new(repo.clone(), Conf::default());
        controller.start_create(point(52.0, 4.9));
        controller.confirm_placement();
        let (first, second) = tokio::join!(
            controller.submit("Home", None),
            controller.submit("Home", None),
        );
        assert!(matches!(first, SubmitOutcome::Saved(_)));
        assert_eq!(SubmitOutcome::Ignored, second);
        assert_eq!(1, repo.create_calls().len());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_refused_while_submit_in_flight() {
        let repo = MockAreaRepository::default();
        repo.push_create_response(5_000, Ok(mock_area("a1", "Home", 52.0, 4.9)));
        let controller = AreaLifecycleController::new(repo.clone(), Conf::default());
        controller.start_create(point(52.0, 4.9));
        controller.confirm_placement();
        let (outcome, deleted) = tokio::join!(
            controller.submit("Home", None),
            controller.delete_area("a9"),
        );
        assert!(matches!(outcome, SubmitOutcome::Saved(_)));
        assert!(matches!(
            deleted,
            Err(AreaError::Validation { .. })
        ));
        assert!(repo.delete_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn submit_ignored_while_delete_in_flight() {
        let repo = MockAreaRepository::default();
        repo.set_areas(vec![mock_area("a1", "Home", 52.0, 4.9)]);
        repo.push_delete_response(5_000, Ok(()));
        let controller = AreaLifecycleController::new(repo.clone(), Conf::default());
        controller.refresh_areas().await.unwrap();
        controller.start_create(point(10.0, 10.0));
        controller.confirm_placement();
        let (deleted, outcome) = tokio::join!(
            controller.delete_area("a1"),
            controller.submit("Work", None),
        );
        assert!(deleted.is_ok());
        assert_eq!(SubmitOutcome::Ignored, outcome);
        assert!(repo.create_calls().is_empty());
        assert!(controller.areas().is_empty());
    }

    #[tokio::test]
    async fn submit_outside_confirming_is_ignored() {
        let controller = controller();
        assert_eq!(SubmitOutcome::Ignored, controller.submit("Home", None).await);
        controller.start_create(point(52.0, 4.9));
        assert_eq!(SubmitOutcome::Ignored, controller.submit("Home", None).await);
    }

    #[tokio::test]
    async fn refresh_failure_keeps_cached_areas() {
        let repo = MockAreaRepository::default();
        repo.set_areas(vec![mock_area("a1", "Home", 52.0, 4.9)]);
        let controller = AreaLifecycleController::new(repo.clone(), Conf::default());
        controller.refresh_areas().await.unwrap();
        assert_eq!(1, controller.areas().len());
        repo.fail_next_list(AreaError::Network {
            title: "Connection failed".into(),
            message: "offline".into(),
        });
        assert!(controller.refresh_areas().await.is_err());
        assert_eq!(1, controller.areas().len());
    }

    #[tokio::test]
    async fn delete_drops_area_from_cache() {
        let repo = MockAreaRepository::default();
        repo.set_areas(vec![
            mock_area("a1", "Home", 52.0, 4.9),
            mock_area("a2", "Work", 53.0, 6.0),
        ]);
        let controller = AreaLifecycleController::new(repo.clone(), Conf::default());
        controller.refresh_areas().await.unwrap();
        controller.delete_area("a1").await.unwrap();
        let areas = controller.areas();
        assert_eq!(1, areas.len());
        assert_eq!("a2", areas[0].id);
        assert_eq!(vec!["a1".to_string()], repo.delete_calls());
    }
}
