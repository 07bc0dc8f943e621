//! Vehicle plannings.

use ms_core::{RequestId, StopPointId};

use crate::{Leg, Stop, UserStopRef};

/// Ordered stops a vehicle intends to execute.
pub type Planning = Vec<Stop>;

/// Index of the first occurrence of `stop` in `planning`.
pub fn position_of_user_stop(planning: &[Stop], stop: UserStopRef) -> Option<usize> {
    planning.iter().position(|s| s.user_ref() == Some(stop))
}

/// `true` if `planning` visits the stop point `id`.
pub fn visits_point(planning: &[Stop], id: &StopPointId) -> bool {
    planning.iter().any(|s| matches!(s, Stop::Point { id: p, .. } if p == id))
}

/// Remove every stop of `request` from `planning`, keeping the dropoff when
/// `keep_dropoff` is set.  Returns the number of removed stops.
pub fn purge_request(planning: &mut Planning, request: RequestId, keep_dropoff: bool) -> usize {
    let before = planning.len();
    planning.retain(|s| match s.user_ref() {
        Some(r) if r.request == request => keep_dropoff && r.leg == Leg::Dropoff,
        _ => true,
    });
    before - planning.len()
}

/// Remove one stop from `planning` (first matching occurrence).
pub fn remove_stop(planning: &mut Planning, stop: &Stop) -> bool {
    match planning.iter().position(|s| s == stop) {
        Some(i) => {
            planning.remove(i);
            true
        }
        None => false,
    }
}
