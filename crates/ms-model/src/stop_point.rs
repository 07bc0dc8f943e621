//! Shared stop points.

use std::collections::{HashMap, VecDeque};

use ms_core::{NodeId, RequestId, StopPointId, Tick, TripId};

use crate::{Leg, UserStopRef};

/// A fixed named location where many riders board and alight, visited by
/// several trips over the run.
///
/// Scheduled times are kept as per-trip queues because the same trip can
/// visit a stop more than once; each visit consumes the queue head.
#[derive(Clone, Debug)]
pub struct StopPoint {
    pub id:                  StopPointId,
    pub name:                String,
    pub position:            NodeId,
    pub pickups:             Vec<UserStopRef>,
    pub dropoffs:            Vec<UserStopRef>,
    pub arrival:             HashMap<TripId, VecDeque<Tick>>,
    pub departure:           HashMap<TripId, VecDeque<Tick>>,
    pub effective_arrival:   HashMap<TripId, Tick>,
    pub effective_departure: HashMap<TripId, Tick>,
}

impl StopPoint {
    pub fn new(id: StopPointId, name: impl Into<String>, position: NodeId) -> Self {
        Self {
            id,
            name:                name.into(),
            position,
            pickups:             Vec::new(),
            dropoffs:            Vec::new(),
            arrival:             HashMap::new(),
            departure:           HashMap::new(),
            effective_arrival:   HashMap::new(),
            effective_departure: HashMap::new(),
        }
    }

    /// Append one scheduled visit of `trip`.
    pub fn schedule(&mut self, trip: TripId, arrival: Tick, departure: Tick) {
        self.arrival.entry(trip.clone()).or_default().push_back(arrival);
        self.departure.entry(trip).or_default().push_back(departure);
    }

    /// Scheduled arrival of the next visit of `trip`.
    pub fn next_arrival(&self, trip: &TripId) -> Option<Tick> {
        self.arrival.get(trip).and_then(|q| q.front().copied())
    }

    /// Consume the next scheduled visit of `trip`.
    pub fn pop_schedule(&mut self, trip: &TripId) -> Option<(Tick, Tick)> {
        let arrival = self.arrival.get_mut(trip)?.pop_front()?;
        let departure = self.departure.get_mut(trip)?.pop_front()?;
        Some((arrival, departure))
    }

    /// Queue a user stop on the list matching its leg.
    pub fn add_user_stop(&mut self, stop: UserStopRef) {
        match stop.leg {
            Leg::Pickup  => self.pickups.push(stop),
            Leg::Dropoff => self.dropoffs.push(stop),
        }
    }

    pub fn list(&self, leg: Leg) -> &[UserStopRef] {
        match leg {
            Leg::Pickup  => &self.pickups,
            Leg::Dropoff => &self.dropoffs,
        }
    }

    pub fn list_mut(&mut self, leg: Leg) -> &mut Vec<UserStopRef> {
        match leg {
            Leg::Pickup  => &mut self.pickups,
            Leg::Dropoff => &mut self.dropoffs,
        }
    }

    /// Remove one queued user stop.  Returns `false` if it was not queued.
    pub fn remove_user_stop(&mut self, stop: UserStopRef) -> bool {
        let list = self.list_mut(stop.leg);
        match list.iter().position(|&s| s == stop) {
            Some(i) => {
                list.remove(i);
                true
            }
            None => false,
        }
    }

    /// Drop every queued stop of `request`, keeping the dropoff when the
    /// rider is already aboard.  Returns the number of removed entries.
    pub fn purge_request(&mut self, request: RequestId, keep_dropoff: bool) -> usize {
        let before = self.pickups.len() + self.dropoffs.len();
        self.pickups.retain(|s| s.request != request);
        if !keep_dropoff {
            self.dropoffs.retain(|s| s.request != request);
        }
        before - self.pickups.len() - self.dropoffs.len()
    }
}

impl std::fmt::Display for StopPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[name={}, id={}, position={}]", self.name, self.id, self.position)
    }
}
