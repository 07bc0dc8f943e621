//! Strongly typed identifier wrappers.
//!
//! Arena ids (`AgentId`, `VehicleId`, …) wrap a `u32` index into the dense
//! `Vec` that owns the entity.  Cross references between agents are always
//! one of these ids, never a pointer, so the world has no ownership cycles.
//!
//! Stop points and trips come from timetables and keep their textual ids
//! (`StopPointId`, `TripId`).

use std::fmt;

/// Generate a typed index wrapper around a primitive integer.
macro_rules! typed_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident($inner:ty);) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        $vis struct $name(pub $inner);

        impl $name {
            /// Sentinel meaning "no valid id".
            pub const INVALID: $name = $name(<$inner>::MAX);

            /// Cast to `usize` for direct use as a `Vec` index.
            #[inline(always)]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl Default for $name {
            #[inline(always)]
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<$name> for usize {
            #[inline(always)]
            fn from(id: $name) -> usize {
                id.0 as usize
            }
        }

        impl TryFrom<usize> for $name {
            type Error = std::num::TryFromIntError;
            fn try_from(n: usize) -> Result<$name, Self::Error> {
                <$inner>::try_from(n).map($name)
            }
        }
    };
}

/// Generate a string-backed id for externally named entities.
macro_rules! named_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident;) => {
        $(#[$attr])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        $vis struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

typed_id! {
    /// Index of a traced agent (rider, vehicle, operator, station, unit).
    pub struct AgentId(u32);
}

typed_id! {
    /// Index of a topology node (a position in the environment).
    pub struct NodeId(u32);
}

typed_id! {
    /// Index of a service vehicle in the world's vehicle arena.
    pub struct VehicleId(u32);
}

typed_id! {
    /// Index of an operator in the world's operator arena.
    pub struct OperatorId(u32);
}

typed_id! {
    /// Index of a station in the world's station arena.
    pub struct StationId(u32);
}

typed_id! {
    /// Operator-scoped request number.  Allocated by a monotonic counter owned
    /// by the operator, so two operators may both hand out `RequestId(0)`.
    pub struct RequestId(u32);
}

typed_id! {
    /// Handle of a cooperative process registered with the scheduler.
    pub struct ProcessId(u32);
}

typed_id! {
    /// Handle of a one-shot scheduler event.
    pub struct EventId(u32);
}

named_id! {
    /// Id of a stop point (timetable stop or depot point).
    pub struct StopPointId;
}

named_id! {
    /// Id of a vehicle run along an ordered stop sequence.
    pub struct TripId;
}
