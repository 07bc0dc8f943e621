//! Transport modes, used to pick which part of the topology an agent moves on.

/// The network an agent travels on.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TransportMode {
    #[default]
    Walk,
    Car,
    Bike,
    /// Timetabled public transport.
    Transit,
}

impl TransportMode {
    /// Bit used by topology edges to advertise the modes allowed on them.
    #[inline]
    pub fn bit(self) -> u8 {
        match self {
            TransportMode::Walk    => 0b0001,
            TransportMode::Car     => 0b0010,
            TransportMode::Bike    => 0b0100,
            TransportMode::Transit => 0b1000,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransportMode::Walk    => "walk",
            TransportMode::Car     => "car",
            TransportMode::Bike    => "bike",
            TransportMode::Transit => "transit",
        }
    }
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
