use ms_core::{AgentId, CoreError, OperatorId, RequestId, StationId, StopPointId, TripId, VehicleId};
use ms_model::ModelError;
use ms_sched::SchedError;
use ms_spatial::SpatialError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("simulation configuration error: {0}")]
    Config(String),

    /// A state the simulation should never reach.  Caught once per agent by
    /// the run loop, which makes the agent leave with an error cause.
    #[error("simulation logic error: {0}")]
    Logic(String),

    #[error("agent {0} does not exist")]
    UnknownAgent(AgentId),

    #[error("operator {0} does not exist")]
    UnknownOperator(OperatorId),

    #[error("vehicle {0} does not exist")]
    UnknownVehicle(VehicleId),

    #[error("station {0} does not exist")]
    UnknownStation(StationId),

    #[error("operator {operator} has no request {request}")]
    UnknownRequest { operator: OperatorId, request: RequestId },

    #[error("no stop point or depot point {0}")]
    UnknownStopPoint(StopPointId),

    #[error("operator has no trip {0}")]
    UnknownTrip(TripId),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Sched(#[from] SchedError),

    #[error(transparent)]
    Spatial(#[from] SpatialError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("demand table: {0}")]
    Demand(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SimError {
    pub fn logic(msg: impl Into<String>) -> Self {
        SimError::Logic(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        SimError::Config(msg.into())
    }
}

pub type SimResult<T> = Result<T, SimError>;
