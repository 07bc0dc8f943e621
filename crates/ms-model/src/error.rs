use thiserror::Error;

use ms_core::RequestId;
use ms_sched::SchedError;

use crate::Leg;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("request {request} has no {leg} stop")]
    MissingStop { request: RequestId, leg: Leg },

    #[error("a {found} stop cannot be used as the {expected} of a trip request")]
    WrongLeg { expected: Leg, found: Leg },

    #[error(transparent)]
    Sched(#[from] SchedError),
}

pub type ModelResult<T> = Result<T, ModelError>;
