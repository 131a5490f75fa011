use thiserror::Error;

use crate::bus::BusError;
use crate::mediator::MediatorError;
use crate::message::ResponseCode;
use crate::selection::UnexpectedResponseError;

#[derive(Error, Debug)]
pub enum ClientError {
    // protocol
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(#[from] UnexpectedResponseError),
    #[error("Mediator error: {0}")]
    Mediator(#[from] MediatorError),
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// A contributor participated but declined or failed the operation.
    #[error("Negative response: {info}")]
    NegativeResponse {
        info: String,
        code: Option<ResponseCode>,
    },

    // caller
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Config error: {0}")]
    Config(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        ClientError::Internal(message.into())
    }

    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        ClientError::InvalidArgument(message.into())
    }
}
