use thiserror::Error;

use crate::ports::PortError;
use crate::submission::SubmissionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("wizard configuration leaves no steps to show")]
    EmptyStepSequence,
    #[error("a submission is already in flight for this session")]
    SessionBusy,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<PortError> for ApplicationError {
    fn from(value: PortError) -> Self {
        Self::Persistence(value.to_string())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The intake could not be processed. Check the form and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The shop system is temporarily unavailable. Your form is kept; retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn class(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "bad_request",
            Self::ServiceUnavailable { .. } => "service_unavailable",
            Self::Internal { .. } => "internal",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(DomainError::EmptyStepSequence) => {
                Self::BadRequest { message: "domain validation failed".to_owned(), correlation_id }
            }
            ApplicationError::Domain(DomainError::SessionBusy) => Self::ServiceUnavailable {
                message: "submission already in progress".to_owned(),
                correlation_id,
            },
            ApplicationError::Submission(error) => match error.cause {
                PortError::InvalidPayload(_) => {
                    Self::BadRequest { message: error.to_string(), correlation_id }
                }
                PortError::NotFound(_) | PortError::Storage(_) => {
                    Self::ServiceUnavailable { message: error.to_string(), correlation_id }
                }
            },
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}
