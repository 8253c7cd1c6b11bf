use thiserror::Error;

use crate::{
    application::{annotate::AnnotateError, template_config::TemplateConfigError},
    config::LoadError,
    infra::error::InfraError,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Annotate(#[from] AnnotateError),
    #[error(transparent)]
    TemplateConfig(#[from] TemplateConfigError),
    #[error("render failed: {0}")]
    Render(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

impl From<crate::application::remote::RemoteError> for AppError {
    fn from(error: crate::application::remote::RemoteError) -> Self {
        Self::Infra(InfraError::from(error))
    }
}

impl From<crate::application::preferences::StoreError> for AppError {
    fn from(error: crate::application::preferences::StoreError) -> Self {
        Self::Infra(InfraError::from(error))
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::Infra(InfraError::from(error))
    }
}
