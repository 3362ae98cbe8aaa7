//! 错误分类 (Error taxonomy)
//!
//! 控制面所有操作都返回结构化错误,不会终止进程。

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CounterError>;

/// 错误大类,用于 JSON 响应里的 `kind` 字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Resource,
    Config,
}

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("Number plate required")]
    EmptyKey,

    #[error("{0} already exists")]
    DuplicateKey(String),

    /// 坐标/线编号/模式/URL 等输入不合法
    #[error("{0}")]
    InvalidInput(String),

    #[error("Truck not found")]
    NotFound(u64),

    #[error("stream connect failed: {0}")]
    ConnectFailure(String),

    #[error("Failed to save: {0}")]
    PersistFailure(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CounterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CounterError::EmptyKey | CounterError::InvalidInput(_) => ErrorKind::Validation,
            CounterError::DuplicateKey(_) => ErrorKind::Conflict,
            CounterError::NotFound(_) => ErrorKind::NotFound,
            CounterError::ConnectFailure(_) | CounterError::PersistFailure(_) => {
                ErrorKind::Resource
            }
            CounterError::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        CounterError::InvalidInput(message.into())
    }

    pub(crate) fn persist(err: impl std::fmt::Display) -> Self {
        CounterError::PersistFailure(err.to_string())
    }
}
