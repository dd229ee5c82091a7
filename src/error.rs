// src/error.rs

use crate::backend::BackendError;

/// Ошибки синхронизации (Pull / Push)
#[derive(Debug)]
pub enum SyncError {
    /// У объекта нет ни одного ключа для адресации в каталоге
    Identity { kind: &'static str },

    /// Обязательное поле не заполнено; проверяется до любых обращений к каталогу
    Validation {
        field: &'static str,
        reason: &'static str,
    },

    /// Ошибка бэкенда каталога, передаётся без изменений
    Backend(BackendError),
}

impl From<BackendError> for SyncError {
    fn from(e: BackendError) -> Self {
        SyncError::Backend(e)
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Identity { kind } => {
                write!(f, "Identity error: all identity properties of the {} are blank", kind)
            }
            SyncError::Validation { field, reason } => {
                write!(f, "Validation error: {} {}", field, reason)
            }
            SyncError::Backend(e) => write!(f, "Backend error: {}", e),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Backend(e) => Some(e),
            _ => None,
        }
    }
}
