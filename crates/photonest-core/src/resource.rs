//! Loading / success / error wrapper used to drive screen rendering.

use crate::error::Error;

/// State of an asynchronous value as seen by a screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource<T> {
    Loading,
    Success(T),
    Error(String),
}

impl<T> Resource<T> {
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The loaded value, if any
    pub const fn data(&self) -> Option<&T> {
        match self {
            Self::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn data_mut(&mut self) -> Option<&mut T> {
        match self {
            Self::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resource<U> {
        match self {
            Self::Loading => Resource::Loading,
            Self::Success(data) => Resource::Success(f(data)),
            Self::Error(message) => Resource::Error(message),
        }
    }
}

impl<T> Default for Resource<T> {
    fn default() -> Self {
        Self::Loading
    }
}

impl<T> From<crate::Result<T>> for Resource<T> {
    fn from(result: crate::Result<T>) -> Self {
        match result {
            Ok(data) => Self::Success(data),
            Err(error) => Self::from_error(&error),
        }
    }
}

impl<T> Resource<T> {
    /// Map an error to the message shown in the UI
    pub fn from_error(error: &Error) -> Self {
        Self::Error(error.user_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_result_maps_both_cases() {
        let ok: Resource<i32> = Ok(3).into();
        assert_eq!(ok, Resource::Success(3));

        let err: Resource<i32> = Err(Error::InvalidInput("Bad caption".to_string())).into();
        assert_eq!(err.error_message(), Some("Bad caption"));
    }

    #[test]
    fn map_preserves_state() {
        let loading: Resource<i32> = Resource::Loading;
        assert!(loading.map(|v| v + 1).is_loading());

        let success = Resource::Success(2).map(|v| v * 10);
        assert_eq!(success.data(), Some(&20));
    }
}
