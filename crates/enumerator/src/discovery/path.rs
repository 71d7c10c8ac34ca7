//! Capacity-checked path composition
//!
//! Witness paths are built component by component into a [`BoundedPath`].
//! A component that would push the path past its capacity is rejected with
//! [`PathError::TooLong`]; nothing is ever truncated.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    /// Composed path would not fit
    #[error("Path of {len} bytes exceeds capacity of {capacity} bytes")]
    TooLong { len: usize, capacity: usize },

    /// Component is empty or contains a separator
    #[error("Invalid path component {component:?}")]
    InvalidComponent { component: String },
}

/// Path with a fixed byte capacity
///
/// The capacity counts the terminating NUL the path needs when handed to the
/// OS, so the longest accepted path is `capacity - 1` bytes.
#[derive(Debug, Clone)]
pub struct BoundedPath {
    path: PathBuf,
    capacity: usize,
}

impl BoundedPath {
    pub fn new(base: &Path, capacity: usize) -> Result<Self, PathError> {
        check_len(base.as_os_str().len(), capacity)?;
        Ok(Self {
            path: base.to_path_buf(),
            capacity,
        })
    }

    /// Append one component, failing if the result would not fit
    pub fn push(&mut self, component: &OsStr) -> Result<(), PathError> {
        let bytes = component.as_encoded_bytes();
        if bytes.is_empty() || bytes.contains(&b'/') {
            return Err(PathError::InvalidComponent {
                component: component.to_string_lossy().into_owned(),
            });
        }

        let separator = usize::from(!self.path.as_os_str().as_encoded_bytes().ends_with(b"/"));
        let len = self.len() + separator + bytes.len();
        check_len(len, self.capacity)?;

        self.path.push(component);
        Ok(())
    }

    /// Copy of this path with `component` appended
    pub fn join(&self, component: &OsStr) -> Result<Self, PathError> {
        let mut joined = self.clone();
        joined.push(component)?;
        Ok(joined)
    }

    pub fn len(&self) -> usize {
        self.path.as_os_str().len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.as_os_str().is_empty()
    }

    pub fn as_path(&self) -> &Path {
        &self.path
    }
}

fn check_len(len: usize, capacity: usize) -> Result<(), PathError> {
    if len >= capacity {
        return Err(PathError::TooLong { len, capacity });
    }
    Ok(())
}
