//! Payload kinds a batch can carry and how each one reports its row count

use crate::math::{IdVector, Matrix};
use std::any::Any;
use std::sync::Arc;

/// Shared list of text items.
pub type TextVector = Arc<Vec<String>>;

/// Shared list of opaque pipeline-specific values.
pub type UserData = Arc<Vec<Arc<dyn Any + Send + Sync>>>;

/// Borrowed view of one payload field, tagged by kind.
#[derive(Debug, Clone, Copy)]
pub enum PayloadRef<'a> {
    /// Primary dense values
    Dense(&'a Matrix),
    /// Integer ids
    Ids(&'a IdVector),
    /// Gradient of the primary values
    Gradient(&'a Matrix),
    /// Alternate dense input
    Input(&'a Matrix),
    /// Opaque user data
    Opaque(&'a Vec<Arc<dyn Any + Send + Sync>>),
    /// Text items
    Text(&'a [String]),
}

impl PayloadRef<'_> {
    /// Rows this payload contributes to the batch.
    pub fn rows(&self) -> usize {
        match self {
            Self::Dense(m) | Self::Gradient(m) | Self::Input(m) => m.height(),
            Self::Ids(v) => v.len(),
            Self::Opaque(items) => items.len(),
            Self::Text(items) => items.len(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Dense(_) => "value",
            Self::Ids(_) => "ids",
            Self::Gradient(_) => "grad",
            Self::Input(_) => "input",
            Self::Opaque(_) => "user data",
            Self::Text(_) => "strings",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceId;

    #[test]
    fn test_rows_per_kind() {
        let m = Matrix::zeros(4, 2, DeviceId::HOST);
        let ids = IdVector::zeros(3, DeviceId::HOST);
        let text = vec!["a".to_string()];
        let opaque: Vec<Arc<dyn Any + Send + Sync>> = vec![Arc::new(1u8), Arc::new(2u8)];

        assert_eq!(PayloadRef::Dense(&m).rows(), 4);
        assert_eq!(PayloadRef::Gradient(&m).rows(), 4);
        assert_eq!(PayloadRef::Ids(&ids).rows(), 3);
        assert_eq!(PayloadRef::Text(&text).rows(), 1);
        assert_eq!(PayloadRef::Opaque(&opaque).rows(), 2);
        assert_eq!(PayloadRef::Input(&m).kind(), "input");
    }
}
