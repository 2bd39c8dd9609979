//! Row-major dense matrix over shared storage

use super::buffer::SharedBuffer;
use super::Real;
use crate::device::{DeviceId, Stream};
use crate::error::{EnlaceError, Result};
use ndarray::{Array2, ArrayView2, ArrayViewMut2};

/// Dense `height × width` matrix.
///
/// Cloning a `Matrix` shares its memory; [`Matrix::view`] and
/// [`Matrix::sub_matrix`] produce aliasing windows without copying.
#[derive(Debug, Clone)]
pub struct Matrix {
    buf: SharedBuffer<Real>,
    height: usize,
    width: usize,
    transposed: bool,
    device: DeviceId,
}

impl Matrix {
    /// Zero-filled matrix on `device`.
    pub fn zeros(height: usize, width: usize, device: DeviceId) -> Self {
        Self { buf: SharedBuffer::filled(height * width, 0.0), height, width, transposed: false, device }
    }

    /// Matrix over row-major `data`.
    pub fn from_vec(height: usize, width: usize, data: Vec<Real>, device: DeviceId) -> Result<Self> {
        if data.len() != height * width {
            return Err(EnlaceError::ShapeMismatch { expected: vec![height, width], actual: vec![data.len()] });
        }
        Ok(Self { buf: SharedBuffer::from_vec(data), height, width, transposed: false, device })
    }

    /// Host matrix taking the elements of an ndarray.
    pub fn from_array(array: &Array2<Real>) -> Self {
        let (height, width) = array.dim();
        let data = array.iter().copied().collect();
        Self { buf: SharedBuffer::from_vec(data), height, width, transposed: false, device: DeviceId::HOST }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of elements.
    pub fn size(&self) -> usize {
        self.height * self.width
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// Whether kernels should read this matrix as transposed.
    pub fn is_transposed(&self) -> bool {
        self.transposed
    }

    /// Whether both matrices live in the same allocation.
    pub fn shares_memory_with(&self, other: &Self) -> bool {
        self.buf.same_storage(&other.buf)
    }

    /// Aliasing `height × width` window starting `elem_offset` elements into this matrix.
    pub fn view(&self, elem_offset: usize, height: usize, width: usize, transposed: bool) -> Result<Self> {
        let buf = self.buf.view(elem_offset, height * width)?;
        Ok(Self { buf, height, width, transposed, device: self.device })
    }

    /// Aliasing window over rows `[row, row + rows)`.
    pub fn sub_matrix(&self, row: usize, rows: usize) -> Result<Self> {
        if row + rows > self.height {
            return Err(EnlaceError::precondition(
                "sub_matrix",
                format!("rows {row}..{} exceed matrix height {}", row + rows, self.height),
            ));
        }
        self.view(row * self.width, rows, self.width, self.transposed)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<Real> {
        if row >= self.height || col >= self.width {
            return None;
        }
        Some(self.buf.read(|s| s[row * self.width + col]))
    }

    pub fn set(&self, row: usize, col: usize, value: Real) -> Result<()> {
        if row >= self.height || col >= self.width {
            return Err(EnlaceError::precondition(
                "matrix set",
                format!("({row}, {col}) outside {}x{}", self.height, self.width),
            ));
        }
        self.buf.write(|s| s[row * self.width + col] = value);
        Ok(())
    }

    pub fn fill(&self, value: Real) {
        self.buf.write(|s| s.fill(value));
    }

    /// Sum of all elements.
    pub fn sum(&self) -> Real {
        self.buf.read(|s| s.iter().sum())
    }

    pub fn to_vec(&self) -> Vec<Real> {
        self.buf.to_vec()
    }

    /// Copy the elements out into an owned ndarray.
    pub fn to_array(&self) -> Result<Array2<Real>> {
        self.with_view(|v| v.to_owned())
    }

    /// Run `f` over an ndarray view of this matrix.
    pub fn with_view<R>(&self, f: impl FnOnce(ArrayView2<'_, Real>) -> R) -> Result<R> {
        let shape = (self.height, self.width);
        self.buf.read(|s| {
            let view = ArrayView2::from_shape(shape, s).map_err(|_| EnlaceError::ShapeMismatch {
                expected: vec![shape.0, shape.1],
                actual: vec![s.len()],
            })?;
            Ok(f(view))
        })
    }

    /// Run `f` over a mutable ndarray view of this matrix.
    pub fn with_view_mut<R>(&self, f: impl FnOnce(ArrayViewMut2<'_, Real>) -> R) -> Result<R> {
        let shape = (self.height, self.width);
        self.buf.write(|s| {
            let len = s.len();
            let view = ArrayViewMut2::from_shape(shape, s).map_err(|_| EnlaceError::ShapeMismatch {
                expected: vec![shape.0, shape.1],
                actual: vec![len],
            })?;
            Ok(f(view))
        })
    }

    /// Copy `rows` rows of `src` starting at `src_row` into this matrix at `dst_row`.
    pub fn copy_rows_from(
        &self,
        dst_row: usize,
        src: &Self,
        src_row: usize,
        rows: usize,
        stream: Stream,
    ) -> Result<()> {
        if src.width != self.width {
            return Err(EnlaceError::ShapeMismatch {
                expected: vec![rows, self.width],
                actual: vec![rows, src.width],
            });
        }
        if dst_row + rows > self.height || src_row + rows > src.height {
            return Err(EnlaceError::precondition(
                "copy_rows_from",
                format!(
                    "{rows} rows from {src_row} (of {}) to {dst_row} (of {})",
                    src.height, self.height
                ),
            ));
        }
        tracing::trace!(rows, width = self.width, ?stream, "matrix row copy");
        self.buf.copy_from(dst_row * self.width, &src.buf, src_row * src.width, rows * self.width)
    }

    /// Reuse `slot` when it already holds enough elements, otherwise allocate.
    ///
    /// A reused matrix is re-shaped in place and keeps its old contents.
    pub fn resize_or_create(
        slot: &mut Option<Self>,
        height: usize,
        width: usize,
        device: DeviceId,
    ) -> Result<&mut Self> {
        let reuse = slot.as_ref().is_some_and(|m| m.device == device && m.size() >= height * width);
        let resized = match slot.as_ref() {
            Some(m) if reuse => m.view(0, height, width, false)?,
            _ => Self::zeros(height, width, device),
        };
        Ok(slot.insert(resized))
    }
}
