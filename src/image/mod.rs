//! Pixel buffers read by the moment evaluator.
//!
//! `ImageView` is a borrowed 2D view into a 1D buffer with an explicit stride,
//! addressed as `(x, y)` = (column, row). The stride counts elements between
//! the starts of consecutive rows, so a stride larger than the width
//! represents padded rows. Samples are unsigned integers of any width that
//! implements [`Sample`].

use crate::util::{FocusError, FocusResult};

#[cfg(feature = "image-io")]
pub mod io;

/// Unsigned integer pixel sample.
pub trait Sample: Copy + Send + Sync + 'static {
    /// Widens the sample for signed accumulation.
    fn to_i64(self) -> i64;
}

macro_rules! impl_sample {
    ($($ty:ty),*) => {
        $(impl Sample for $ty {
            #[inline]
            fn to_i64(self) -> i64 {
                i64::from(self)
            }
        })*
    };
}

impl_sample!(u8, u16, u32);

/// Borrowed 2D image view with an explicit stride.
#[derive(Copy, Clone, Debug)]
pub struct ImageView<'a, T> {
    data: &'a [T],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a, T> ImageView<'a, T> {
    /// Creates a contiguous view with `stride == width`.
    pub fn from_slice(data: &'a [T], width: usize, height: usize) -> FocusResult<Self> {
        Self::new(data, width, height, width)
    }

    /// Creates a view with an explicit stride.
    pub fn new(data: &'a [T], width: usize, height: usize, stride: usize) -> FocusResult<Self> {
        let needed = required_len(width, height, stride)?;
        if data.len() < needed {
            return Err(FocusError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    /// Returns the image width (`xsz`) in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height (`ysz`) in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the stride in elements between row starts.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns the backing slice including any row padding.
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// Returns the element at `(x, y)` if it is within bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<&'a T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y.checked_mul(self.stride)?.checked_add(x)?;
        self.data.get(idx)
    }

    /// Returns a contiguous slice for row `y` with length `width`.
    pub fn row(&self, y: usize) -> Option<&'a [T]> {
        if y >= self.height {
            return None;
        }
        let start = y.checked_mul(self.stride)?;
        let end = start.checked_add(self.width)?;
        self.data.get(start..end)
    }

    /// Returns true when the square `[x - reach, x + reach] x [y - reach, y + reach]`
    /// lies inside the image.
    pub fn contains_window(&self, x: usize, y: usize, reach: usize) -> bool {
        x >= reach
            && y >= reach
            && x.saturating_add(reach) < self.width
            && y.saturating_add(reach) < self.height
    }
}

/// Owned image in contiguous row-major layout.
#[derive(Clone, Debug)]
pub struct OwnedImage<T = u16> {
    data: Vec<T>,
    width: usize,
    height: usize,
}

impl<T> OwnedImage<T> {
    /// Wraps a contiguous buffer of exactly `width * height` samples.
    pub fn new(data: Vec<T>, width: usize, height: usize) -> FocusResult<Self> {
        let needed = required_len(width, height, width)?;
        if data.len() != needed {
            return Err(FocusError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Builds an image by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(
        width: usize,
        height: usize,
        mut f: impl FnMut(usize, usize) -> T,
    ) -> FocusResult<Self> {
        let needed = required_len(width, height, width)?;
        let mut data = Vec::with_capacity(needed);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Returns a borrowed view of the image.
    pub fn view(&self) -> ImageView<'_, T> {
        ImageView {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.width,
        }
    }

    /// Returns the raw samples in row-major order.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }
}

fn required_len(width: usize, height: usize, stride: usize) -> FocusResult<usize> {
    if width == 0 || height == 0 {
        return Err(FocusError::InvalidDimensions { width, height });
    }
    if stride < width {
        return Err(FocusError::InvalidStride { width, stride });
    }
    let needed = (height - 1)
        .checked_mul(stride)
        .and_then(|v| v.checked_add(width))
        .ok_or(FocusError::InvalidDimensions { width, height })?;
    Ok(needed)
}
