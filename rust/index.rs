//! Row-major index arithmetic and the N-dimensional odometer.
//!
//! Every multi-dimensional traversal in the crate goes through [`Odometer`]:
//! the last dimension advances fastest and carries into the one before it
//! when it overflows, so iteration order always matches row-major layout.

/// Maximum tensor rank, including the channel dimension.
pub const MAX_RANK: usize = 8;

/// Row-major element strides for `shape` (last dimension has stride 1).
pub fn row_major_strides(shape: &[usize]) -> [usize; MAX_RANK] {
    let mut strides = [0usize; MAX_RANK];
    let mut stride = 1usize;
    for i in (0..shape.len()).rev() {
        strides[i] = stride;
        stride *= shape[i];
    }
    strides
}

/// Flat row-major offset of `pos` inside `shape`.
#[inline]
pub fn flat_index(pos: &[usize], shape: &[usize]) -> usize {
    pos.iter()
        .zip(shape)
        .fold(0usize, |offset, (&p, &size)| offset * size + p)
}

/// Iterative N-dimensional counter over `0..extent[d]` for every `d`.
///
/// Yields every position exactly once in row-major order. A rank-0 odometer
/// yields the single empty position, which keeps "no spatial dimensions"
/// from needing a special case in callers.
///
/// ```
/// use winpack::index::Odometer;
///
/// let mut odometer = Odometer::new(&[2, 3]);
/// let mut visited = Vec::new();
/// while let Some(pos) = odometer.next_position() {
///     visited.push((pos[0], pos[1]));
/// }
/// assert_eq!(visited, [(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
/// ```
#[derive(Debug, Clone)]
pub struct Odometer {
    extent: [usize; MAX_RANK],
    pos: [usize; MAX_RANK],
    ndim: usize,
    started: bool,
    done: bool,
}

impl Odometer {
    /// Counter over `extent`. Extents longer than [`MAX_RANK`] are truncated;
    /// callers validate rank before building one.
    pub fn new(extent: &[usize]) -> Self {
        let ndim = extent.len().min(MAX_RANK);
        let mut ext = [0usize; MAX_RANK];
        ext[..ndim].copy_from_slice(&extent[..ndim]);
        Self {
            extent: ext,
            pos: [0usize; MAX_RANK],
            ndim,
            started: false,
            done: extent[..ndim].iter().any(|&e| e == 0),
        }
    }

    /// Number of positions the counter visits in total.
    pub fn total(&self) -> usize {
        self.extent[..self.ndim].iter().product()
    }

    /// Advance and return the next position, or `None` once exhausted.
    pub fn next_position(&mut self) -> Option<&[usize]> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(&self.pos[..self.ndim]);
        }
        // Increment least-significant dimension, carry on overflow.
        let mut d = self.ndim;
        loop {
            if d == 0 {
                self.done = true;
                return None;
            }
            d -= 1;
            self.pos[d] += 1;
            if self.pos[d] < self.extent[d] {
                break;
            }
            self.pos[d] = 0;
        }
        Some(&self.pos[..self.ndim])
    }

    /// Restart from the all-zeros position.
    pub fn reset(&mut self) {
        self.pos = [0usize; MAX_RANK];
        self.started = false;
        self.done = self.extent[..self.ndim].iter().any(|&e| e == 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(extent: &[usize]) -> Vec<Vec<usize>> {
        let mut odometer = Odometer::new(extent);
        let mut out = Vec::new();
        while let Some(pos) = odometer.next_position() {
            out.push(pos.to_vec());
        }
        out
    }

    #[test]
    fn odometer_row_major_order() {
        let positions = collect(&[2, 2, 3]);
        assert_eq!(positions.len(), 12);
        assert_eq!(positions[0], [0, 0, 0]);
        assert_eq!(positions[1], [0, 0, 1]);
        assert_eq!(positions[3], [0, 1, 0]);
        assert_eq!(positions[6], [1, 0, 0]);
        assert_eq!(positions[11], [1, 1, 2]);
        for (i, pos) in positions.iter().enumerate() {
            assert_eq!(flat_index(pos, &[2, 2, 3]), i);
        }
    }

    #[test]
    fn odometer_rank_zero_yields_once() {
        assert_eq!(collect(&[]), vec![Vec::<usize>::new()]);
    }

    #[test]
    fn odometer_zero_extent_yields_nothing() {
        assert!(collect(&[3, 0, 2]).is_empty());
    }

    #[test]
    fn odometer_reset() {
        let mut odometer = Odometer::new(&[2, 2]);
        while odometer.next_position().is_some() {}
        odometer.reset();
        assert_eq!(odometer.next_position(), Some(&[0usize, 0][..]));
        assert_eq!(odometer.total(), 4);
    }

    #[test]
    fn strides() {
        let strides = row_major_strides(&[4, 3, 2]);
        assert_eq!(&strides[..3], &[6, 2, 1]);
        assert_eq!(flat_index(&[3, 2, 1], &[4, 3, 2]), 23);
    }
}
