//! A simple way to specify the shape of a kernel's index space.

use std::fmt::Debug;

use num_traits::{Num, ToPrimitive};

use crate::hal;

fn to_u64<T: Num + ToPrimitive + Debug + Copy>(val: T) -> u64 {
    val.to_u64().unwrap_or_else(|| {
        panic!(
            "kiln::Extent: unable to convert the value '{:?}' into a \
            dimension. Dimensions must have non-negative values.",
            val
        )
    })
}

/// A size or offset in one, two, or three dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Extent {
    One(u64),
    Two(u64, u64),
    Three(u64, u64, u64),
}

impl Extent {
    /// Returns the number of dimensions defined by this `Extent`.
    pub fn dim_count(&self) -> u32 {
        match *self {
            Extent::One(..) => 1,
            Extent::Two(..) => 2,
            Extent::Three(..) => 3,
        }
    }

    /// Returns a 3D size, with undefined dimensions set to `1`.
    pub fn to_sizes(&self) -> [u64; 3] {
        match *self {
            Extent::One(x) => [x, 1, 1],
            Extent::Two(x, y) => [x, y, 1],
            Extent::Three(x, y, z) => [x, y, z],
        }
    }

    /// Returns a 3D offset, with undefined dimensions set to `0`.
    pub fn to_offset(&self) -> [u64; 3] {
        match *self {
            Extent::One(x) => [x, 0, 0],
            Extent::Two(x, y) => [x, y, 0],
            Extent::Three(x, y, z) => [x, y, z],
        }
    }

    /// Returns the product of all contained dimensional values
    /// (equivalent to a length, area, or volume).
    pub fn to_len(&self) -> u64 {
        match *self {
            Extent::One(x) => x,
            Extent::Two(x, y) => x * y,
            Extent::Three(x, y, z) => x * y * z,
        }
    }
}

impl From<u64> for Extent {
    fn from(val: u64) -> Extent {
        Extent::One(val)
    }
}

impl From<u32> for Extent {
    fn from(val: u32) -> Extent {
        Extent::One(u64::from(val))
    }
}

impl From<usize> for Extent {
    fn from(val: usize) -> Extent {
        Extent::One(val as u64)
    }
}

impl From<i32> for Extent {
    fn from(val: i32) -> Extent {
        Extent::One(to_u64(val))
    }
}

impl<'a> From<&'a Extent> for Extent {
    fn from(extent: &'a Extent) -> Extent {
        *extent
    }
}

impl<T: Num + ToPrimitive + Debug + Copy> From<(T,)> for Extent {
    fn from(val: (T,)) -> Extent {
        Extent::One(to_u64(val.0))
    }
}

impl<T: Num + ToPrimitive + Debug + Copy> From<(T, T)> for Extent {
    fn from(val: (T, T)) -> Extent {
        Extent::Two(to_u64(val.0), to_u64(val.1))
    }
}

impl<T: Num + ToPrimitive + Debug + Copy> From<(T, T, T)> for Extent {
    fn from(val: (T, T, T)) -> Extent {
        Extent::Three(to_u64(val.0), to_u64(val.1), to_u64(val.2))
    }
}

impl<T: Num + ToPrimitive + Debug + Copy> From<[T; 1]> for Extent {
    fn from(val: [T; 1]) -> Extent {
        Extent::One(to_u64(val[0]))
    }
}

impl<T: Num + ToPrimitive + Debug + Copy> From<[T; 2]> for Extent {
    fn from(val: [T; 2]) -> Extent {
        Extent::Two(to_u64(val[0]), to_u64(val[1]))
    }
}

impl<T: Num + ToPrimitive + Debug + Copy> From<[T; 3]> for Extent {
    fn from(val: [T; 3]) -> Extent {
        Extent::Three(to_u64(val[0]), to_u64(val[1]), to_u64(val[2]))
    }
}

/// The index space a kernel is executed over.
///
/// Combines a global size (the total number of work-items in each
/// dimension), a local size (the shape of one work-group), and an optional
/// offset for the origin of the grid. The number of dimensions in use is
/// taken from the global size.
///
/// ```
/// use kiln::NdRange;
///
/// let line = NdRange::new(1024, 16);
/// let tile = NdRange::new((512, 512), (16, 16)).with_offset((64, 64));
/// assert_eq!(line.dims(), 1);
/// assert_eq!(tile.dims(), 2);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NdRange {
    global: Extent,
    local: Extent,
    offset: Extent,
}

impl NdRange {
    /// Returns a new `NdRange` with the given global and local sizes and a
    /// zero offset.
    pub fn new<G, L>(global: G, local: L) -> NdRange
    where
        G: Into<Extent>,
        L: Into<Extent>,
    {
        NdRange {
            global: global.into(),
            local: local.into(),
            offset: Extent::Three(0, 0, 0),
        }
    }

    /// Sets the origin of the work grid. Used when the first work-item is
    /// not at (0, 0, 0).
    pub fn with_offset<O: Into<Extent>>(mut self, offset: O) -> NdRange {
        self.offset = offset.into();
        self
    }

    /// Returns the number of dimensions in use.
    pub fn dims(&self) -> u32 {
        self.global.dim_count()
    }

    pub fn global(&self) -> Extent {
        self.global
    }

    pub fn local(&self) -> Extent {
        self.local
    }

    pub fn offset(&self) -> Extent {
        self.offset
    }

    /// Returns the number of work-items in one work-group.
    pub fn work_group_size(&self) -> u64 {
        let hal::NdRange { local, .. } = self.to_hal();
        local.iter().product()
    }

    // Lowers to the fully-padded form the device expects: dimensions at or
    // above `dims` carry offset 0 and global and local sizes of 1.
    pub(crate) fn to_hal(&self) -> hal::NdRange {
        let dims = self.dims() as usize;
        let mut range = hal::NdRange::default();
        let offset = self.offset.to_offset();
        let global = self.global.to_sizes();
        let local = self.local.to_sizes();
        for i in 0..hal::MAX_DIMS as usize {
            range.offset[i] = if i < dims { offset[i] } else { 0 };
            range.global[i] = if i < dims { global[i] } else { 1 };
            range.local[i] = if i < dims { local[i] } else { 1 };
        }
        range
    }
}
