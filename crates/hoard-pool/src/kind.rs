//! Array shape tags and the erased pooled value
//!
//! Pool keys and values carry an `ArrayKind` tag so one pool instance can
//! recycle arrays of several element types without reflection. The erased
//! value is a plain enum over the supported vector types.

/// Shape discriminator for pooled arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayKind {
    U8,
    I32,
    I64,
    F32,
    F64,
}

impl ArrayKind {
    /// Bytes per element for this kind.
    pub fn element_size(self) -> usize {
        match self {
            ArrayKind::U8 => 1,
            ArrayKind::I32 | ArrayKind::F32 => 4,
            ArrayKind::I64 | ArrayKind::F64 => 8,
        }
    }
}

/// A recyclable array, tagged by element type.
#[derive(Debug)]
pub enum PooledArray {
    Bytes(Vec<u8>),
    Ints(Vec<i32>),
    Longs(Vec<i64>),
    Floats(Vec<f32>),
    Doubles(Vec<f64>),
}

impl PooledArray {
    /// Allocate a zeroed array of `len` elements.
    pub fn allocate(kind: ArrayKind, len: usize) -> Self {
        match kind {
            ArrayKind::U8 => PooledArray::Bytes(vec![0; len]),
            ArrayKind::I32 => PooledArray::Ints(vec![0; len]),
            ArrayKind::I64 => PooledArray::Longs(vec![0; len]),
            ArrayKind::F32 => PooledArray::Floats(vec![0.0; len]),
            ArrayKind::F64 => PooledArray::Doubles(vec![0.0; len]),
        }
    }

    pub fn kind(&self) -> ArrayKind {
        match self {
            PooledArray::Bytes(_) => ArrayKind::U8,
            PooledArray::Ints(_) => ArrayKind::I32,
            PooledArray::Longs(_) => ArrayKind::I64,
            PooledArray::Floats(_) => ArrayKind::F32,
            PooledArray::Doubles(_) => ArrayKind::F64,
        }
    }

    /// Element count.
    pub fn len(&self) -> usize {
        match self {
            PooledArray::Bytes(v) => v.len(),
            PooledArray::Ints(v) => v.len(),
            PooledArray::Longs(v) => v.len(),
            PooledArray::Floats(v) => v.len(),
            PooledArray::Doubles(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte footprint charged against the pool budget.
    pub fn byte_size(&self) -> usize {
        self.len() * self.kind().element_size()
    }

    /// Reset every element to zero.
    pub fn zero(&mut self) {
        match self {
            PooledArray::Bytes(v) => v.fill(0),
            PooledArray::Ints(v) => v.fill(0),
            PooledArray::Longs(v) => v.fill(0),
            PooledArray::Floats(v) => v.fill(0.0),
            PooledArray::Doubles(v) => v.fill(0.0),
        }
    }

    /// Allocation address, for the debug-build double-put check.
    #[cfg(any(debug_assertions, test))]
    pub(crate) fn debug_addr(&self) -> usize {
        match self {
            PooledArray::Bytes(v) => v.as_ptr() as usize,
            PooledArray::Ints(v) => v.as_ptr() as usize,
            PooledArray::Longs(v) => v.as_ptr() as usize,
            PooledArray::Floats(v) => v.as_ptr() as usize,
            PooledArray::Doubles(v) => v.as_ptr() as usize,
        }
    }
}

/// Element types the typed pool façades support.
pub trait PoolElement: Copy + Default + 'static {
    const KIND: ArrayKind;

    fn wrap(vec: Vec<Self>) -> PooledArray;

    /// Recover the typed vector; `None` on a kind mismatch.
    fn unwrap(array: PooledArray) -> Option<Vec<Self>>;
}

macro_rules! pool_element {
    ($ty:ty, $kind:expr, $variant:ident) => {
        impl PoolElement for $ty {
            const KIND: ArrayKind = $kind;

            fn wrap(vec: Vec<Self>) -> PooledArray {
                PooledArray::$variant(vec)
            }

            fn unwrap(array: PooledArray) -> Option<Vec<Self>> {
                match array {
                    PooledArray::$variant(vec) => Some(vec),
                    _ => None,
                }
            }
        }
    };
}

pool_element!(u8, ArrayKind::U8, Bytes);
pool_element!(i32, ArrayKind::I32, Ints);
pool_element!(i64, ArrayKind::I64, Longs);
pool_element!(f32, ArrayKind::F32, Floats);
pool_element!(f64, ArrayKind::F64, Doubles);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_size_scales_with_element() {
        assert_eq!(PooledArray::allocate(ArrayKind::U8, 16).byte_size(), 16);
        assert_eq!(PooledArray::allocate(ArrayKind::I32, 16).byte_size(), 64);
        assert_eq!(PooledArray::allocate(ArrayKind::F64, 16).byte_size(), 128);
    }

    #[test]
    fn test_zero_resets_contents() {
        let mut array = PooledArray::Ints(vec![7; 4]);
        array.zero();
        assert_eq!(i32::unwrap(array).unwrap(), vec![0; 4]);
    }

    #[test]
    fn test_unwrap_rejects_mismatch() {
        let array = PooledArray::Bytes(vec![1, 2, 3]);
        assert!(i32::unwrap(array).is_none());
    }

    #[test]
    fn test_wrap_roundtrip() {
        let vec = vec![1.5f32, 2.5];
        let array = f32::wrap(vec.clone());
        assert_eq!(array.kind(), ArrayKind::F32);
        assert_eq!(f32::unwrap(array).unwrap(), vec);
    }
}
