macro_rules! impl_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(usize);

        impl $name {
            /// Create a new id.
            #[inline]
            pub const fn new(index: usize) -> Self {
                $name(index)
            }

            /// Get the id as usize.
            #[inline]
            pub const fn as_usize(&self) -> usize {
                self.0
            }

            /// Get the id as u32, the index width used in the emitted tables.
            #[inline]
            pub fn as_u32(&self) -> u32 {
                debug_assert!(self.0 <= u32::MAX as usize);
                self.0 as u32
            }
        }

        impl<T> std::ops::Index<$name> for [T] {
            type Output = T;

            #[inline]
            fn index(&self, index: $name) -> &Self::Output {
                &self[index.0]
            }
        }

        impl<T> std::ops::IndexMut<$name> for [T] {
            #[inline]
            fn index_mut(&mut self, index: $name) -> &mut T {
                &mut self[index.0]
            }
        }

        impl<T> std::ops::Index<$name> for Vec<T> {
            type Output = T;

            #[inline]
            fn index(&self, index: $name) -> &Self::Output {
                &self[index.0]
            }
        }

        impl<T> std::ops::IndexMut<$name> for Vec<T> {
            #[inline]
            fn index_mut(&mut self, index: $name) -> &mut T {
                &mut self[index.0]
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

impl_id!(NodeID, "The index of a node in a graph arena.");
impl_id!(HandlerID, "The index of an accept handler, i.e. of a rule across all scanner modes.");
