//! Fixed capacity vectors for zero-copy account layouts.
//!
//! `arrayvec!` adds vector operations to a struct shaped like
//!
//! ```ignore
//! #[zero_copy]
//! pub struct Oracles {
//!     xs: [Oracle; 31],
//!     len: u64,
//! }
//! ```
//!
//! Elements must be `Copy + Default`. Slots past `len` always hold `Default::default()`,
//! so an account never retains stale entries after a `clear` or `remove`.

#[macro_export]
macro_rules! arrayvec {
    ($name:ident, $ty:ty, $len_ty:ty) => {
        #[allow(unused)]
        impl $name {
            #[inline(always)]
            pub fn len(&self) -> usize {
                self.len as usize
            }

            #[inline]
            pub fn is_empty(&self) -> bool {
                self.len == 0
            }

            #[inline(always)]
            pub fn capacity(&self) -> usize {
                self.xs.len()
            }

            #[inline]
            pub fn remaining_capacity(&self) -> usize {
                self.capacity() - self.len()
            }

            #[inline]
            pub fn is_full(&self) -> bool {
                self.len() == self.capacity()
            }

            pub fn push(&mut self, element: $ty) {
                assert!(!self.is_full());
                self.xs[self.len as usize] = element;
                self.len += 1;
            }

            pub fn clear(&mut self) {
                let end = self.len();
                for slot in &mut self.xs[..end] {
                    *slot = <$ty>::default();
                }
                self.len = 0;
            }

            pub fn remove(&mut self, index: usize) -> $ty {
                let end = self.len();
                assert!(index < end);
                let element = self.xs[index];
                self.xs.copy_within(index + 1..end, index);
                self.xs[end - 1] = <$ty>::default();
                self.len -= 1;
                element
            }

            pub fn insert(&mut self, index: usize, element: $ty) {
                assert!(!self.is_full());
                assert!(index <= self.len());

                self.xs.copy_within(index..self.len as usize, index + 1);
                self.len += 1;
                self.xs[index] = element;
            }

            #[inline]
            pub fn as_slice(&self) -> &[$ty] {
                &self.xs[..self.len as usize]
            }

            #[inline]
            pub fn as_mut_slice(&mut self) -> &mut [$ty] {
                &mut self.xs[..self.len as usize]
            }
        }

        impl std::ops::Deref for $name {
            type Target = [$ty];

            #[inline]
            fn deref(&self) -> &Self::Target {
                self.as_slice()
            }
        }

        impl std::ops::DerefMut for $name {
            #[inline]
            fn deref_mut(&mut self) -> &mut Self::Target {
                self.as_mut_slice()
            }
        }
    };
}
