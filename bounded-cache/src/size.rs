use std::collections::HashMap;
use std::collections::HashSet;
use std::mem;
use std::sync::Arc;

/// Identities of heap objects already charged during one estimation walk.
///
/// Keyed by address so two entries sharing a nested `Arc` are not charged
/// twice, and so a (pathological) cyclic structure terminates.
#[derive(Default)]
pub struct SizeSeen {
    addresses: HashSet<usize>,
}

impl SizeSeen {
    /// Record an address; returns `true` the first time it is seen.
    pub fn mark(&mut self, address: usize) -> bool {
        self.addresses.insert(address)
    }
}

/// Recursive estimation of the heap bytes owned by a value.
///
/// Implementations return owned *heap* bytes only; the inline size of the
/// value itself is added by [`deep_size_of`]. Scalars therefore return 0,
/// falling back to `size_of` for their whole footprint.
pub trait DeepSize {
    fn heap_size(&self, seen: &mut SizeSeen) -> usize;
}

/// Total estimated footprint of a value: its inline size plus the heap it
/// owns, with shared objects charged once.
pub fn deep_size_of<T: DeepSize>(value: &T) -> usize {
    let mut seen = SizeSeen::default();
    mem::size_of::<T>() + value.heap_size(&mut seen)
}

macro_rules! scalar_deep_size {
    ($($ty:ty),* $(,)?) => {
        $(impl DeepSize for $ty {
            fn heap_size(&self, _seen: &mut SizeSeen) -> usize {
                0
            }
        })*
    };
}

scalar_deep_size!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64, bool, char, ()
);

impl DeepSize for String {
    fn heap_size(&self, _seen: &mut SizeSeen) -> usize {
        self.capacity()
    }
}

impl DeepSize for &str {
    fn heap_size(&self, _seen: &mut SizeSeen) -> usize {
        0
    }
}

impl<T: DeepSize> DeepSize for Option<T> {
    fn heap_size(&self, seen: &mut SizeSeen) -> usize {
        self.as_ref().map(|v| v.heap_size(seen)).unwrap_or(0)
    }
}

impl<T: DeepSize> DeepSize for Vec<T> {
    fn heap_size(&self, seen: &mut SizeSeen) -> usize {
        let slab = self.capacity() * mem::size_of::<T>();
        slab + self.iter().map(|v| v.heap_size(seen)).sum::<usize>()
    }
}

impl<T: DeepSize> DeepSize for Box<T> {
    fn heap_size(&self, seen: &mut SizeSeen) -> usize {
        mem::size_of::<T>() + self.as_ref().heap_size(seen)
    }
}

impl<T: DeepSize> DeepSize for Arc<T> {
    fn heap_size(&self, seen: &mut SizeSeen) -> usize {
        let address = Arc::as_ptr(self) as usize;
        if !seen.mark(address) {
            // Already charged through another owner.
            return 0;
        }
        mem::size_of::<T>() + self.as_ref().heap_size(seen)
    }
}

impl<K: DeepSize, V: DeepSize, S> DeepSize for HashMap<K, V, S> {
    fn heap_size(&self, seen: &mut SizeSeen) -> usize {
        let slab = self.capacity() * (mem::size_of::<K>() + mem::size_of::<V>());
        slab + self
            .iter()
            .map(|(k, v)| k.heap_size(seen) + v.heap_size(seen))
            .sum::<usize>()
    }
}

impl<A: DeepSize, B: DeepSize> DeepSize for (A, B) {
    fn heap_size(&self, seen: &mut SizeSeen) -> usize {
        self.0.heap_size(seen) + self.1.heap_size(seen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scalars_are_inline_only() {
        assert_eq!(deep_size_of(&42u64), 8);
        assert_eq!(deep_size_of(&true), 1);
    }

    #[test]
    fn string_charges_capacity() {
        let s = String::from("hello world");
        assert_eq!(deep_size_of(&s), mem::size_of::<String>() + s.capacity());
    }

    #[test]
    fn vec_charges_slab_and_elements() {
        let v = vec![String::from("ab"), String::from("cd")];
        let expected = mem::size_of::<Vec<String>>()
            + v.capacity() * mem::size_of::<String>()
            + v[0].capacity()
            + v[1].capacity();
        assert_eq!(deep_size_of(&v), expected);
    }

    #[test]
    fn shared_arc_charged_once() {
        let shared = Arc::new(String::from("a reasonably long payload string"));
        let pair = (Arc::clone(&shared), Arc::clone(&shared));
        let single = (Arc::clone(&shared), Arc::new(0u8));

        let both = deep_size_of(&pair);
        // The second Arc in `pair` points at the same allocation, so the
        // pair costs two handles plus ONE payload.
        let one_payload =
            2 * mem::size_of::<Arc<String>>() + mem::size_of::<String>() + shared.capacity();
        assert_eq!(both, one_payload);
        assert!(deep_size_of(&single.0) < both);
    }

    #[test]
    fn distinct_arcs_charged_separately() {
        let a = Arc::new(String::from("payload one"));
        let b = Arc::new(String::from("payload two"));
        let pair = (Arc::clone(&a), Arc::clone(&b));
        let shared_pair = (Arc::clone(&a), Arc::clone(&a));
        assert!(deep_size_of(&pair) > deep_size_of(&shared_pair));
    }
}
