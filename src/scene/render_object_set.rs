//! Render-object buckets (spec.md §3.4): a named selection of render
//! objects filtered through passes (opaque / alpha-test / translucent /
//! …), each containing one or more buckets addressed by a `u64` bitmask.

pub const MAX_BUCKETS_PER_SET: u32 = 64;

#[derive(Default, Clone)]
pub struct RenderObjectSet {
    pub name: String,
    bucket_names: Vec<String>,
    /// Bit `i` of `object_buckets[o]` set means object `o` belongs to
    /// bucket `i`.
    object_buckets: Vec<u64>,
}

impl RenderObjectSet {
    pub fn new(name: impl Into<String>) -> Self {
        RenderObjectSet {
            name: name.into(),
            bucket_names: Vec::new(),
            object_buckets: Vec::new(),
        }
    }

    pub fn add_bucket(&mut self, name: impl Into<String>) -> u32 {
        debug_assert!((self.bucket_names.len() as u32) < MAX_BUCKETS_PER_SET, "bucket count exceeds MAX_BUCKETS_PER_SET");
        let index = self.bucket_names.len() as u32;
        self.bucket_names.push(name.into());
        index
    }

    pub fn bucket_count(&self) -> u32 {
        self.bucket_names.len() as u32
    }

    pub fn push_object(&mut self, bucket_mask: u64) -> u32 {
        let index = self.object_buckets.len() as u32;
        self.object_buckets.push(bucket_mask);
        index
    }

    pub fn object_count(&self) -> usize {
        self.object_buckets.len()
    }

    pub fn bucket_mask(&self, object: u32) -> u64 {
        self.object_buckets[object as usize]
    }

    pub fn objects_in_bucket(&self, bucket: u32) -> impl Iterator<Item = u32> + '_ {
        let bit = 1u64 << bucket;
        self.object_buckets
            .iter()
            .enumerate()
            .filter(move |(_, mask)| *mask & bit != 0)
            .map(|(i, _)| i as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objects_in_bucket_filters_by_bitmask() {
        let mut set = RenderObjectSet::new("opaque");
        let opaque = set.add_bucket("opaque");
        let alpha_test = set.add_bucket("alpha_test");

        set.push_object(1 << opaque);
        set.push_object((1 << opaque) | (1 << alpha_test));
        set.push_object(1 << alpha_test);

        let opaque_objects: Vec<u32> = set.objects_in_bucket(opaque).collect();
        assert_eq!(opaque_objects, vec![0, 1]);
        let alpha_objects: Vec<u32> = set.objects_in_bucket(alpha_test).collect();
        assert_eq!(alpha_objects, vec![1, 2]);
    }
}
