//! Segment identity generation.

/// Source of opaque segment identifiers.
pub trait IdGenerator {
    fn next_id(&mut self) -> String;
}

/// Random UUID v4 identifiers.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidIdGen;

impl IdGenerator for UuidIdGen {
    fn next_id(&mut self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic `seg-0`, `seg-1`, ... identifiers.
#[derive(Clone, Debug, Default)]
pub struct SequentialIdGen {
    next: u64,
}

impl IdGenerator for SequentialIdGen {
    fn next_id(&mut self) -> String {
        let id = format!("seg-{}", self.next);
        self.next += 1;
        id
    }
}

impl<G: IdGenerator + ?Sized> IdGenerator for Box<G> {
    fn next_id(&mut self) -> String {
        (**self).next_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuids_are_unique() {
        let mut ids = UuidIdGen;
        assert_ne!(ids.next_id(), ids.next_id());
    }

    #[test]
    fn sequential_counts_up() {
        let mut ids = SequentialIdGen::default();
        assert_eq!(ids.next_id(), "seg-0");
        assert_eq!(ids.next_id(), "seg-1");
    }
}
