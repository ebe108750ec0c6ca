//! Time-ordered event id issuance.
//!
//! Each thread keeps its own monotonic generator so concurrent publishers on
//! different connections never contend on a single lock; within a thread,
//! ids stay strictly increasing even when two publishes land in the same
//! millisecond.

use std::cell::RefCell;

use ulid::{Generator, Ulid};

thread_local! {
    static GENERATOR: RefCell<Generator> = RefCell::new(Generator::new());
}

pub fn gen_ulid() -> Ulid {
    GENERATOR.with(|g| {
        g.borrow_mut()
            .generate()
            .expect("monotonic ulid generator exhausted entropy for this millisecond")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_strictly_increasing() {
        let a = gen_ulid();
        let b = gen_ulid();
        assert!(b > a);
    }
}
