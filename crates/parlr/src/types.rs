//! Utility types.
//!
//! Insertion-ordered maps keep every pass over the grammar and the automaton
//! deterministic, which is what makes generation reproducible byte for byte.

type BuildHasher = std::hash::BuildHasherDefault<rustc_hash::FxHasher>;

pub type Map<K, V> = indexmap::IndexMap<K, V, BuildHasher>;
pub type Set<T> = indexmap::IndexSet<T, BuildHasher>;
