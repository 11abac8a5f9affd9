use ahash::RandomState;

/// Seeds are fixed so hashing is identical across runs.
pub const RANDOM_STATE: RandomState = RandomState::with_seeds(0, 0, 0, 0);

pub type HashMap<K, V> = hashbrown::HashMap<K, V, RandomState>;
pub type HashSet<T> = hashbrown::HashSet<T, RandomState>;
