use std::borrow::Borrow;
use std::collections::VecDeque;
use std::hash::Hash;

use rustc_hash::FxHashMap;

/// Fixed-capacity key/value store with oldest-insertion eviction.
///
/// Eviction order is insertion order. Reads never touch recency, and
/// overwriting a resident key replaces the value in place without resetting
/// its age. A capacity of zero disables storage entirely.
#[derive(Debug, Clone)]
pub struct BoundedCache<K, V> {
	capacity: usize,
	/// Resident keys, oldest first.
	order: VecDeque<K>,
	entries: FxHashMap<K, V>,
}

impl<K, V> BoundedCache<K, V>
where
	K: Eq + Hash + Clone,
{
	/// Creates an empty cache holding at most `capacity` entries.
	pub fn new(capacity: usize) -> Self {
		Self {
			capacity,
			order: VecDeque::new(),
			entries: FxHashMap::default(),
		}
	}

	/// Maximum number of resident entries.
	pub fn capacity(&self) -> usize {
		self.capacity
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Returns the cached value for `key` without affecting eviction order.
	pub fn get<Q>(&self, key: &Q) -> Option<&V>
	where
		K: Borrow<Q>,
		Q: Eq + Hash + ?Sized,
	{
		self.entries.get(key)
	}

	pub fn contains<Q>(&self, key: &Q) -> bool
	where
		K: Borrow<Q>,
		Q: Eq + Hash + ?Sized,
	{
		self.entries.contains_key(key)
	}

	/// Inserts `value` under `key`.
	///
	/// When `key` is new and the cache is full, exactly one entry (the oldest
	/// inserted) is evicted first and returned. When `key` is already resident
	/// its value is replaced and its position in the eviction order is kept.
	pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
		if self.capacity == 0 {
			return None;
		}

		if let Some(slot) = self.entries.get_mut(&key) {
			*slot = value;
			return None;
		}

		let evicted = if self.entries.len() >= self.capacity {
			self.pop_oldest()
		} else {
			None
		};

		self.order.push_back(key.clone());
		self.entries.insert(key, value);
		evicted
	}

	/// Resident keys from oldest to newest insertion.
	pub fn keys(&self) -> impl Iterator<Item = &K> {
		self.order.iter()
	}

	pub fn clear(&mut self) {
		self.order.clear();
		self.entries.clear();
	}

	fn pop_oldest(&mut self) -> Option<(K, V)> {
		let key = self.order.pop_front()?;
		let value = self.entries.remove(&key)?;
		Some((key, value))
	}
}
