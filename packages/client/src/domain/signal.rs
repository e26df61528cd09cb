//! Observable value cells.
//!
//! [`Signal`] is a value cell with any number of subscribers, built on
//! `tokio::sync::watch`. Every write replaces the whole value and bumps the
//! version seen by subscribers, so change detection never depends on
//! identity. Readers always receive an owned snapshot.
//!
//! [`Computed`] is a derived cell: it caches the result of a closure over
//! other signals and recomputes only when one of its dependencies changed
//! since the last read.

use std::{
    fmt,
    sync::{Arc, Mutex},
};

use tokio::sync::watch;

/// A value cell that can be read synchronously and observed for change.
pub struct Signal<T> {
    tx: Arc<watch::Sender<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Signal").field(&*self.tx.borrow()).finish()
    }
}

impl<T: Default> Default for Signal<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Signal<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Owned snapshot of the current value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.tx.borrow().clone()
    }

    /// Read the current value without cloning it.
    ///
    /// The closure must not write to this signal.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Replace the value and notify subscribers.
    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Derive the next value from the current one and replace it atomically.
    ///
    /// The closure must not touch this signal.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        self.tx.send_modify(|current| {
            let next = f(current);
            *current = next;
        });
    }

    /// Like [`Signal::update`], but the closure returns `None` to leave the
    /// value (and its version) untouched. Returns whether a write happened.
    pub fn update_if(&self, f: impl FnOnce(&T) -> Option<T>) -> bool {
        self.tx.send_if_modified(|current| match f(current) {
            Some(next) => {
                *current = next;
                true
            }
            None => false,
        })
    }

    /// Subscribe to changes. The receiver starts with the current value marked as seen.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Send + Sync + 'static> Signal<T> {
    /// Dependency handle for a [`Computed`] cell.
    pub fn dependency(&self) -> Box<dyn Dependency> {
        Box::new(self.subscribe())
    }

    /// Derived cell over this signal alone.
    pub fn map<U, F>(&self, f: F) -> Computed<U>
    where
        U: Clone + Send + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let source = self.clone();
        Computed::new(vec![self.dependency()], move || source.with(&f))
    }
}

/// Something a [`Computed`] cell can poll for "changed since last look".
pub trait Dependency: Send {
    /// Returns whether the source changed, and marks it as seen.
    fn take_changed(&mut self) -> bool;
}

impl<T: Send + Sync> Dependency for watch::Receiver<T> {
    fn take_changed(&mut self) -> bool {
        let changed = self.has_changed().unwrap_or(false);
        if changed {
            self.borrow_and_update();
        }
        changed
    }
}

struct ComputedState<T> {
    dependencies: Vec<Box<dyn Dependency>>,
    cached: Option<T>,
}

/// A cached derivation that recomputes when any dependency changes.
pub struct Computed<T> {
    state: Mutex<ComputedState<T>>,
    compute: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T: Clone + Send + 'static> Computed<T> {
    pub fn new(
        dependencies: Vec<Box<dyn Dependency>>,
        compute: impl Fn() -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            state: Mutex::new(ComputedState {
                dependencies,
                cached: None,
            }),
            compute: Box::new(compute),
        }
    }

    /// Current derived value, recomputed if a dependency changed.
    pub fn get(&self) -> T {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // every dependency must be polled so its "changed" flag is cleared
        let dirty = state
            .dependencies
            .iter_mut()
            .fold(false, |dirty, dep| dep.take_changed() | dirty);

        if dirty || state.cached.is_none() {
            state.cached = Some((self.compute)());
        }

        state.cached.clone().unwrap_or_else(|| (self.compute)())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_set_replaces_value() {
        // テスト項目: set で値が置き換わり、get でスナップショットが得られる
        // given (前提条件):
        let signal = Signal::new(vec![1, 2]);

        // when (操作):
        let before = signal.get();
        signal.set(vec![3]);

        // then (期待する結果):
        assert_eq!(before, vec![1, 2]);
        assert_eq!(signal.get(), vec![3]);
    }

    #[test]
    fn test_update_notifies_subscribers() {
        // テスト項目: update による変更が購読者から観測できる
        // given (前提条件):
        let signal = Signal::new(0u32);
        let mut rx = signal.subscribe();

        // when (操作):
        signal.update(|n| n + 1);

        // then (期待する結果):
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);
    }

    #[test]
    fn test_update_if_none_leaves_version_untouched() {
        // テスト項目: update_if が None を返した場合は購読者に通知されない
        // given (前提条件):
        let signal = Signal::new(5u32);
        let mut rx = signal.subscribe();

        // when (操作):
        let written = signal.update_if(|_| None);

        // then (期待する結果):
        assert!(!written);
        assert!(!rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 5);
    }

    #[test]
    fn test_clones_share_the_same_cell() {
        // テスト項目: clone した Signal は同じ値を共有する
        // given (前提条件):
        let signal = Signal::new("a".to_string());
        let other = signal.clone();

        // when (操作):
        other.set("b".to_string());

        // then (期待する結果):
        assert_eq!(signal.get(), "b");
    }

    #[test]
    fn test_computed_recomputes_only_after_dependency_change() {
        // テスト項目: Computed は依存先が変わった時だけ再計算する
        // given (前提条件):
        let signal = Signal::new(2u32);
        let calls = Arc::new(AtomicUsize::new(0));
        let source = signal.clone();
        let counter = Arc::clone(&calls);
        let doubled = Computed::new(vec![signal.dependency()], move || {
            counter.fetch_add(1, Ordering::SeqCst);
            source.get() * 2
        });

        // when (操作):
        let first = doubled.get();
        let second = doubled.get();
        signal.set(10);
        let third = doubled.get();

        // then (期待する結果):
        assert_eq!((first, second, third), (4, 4, 20));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_computed_with_two_dependencies() {
        // テスト項目: 複数の依存先のどちらが変わっても再計算される
        // given (前提条件):
        let a = Signal::new(1u32);
        let b = Signal::new(1u32);
        let (sa, sb) = (a.clone(), b.clone());
        let sum = Computed::new(vec![a.dependency(), b.dependency()], move || {
            sa.get() + sb.get()
        });

        // when (操作):
        let before = sum.get();
        b.set(5);
        let after_b = sum.get();
        a.set(3);
        let after_a = sum.get();

        // then (期待する結果):
        assert_eq!((before, after_b, after_a), (2, 6, 8));
    }

    #[test]
    fn test_map_derives_from_single_signal() {
        // テスト項目: map で単一の Signal から派生値を作れる
        // given (前提条件):
        let signal = Signal::new(vec![1u32, 2, 3]);
        let total = signal.map(|v| v.iter().sum::<u32>());

        // when (操作):
        let before = total.get();
        signal.update(|v| {
            let mut next = v.clone();
            next.push(4);
            next
        });

        // then (期待する結果):
        assert_eq!(before, 6);
        assert_eq!(total.get(), 10);
    }
}
