//! Insertion-ordered list that reports its own mutations.
//!
//! [`ObservedList`] is the building block of the task queue: one instance
//! holds waiting entities, another holds the ones being processed. Each list
//! can carry an append observer and a remove observer; both fire
//! synchronously right after the mutation they describe.

use std::fmt;

use crate::error::{Error, Result};

/// Observer invoked with the item that was just appended or removed.
pub type Observer<T> = Box<dyn FnMut(&T) + Send>;

pub struct ObservedList<T> {
    items: Vec<T>,
    on_append: Option<Observer<T>>,
    on_remove: Option<Observer<T>>,
}

impl<T> ObservedList<T> {
    /// Create an empty list with no observers.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            on_append: None,
            on_remove: None,
        }
    }

    /// Create an empty list with both observers installed.
    pub fn with_observers(on_append: Observer<T>, on_remove: Observer<T>) -> Self {
        Self {
            items: Vec::new(),
            on_append: Some(on_append),
            on_remove: Some(on_remove),
        }
    }

    pub fn set_on_append(&mut self, observer: Observer<T>) {
        self.on_append = Some(observer);
    }

    pub fn set_on_remove(&mut self, observer: Observer<T>) {
        self.on_remove = Some(observer);
    }

    /// Push `item` to the end, then notify the append observer.
    pub fn append(&mut self, item: T) {
        self.items.push(item);
        if let (Some(observer), Some(last)) = (self.on_append.as_mut(), self.items.last()) {
            observer(last);
        }
    }

    /// Remove and return the item at `index`, then notify the remove observer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfBounds`] when `index >= len()`; the list is
    /// left untouched and no observer fires.
    pub fn remove_at(&mut self, index: usize) -> Result<T> {
        if index >= self.items.len() {
            return Err(Error::IndexOutOfBounds {
                index,
                len: self.items.len(),
            });
        }
        let item = self.items.remove(index);
        if let Some(observer) = self.on_remove.as_mut() {
            observer(&item);
        }
        Ok(item)
    }

    /// Move the item at `index` to the end of `destination`.
    ///
    /// This list's remove observer fires before the destination's append
    /// observer.
    pub fn move_to(&mut self, index: usize, destination: &mut ObservedList<T>) -> Result<()> {
        let item = self.remove_at(index)?;
        destination.append(item);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Index of the first item matching `predicate`.
    pub fn position<P>(&self, predicate: P) -> Option<usize>
    where
        P: FnMut(&T) -> bool,
    {
        self.items.iter().position(predicate)
    }
}

impl<T: Clone> ObservedList<T> {
    /// A copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.clone()
    }
}

impl<T> Default for ObservedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservedList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservedList")
            .field("items", &self.items)
            .field("on_append", &self.on_append.is_some())
            .field("on_remove", &self.on_remove.is_some())
            .finish()
    }
}
