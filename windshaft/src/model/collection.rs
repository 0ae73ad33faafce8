//! Ordered collection of models.

use std::ops::Index;

/// Ordered collection of models with visibility flags.
///
/// The position of an item in the collection is significant: for layers it is the index of
/// the layer in the layer group, which is used in tile urls and to map interactivity events
/// back to the layer.
///
/// Any item can be temporary hidden with the [`Collection::hide`] method. Hidden items retain
/// their place in the collection.
///
/// ```ignore
/// use windshaft::model::{CartoLayer, Collection};
///
/// let mut collection = Collection::default();
/// collection.push(CartoLayer::mapnik("select * from a", "#a {}"));
/// collection.push(CartoLayer::mapnik("select * from b", "#b {}"));
///
/// collection.hide(0);
/// assert_eq!(collection.iter_visible().count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Collection<T>(Vec<Entry<T>>);

#[derive(Debug, Clone)]
struct Entry<T> {
    item: T,
    is_hidden: bool,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> Collection<T> {
    /// Adds the item to the end of the collection.
    pub fn push(&mut self, item: T) {
        self.0.push(Entry {
            item,
            is_hidden: false,
        })
    }

    /// Removes the item at `index`, shifting all items after it to the left and returning the
    /// removed item.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn remove(&mut self, index: usize) -> T {
        self.0.remove(index).item
    }

    /// Returns the count of items in the collection.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the collection contains zero items.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the item at `index`, or `None` if index is out of bounds.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.0.get(index).map(|entry| &entry.item)
    }

    /// Iterates over all items in the collection.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.0.iter().map(|entry| &entry.item)
    }

    /// Iterates over all visible items in the collection.
    pub fn iter_visible(&self) -> impl Iterator<Item = &T> + '_ {
        self.0
            .iter()
            .filter(|entry| !entry.is_hidden)
            .map(|entry| &entry.item)
    }

    /// Sets the item at `index` as invisible.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn hide(&mut self, index: usize) {
        self.0[index].is_hidden = true;
    }

    /// Sets the item at `index` as visible.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn show(&mut self, index: usize) {
        self.0[index].is_hidden = false;
    }

    /// Returns true, if the item at `index` is not hidden.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn is_visible(&self, index: usize) -> bool {
        !self.0[index].is_hidden
    }

    /// Returns a copy of all items in order.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().cloned().collect()
    }
}

impl<T: PartialEq> Collection<T> {
    /// Returns the position of the item in the collection.
    pub fn position(&self, item: &T) -> Option<usize> {
        self.0.iter().position(|entry| entry.item == *item)
    }

    /// Returns true if the item is in the collection.
    pub fn contains(&self, item: &T) -> bool {
        self.position(item).is_some()
    }

    /// Returns true if the item is in the collection and is not hidden.
    pub fn is_item_visible(&self, item: &T) -> bool {
        self.position(item)
            .is_some_and(|index| self.is_visible(index))
    }
}

impl<T> Index<usize> for Collection<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index].item
    }
}

impl<T> FromIterator<T> for Collection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|item| Entry {
                    item,
                    is_hidden: false,
                })
                .collect(),
        )
    }
}
