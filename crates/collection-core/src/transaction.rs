use std::ops::{Deref, DerefMut};

use crate::collection::MutableCollection;
use crate::document::Document;

/// Scoped transaction on a [`Document`].
///
/// Opening one increments the document's transaction depth; dropping it
/// decrements the depth again on every exit path, including `?` returns.
/// When the outermost scope closes, subscribers are notified once for the
/// whole batch.
pub struct Transaction<'a, T: Clone, C: MutableCollection<T>> {
    document: &'a mut Document<T, C>,
}

impl<'a, T: Clone, C: MutableCollection<T>> Transaction<'a, T, C> {
    pub(crate) fn new(document: &'a mut Document<T, C>) -> Self {
        document.start_transaction();
        Self { document }
    }
}

impl<T: Clone, C: MutableCollection<T>> Deref for Transaction<'_, T, C> {
    type Target = Document<T, C>;

    fn deref(&self) -> &Self::Target {
        self.document
    }
}

impl<T: Clone, C: MutableCollection<T>> DerefMut for Transaction<'_, T, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.document
    }
}

impl<T: Clone, C: MutableCollection<T>> Drop for Transaction<'_, T, C> {
    fn drop(&mut self) {
        self.document.end_transaction();
    }
}
