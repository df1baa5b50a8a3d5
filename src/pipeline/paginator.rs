// src/pipeline/paginator.rs

//! Budgeted pagination over a page-based source.
//!
//! A [`Paginator`] drives a [`PageSource`]: fetch the first page, yield its
//! items, then keep asking for the next page while the source has one and
//! the budgets allow it.
//!
//! Budgets are checked before every yield and again once a page runs dry, so
//! the last page is cut exactly at `max_items`. The page counter starts at 0
//! and increments after each successive fetch; once it reaches `max_pages`
//! no further items are yielded.

/// A paginated data source.
pub trait PageSource {
    type Page;
    type Item;

    /// Fetch the first page.
    fn first_page(&self) -> Self::Page;

    /// Items carried by a page. An empty page ends pagination.
    fn items(&self, page: &Self::Page) -> Vec<Self::Item>;

    /// Whether another page follows `page`.
    fn has_next_page(&self, page: &Self::Page) -> bool;

    /// Fetch the page following `prev`.
    fn next_page(&self, prev: &Self::Page) -> Self::Page;
}

impl<S: PageSource + ?Sized> PageSource for &S {
    type Page = S::Page;
    type Item = S::Item;

    fn first_page(&self) -> Self::Page {
        (**self).first_page()
    }

    fn items(&self, page: &Self::Page) -> Vec<Self::Item> {
        (**self).items(page)
    }

    fn has_next_page(&self, page: &Self::Page) -> bool {
        (**self).has_next_page(page)
    }

    fn next_page(&self, prev: &Self::Page) -> Self::Page {
        (**self).next_page(prev)
    }
}

/// Page and item caps. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Budget {
    pub max_pages: Option<usize>,
    pub max_items: Option<usize>,
}

impl Budget {
    pub fn new(max_pages: Option<usize>, max_items: Option<usize>) -> Self {
        Self {
            max_pages,
            max_items,
        }
    }

    fn reached(&self, page_count: usize, item_count: usize) -> bool {
        let pages = self.max_pages.is_some_and(|max| max <= page_count);
        let items = self.max_items.is_some_and(|max| max <= item_count);
        pages || items
    }
}

/// Drives one logical listing over a [`PageSource`].
#[derive(Debug, Clone)]
pub struct Paginator<S> {
    source: S,
    budget: Budget,
}

impl<S: PageSource> Paginator<S> {
    /// Create an unbounded paginator.
    pub fn new(source: S) -> Self {
        Self::with_budget(source, Budget::default())
    }

    pub fn with_budget(source: S, budget: Budget) -> Self {
        Self { source, budget }
    }

    /// Replace both budgets for the next run.
    pub fn set_budget(&mut self, max_pages: Option<usize>, max_items: Option<usize>) {
        self.budget = Budget::new(max_pages, max_items);
    }

    pub fn budget(&self) -> Budget {
        self.budget
    }

    /// Lazily yield items, borrowing the source.
    pub fn produce(&self) -> Produce<&S> {
        Produce::new(&self.source, self.budget)
    }

    /// Lazily yield items, taking ownership of the source.
    pub fn into_produce(self) -> Produce<S> {
        Produce::new(self.source, self.budget)
    }
}

/// Iterator returned by [`Paginator::produce`].
pub struct Produce<S: PageSource> {
    source: S,
    budget: Budget,
    page: Option<S::Page>,
    items: std::vec::IntoIter<S::Item>,
    page_count: usize,
    item_count: usize,
    started: bool,
    done: bool,
}

impl<S: PageSource> Produce<S> {
    fn new(source: S, budget: Budget) -> Self {
        Self {
            source,
            budget,
            page: None,
            items: Vec::new().into_iter(),
            page_count: 0,
            item_count: 0,
            started: false,
            done: false,
        }
    }

    fn load(&mut self, page: S::Page) {
        let items = self.source.items(&page);
        if items.is_empty() {
            self.done = true;
        }
        self.items = items.into_iter();
        self.page = Some(page);
    }

    fn finish(&mut self) -> Option<S::Item> {
        self.done = true;
        self.page = None;
        None
    }
}

impl<S: PageSource> Iterator for Produce<S> {
    type Item = S::Item;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            let first = self.source.first_page();
            self.load(first);
            if self.done {
                return self.finish();
            }
        }

        loop {
            if self.budget.reached(self.page_count, self.item_count) {
                return self.finish();
            }
            if let Some(item) = self.items.next() {
                self.item_count += 1;
                return Some(item);
            }

            let Some(page) = self.page.take() else {
                return self.finish();
            };
            if !self.source.has_next_page(&page) {
                return self.finish();
            }
            let next = self.source.next_page(&page);
            self.page_count += 1;
            self.load(next);
            if self.done {
                return self.finish();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Serves the same page forever and counts every call.
    struct Recorded {
        page_size: usize,
        has_next: bool,
        first: Cell<usize>,
        items: Cell<usize>,
        has_next_calls: Cell<usize>,
        next_calls: Cell<usize>,
    }

    impl Recorded {
        fn new(page_size: usize, has_next: bool) -> Self {
            Self {
                page_size,
                has_next,
                first: Cell::new(0),
                items: Cell::new(0),
                has_next_calls: Cell::new(0),
                next_calls: Cell::new(0),
            }
        }

        fn calls(&self) -> (usize, usize, usize, usize) {
            (
                self.first.get(),
                self.items.get(),
                self.has_next_calls.get(),
                self.next_calls.get(),
            )
        }
    }

    impl PageSource for Recorded {
        type Page = usize;
        type Item = usize;

        fn first_page(&self) -> usize {
            self.first.set(self.first.get() + 1);
            0
        }

        fn items(&self, page: &usize) -> Vec<usize> {
            self.items.set(self.items.get() + 1);
            (0..self.page_size).map(|i| page * 100 + i).collect()
        }

        fn has_next_page(&self, _page: &usize) -> bool {
            self.has_next_calls.set(self.has_next_calls.get() + 1);
            self.has_next
        }

        fn next_page(&self, prev: &usize) -> usize {
            self.next_calls.set(self.next_calls.get() + 1);
            prev + 1
        }
    }

    #[test]
    fn test_empty_result() {
        let paginator = Paginator::new(Recorded::new(0, true));
        assert_eq!(paginator.produce().count(), 0);
        assert_eq!(paginator.source.calls(), (1, 1, 0, 0));
    }

    #[test]
    fn test_single_page_without_budget() {
        let paginator = Paginator::new(Recorded::new(10, false));
        assert_eq!(paginator.produce().collect::<Vec<_>>(), (0..10).collect::<Vec<_>>());
        assert_eq!(paginator.source.calls(), (1, 1, 1, 0));
    }

    #[test]
    fn test_item_budget_truncates_first_page() {
        let mut paginator = Paginator::new(Recorded::new(10, true));
        paginator.set_budget(None, Some(5));

        assert_eq!(paginator.produce().count(), 5);
        assert_eq!(paginator.source.calls(), (1, 1, 0, 0));
    }

    #[test]
    fn test_item_budget_equal_to_page_skips_next_check() {
        let mut paginator = Paginator::new(Recorded::new(10, true));
        paginator.set_budget(None, Some(10));

        assert_eq!(paginator.produce().count(), 10);
        assert_eq!(paginator.source.calls(), (1, 1, 0, 0));
    }

    #[test]
    fn test_item_budget_truncates_mid_page() {
        let mut paginator = Paginator::new(Recorded::new(5, true));
        paginator.set_budget(None, Some(14));

        let items: Vec<_> = paginator.produce().collect();
        assert_eq!(items.len(), 14);
        assert_eq!(items[13], 203);
        assert_eq!(paginator.source.calls(), (1, 3, 2, 2));
    }

    #[test]
    fn test_page_budget_wins_over_item_budget() {
        let mut paginator = Paginator::new(Recorded::new(5, true));
        paginator.set_budget(Some(1), Some(10));

        assert_eq!(paginator.produce().count(), 5);
        assert_eq!(paginator.source.calls(), (1, 2, 1, 1));
    }

    #[test]
    fn test_pages_until_source_runs_out() {
        struct ThreePages;

        impl PageSource for ThreePages {
            type Page = usize;
            type Item = usize;

            fn first_page(&self) -> usize {
                0
            }
            fn items(&self, page: &usize) -> Vec<usize> {
                vec![*page; 2]
            }
            fn has_next_page(&self, page: &usize) -> bool {
                *page < 2
            }
            fn next_page(&self, prev: &usize) -> usize {
                prev + 1
            }
        }

        let items: Vec<_> = Paginator::new(ThreePages).into_produce().collect();
        assert_eq!(items, vec![0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn test_nothing_fetched_until_polled() {
        let paginator = Paginator::new(Recorded::new(3, false));
        let produce = paginator.produce();
        assert_eq!(paginator.source.calls(), (0, 0, 0, 0));
        drop(produce);
    }

    #[test]
    fn test_set_budget_resets_previous_run() {
        let mut paginator = Paginator::new(Recorded::new(5, false));
        paginator.set_budget(None, Some(2));
        assert_eq!(paginator.produce().count(), 2);

        paginator.set_budget(None, None);
        assert_eq!(paginator.produce().count(), 5);
    }
}
