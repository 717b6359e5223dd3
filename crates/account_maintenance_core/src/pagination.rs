use std::marker::PhantomData;

/// One page of a provider listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }
}

/// Lazy walk over a token-paginated listing.
///
/// The next page is only requested once the items of the previous page have
/// been yielded. A failed page is yielded once as `Err` and ends the walk.
/// The iterator holds no state beyond the current token, so starting over
/// means calling [`paginate`] again.
pub struct Paginated<T, E, F> {
    fetch: F,
    buffered: std::vec::IntoIter<T>,
    next_token: Option<String>,
    finished: bool,
    #[cfg(test)]
    pages_fetched: usize,
    _error: PhantomData<fn() -> E>,
}

pub fn paginate<T, E, F>(fetch: F) -> Paginated<T, E, F>
where
    F: FnMut(Option<&str>) -> Result<Page<T>, E>,
{
    Paginated {
        fetch,
        buffered: Vec::new().into_iter(),
        next_token: None,
        finished: false,
        #[cfg(test)]
        pages_fetched: 0,
        _error: PhantomData,
    }
}

#[cfg(test)]
impl<T, E, F> Paginated<T, E, F> {
    fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }
}

impl<T, E, F> Iterator for Paginated<T, E, F>
where
    F: FnMut(Option<&str>) -> Result<Page<T>, E>,
{
    type Item = Result<T, E>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffered.next() {
                return Some(Ok(item));
            }
            if self.finished {
                return None;
            }

            match (self.fetch)(self.next_token.as_deref()) {
                Ok(page) => {
                    #[cfg(test)]
                    {
                        self.pages_fetched += 1;
                    }
                    self.next_token = page.next_token.filter(|token| !token.is_empty());
                    self.finished = self.next_token.is_none();
                    self.buffered = page.items.into_iter();
                }
                Err(error) => {
                    self.finished = true;
                    return Some(Err(error));
                }
            }
        }
    }
}
