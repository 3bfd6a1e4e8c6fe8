//! Cursor pagination
//!
//! Each page names the next page number, or `null` when exhausted. Both
//! wrappers start at page 1, fetch lazily and stop exactly at the null cursor.
//! They are forward-only: restarting means building a new one.

use std::collections::VecDeque;
use std::future::Future;
use std::marker::PhantomData;

use futures_util::stream::{self, Stream, TryStreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, Result};

/// First page number of every listing
pub const FIRST_PAGE: u32 = 1;

/// A page of a cursor-paginated listing
pub trait Page {
    type Item;

    fn next_page(&self) -> Option<u32>;
    fn into_items(self) -> Vec<Self::Item>;
}

/// One page of `gettransactions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionPage {
    #[serde(default)]
    pub current_page: u32,
    pub next_page: Option<u32>,
    #[serde(default)]
    pub max_per_page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub transactions: Vec<Value>,
}

impl Page for TransactionPage {
    type Item = Value;

    fn next_page(&self) -> Option<u32> {
        self.next_page
    }

    fn into_items(self) -> Vec<Value> {
        self.transactions
    }
}

/// Flatten pages fetched by `fetch` into one stream of items
pub fn paginate<P, F, Fut>(fetch: F) -> impl Stream<Item = Result<P::Item>>
where
    P: Page,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<P>>,
{
    stream::try_unfold(
        (Some(FIRST_PAGE), fetch),
        |(cursor, mut fetch)| async move {
            let Some(page_number) = cursor else {
                return Ok(None);
            };
            let page = fetch(page_number).await?;
            let next = page.next_page();
            let items = stream::iter(page.into_items().into_iter().map(Ok::<_, ClientError>));
            Ok::<_, ClientError>(Some((items, (next, fetch))))
        },
    )
    .try_flatten()
}

/// Blocking counterpart of [`paginate`]
pub struct PageIter<P: Page, F> {
    fetch: F,
    cursor: Option<u32>,
    buffer: VecDeque<P::Item>,
    _page: PhantomData<fn() -> P>,
}

impl<P, F> PageIter<P, F>
where
    P: Page,
    F: FnMut(u32) -> Result<P>,
{
    pub fn new(fetch: F) -> Self {
        Self {
            fetch,
            cursor: Some(FIRST_PAGE),
            buffer: VecDeque::new(),
            _page: PhantomData,
        }
    }
}

impl<P, F> Iterator for PageIter<P, F>
where
    P: Page,
    F: FnMut(u32) -> Result<P>,
{
    type Item = Result<P::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            let page_number = self.cursor?;
            match (self.fetch)(page_number) {
                Ok(page) => {
                    self.cursor = page.next_page();
                    self.buffer.extend(page.into_items());
                }
                Err(e) => {
                    // A failed page ends the sequence
                    self.cursor = None;
                    return Some(Err(e));
                }
            }
        }
    }
}
