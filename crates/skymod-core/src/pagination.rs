use tracing::debug;

use crate::{ModerationError, PageSource};

/// Largest page the list endpoints accept.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub page_size: u32,
    /// Give up after this many requests. `None` follows cursors until the
    /// server stops returning one.
    pub max_pages: Option<usize>,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: None,
        }
    }
}

/// Reads every page of `source`, keeping server order. An absent or empty
/// cursor ends the listing.
pub async fn list_collection<P>(
    source: &P,
    limits: PageLimits,
) -> Result<Vec<P::Item>, ModerationError>
where
    P: PageSource + ?Sized,
{
    let collection = source.collection();
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;
    loop {
        if limits.max_pages.is_some_and(|max| pages >= max) {
            return Err(ModerationError::PageLimitExceeded {
                collection: collection.to_owned(),
                pages,
            });
        }
        let page = source
            .list_page(cursor.as_deref(), limits.page_size)
            .await
            .map_err(|source| ModerationError::TransportFailure {
                operation: format!("list {collection}"),
                source,
            })?;
        pages += 1;
        debug!(
            collection,
            page = pages,
            items = page.items.len(),
            more = page.cursor.is_some(),
            "fetched page"
        );
        items.extend(page.items);
        cursor = page.cursor.filter(|c| !c.is_empty());
        if cursor.is_none() {
            return Ok(items);
        }
    }
}
