//! Page-numbered infinite queries.
//!
//! The API gives no total count, so a page that comes back full is taken to
//! mean another page may follow. A short page ends the list.

use std::future::Future;

use futures_util::future::{BoxFuture, FutureExt};
use newsfeed_core::Error;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{Begin, QueryClient, QueryKey, decode, erase, resolve};

/// Pages loaded so far for one infinite query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfinitePages<T> {
    pub pages: Vec<Vec<T>>,
    /// Page number each entry of `pages` was fetched with, starting at 1.
    pub page_params: Vec<u32>,
    pub page_size: u32,
}

impl<T> InfinitePages<T> {
    pub fn first(items: Vec<T>, page_size: u32) -> Self {
        Self { pages: vec![items], page_params: vec![1], page_size }
    }

    /// True when the last loaded page was full.
    pub fn has_next_page(&self) -> bool {
        self.pages.last().is_some_and(|last| last.len() >= self.page_size as usize)
    }

    /// Page number to request next, or `None` once exhausted.
    pub fn next_page_param(&self) -> Option<u32> {
        self.has_next_page().then(|| self.pages.len() as u32 + 1)
    }

    pub fn push(&mut self, param: u32, items: Vec<T>) {
        self.pages.push(items);
        self.page_params.push(param);
    }

    /// All items in page order.
    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.pages.iter().flatten()
    }

    pub fn into_items(self) -> Vec<T> {
        self.pages.into_iter().flatten().collect()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

impl QueryClient {
    /// Load the first page of an infinite query.
    ///
    /// Fresh cached pages are returned as they are. A refetch starts over at page 1.
    pub fn fetch_infinite_query<T, P, Fut>(
        &self, key: QueryKey, page_size: u32, fetch_page: P,
    ) -> BoxFuture<'static, Result<InfinitePages<T>, Error>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        P: FnOnce(u32) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<T>, Error>> + Send + 'static,
    {
        if page_size == 0 {
            return async { Err(Error::InvalidInput("page size must be at least 1".into())) }.boxed();
        }

        self.fetch_query(key, async move {
            let items = fetch_page(1).await?;
            Ok(InfinitePages::first(items, page_size))
        })
    }

    /// Append the next page when the last one was full. A no-op once exhausted.
    ///
    /// A refetch already in flight is awaited first, so the next page number
    /// is always derived from the latest committed pages.
    pub fn fetch_next_page<T, P, Fut>(&self, key: QueryKey, fetch_page: P) -> BoxFuture<'static, Result<InfinitePages<T>, Error>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        P: FnOnce(u32) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<T>, Error>> + Send + 'static,
    {
        let client = self.clone();
        async move {
            while let Some(pending) = client.pending(&key) {
                if let Err(e) = pending.await {
                    tracing::debug!(key = %key, "refetch before next page failed: {}", e);
                }
            }

            let begin = {
                let mut state = client.inner.lock();
                let data = state.entries.get(&key).and_then(|entry| entry.data.clone());
                let current: InfinitePages<T> = match data {
                    Some(value) => decode(value)?,
                    None => return Err(Error::CacheMiss(key.to_string())),
                };

                let Some(param) = current.next_page_param() else {
                    tracing::debug!(key = %key, pages = current.page_count(), "no more pages");
                    return Ok(current);
                };

                Begin::Pending(client.start_fetch(
                    &mut state,
                    &key,
                    erase(async move {
                        let items = fetch_page(param).await?;
                        let mut pages = current;
                        pages.push(param, items);
                        Ok(pages)
                    }),
                ))
            };

            resolve(begin).await
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    fn page(param: u32, len: usize) -> Vec<u32> {
        (0..len as u32).map(|i| param * 100 + i).collect()
    }

    fn source(
        calls: &Arc<AtomicUsize>, len: usize,
    ) -> impl FnOnce(u32) -> BoxFuture<'static, Result<Vec<u32>, Error>> + Send + 'static {
        let calls = calls.clone();
        move |param| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(page(param, len)) }.boxed()
        }
    }

    #[test]
    fn test_full_page_has_next() {
        let pages = InfinitePages::first(page(1, 20), 20);
        assert!(pages.has_next_page());
        assert_eq!(pages.next_page_param(), Some(2));
    }

    #[test]
    fn test_short_page_is_exhausted() {
        let mut pages = InfinitePages::first(page(1, 20), 20);
        pages.push(2, page(2, 19));
        assert!(!pages.has_next_page());
        assert_eq!(pages.next_page_param(), None);
        assert_eq!(pages.items().count(), 39);
        assert_eq!(pages.page_params, vec![1, 2]);
    }

    #[test]
    fn test_empty_first_page_is_exhausted() {
        let pages = InfinitePages::<u32>::first(Vec::new(), 20);
        assert!(!pages.has_next_page());
    }

    #[tokio::test]
    async fn test_next_page_appends_until_short() {
        let client = QueryClient::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::articles();

        let pages = client.fetch_infinite_query(key.clone(), 3, source(&calls, 3)).await.unwrap();
        assert_eq!(pages.into_items(), vec![100, 101, 102]);

        let pages = client.fetch_next_page(key.clone(), source(&calls, 3)).await.unwrap();
        assert_eq!(pages.page_params, vec![1, 2]);
        assert!(pages.has_next_page());

        let pages = client.fetch_next_page(key.clone(), source(&calls, 1)).await.unwrap();
        assert_eq!(pages.page_count(), 3);
        assert!(!pages.has_next_page());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let pages = client.fetch_next_page(key.clone(), source(&calls, 3)).await.unwrap();
        assert_eq!(pages.page_count(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let cached: InfinitePages<u32> = client.get_query_data(&key).unwrap();
        assert_eq!(cached.items().copied().collect::<Vec<_>>(), vec![100, 101, 102, 200, 201, 202, 300]);
    }

    #[tokio::test]
    async fn test_refetch_restarts_from_first_page() {
        let client = QueryClient::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::articles();

        client.fetch_infinite_query(key.clone(), 2, source(&calls, 2)).await.unwrap();
        client.fetch_next_page(key.clone(), source(&calls, 2)).await.unwrap();
        client.invalidate_queries(&key);

        let pages = client.fetch_infinite_query(key.clone(), 2, source(&calls, 2)).await.unwrap();
        assert_eq!(pages.page_count(), 1);
        assert_eq!(pages.page_params, vec![1]);
    }

    #[tokio::test]
    async fn test_next_page_waits_for_refetch_in_flight() {
        let client = QueryClient::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::articles();
        client.fetch_infinite_query(key.clone(), 2, source(&calls, 2)).await.unwrap();

        let (tx, rx) = oneshot::channel::<()>();
        let refetch = client.fetch_infinite_query(key.clone(), 2, move |param| async move {
            let _ = rx.await;
            Ok::<_, Error>(page(param, 2))
        });
        let next = tokio::spawn(client.fetch_next_page(key.clone(), source(&calls, 2)));
        tokio::task::yield_now().await;

        tx.send(()).unwrap();
        let next = next.await.unwrap().unwrap();
        assert_eq!(next.page_params, vec![1, 2]);
        assert_eq!(refetch.await.unwrap().page_count(), 1);

        let cached: InfinitePages<u32> = client.get_query_data(&key).unwrap();
        assert_eq!(cached.page_count(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_next_page_without_first_is_cache_miss() {
        let client = QueryClient::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let result = client.fetch_next_page(QueryKey::articles(), source(&calls, 3)).await;
        assert!(matches!(result, Err(Error::CacheMiss(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_page_size_rejected() {
        let client = QueryClient::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let result = client.fetch_infinite_query(QueryKey::articles(), 0, source(&calls, 3)).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
