use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;

/// Re-exported permit-based gate used to bound concurrent work.
pub use tokio::sync::Semaphore;

/// Run `f` over `items` with at most `limit` futures in flight at once.
///
/// Results come back in input order regardless of completion order. A
/// `limit` of 1 degenerates to strictly sequential execution; `limit` is
/// clamped to at least 1.
pub async fn parallel_map<T, R, F, Fut>(items: Vec<T>, limit: usize, f: F) -> Vec<R>
where
    F: Fn(usize, T) -> Fut,
    Fut: Future<Output = R>,
{
    let gate = Arc::new(Semaphore::new(limit.max(1)));
    let f = &f;
    let tasks = items.into_iter().enumerate().map(|(index, item)| {
        let gate = Arc::clone(&gate);
        async move {
            let _permit = gate
                .acquire_owned()
                .await
                .expect("concurrency gate closed while work was pending");
            f(index, item).await
        }
    });
    join_all(tasks).await
}
