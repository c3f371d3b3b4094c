use futures::future::join_all;
use std::future::Future;
use tokio::sync::Semaphore;

/// 以有限并发数执行一组Future，结果顺序与输入顺序一致
///
/// 所有Future都在当前任务内被轮询，信号量只限制同时处于执行中的数量。
/// `max_concurrent`为0时按1处理。
pub async fn do_parallel_with_limit<F, T>(futures: Vec<F>, max_concurrent: usize) -> Vec<T>
where
    F: Future<Output = T>,
{
    let semaphore = Semaphore::new(max_concurrent.max(1));

    let gated = futures.into_iter().map(|future| {
        let semaphore = &semaphore;
        async move {
            // 信号量在本函数内不会被关闭
            let _permit = semaphore.acquire().await.ok();
            future.await
        }
    });

    join_all(gated).await
}
