use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tonic::Status;

/// Bounds how many calls are processed at once.
#[derive(Clone, Debug)]
pub struct WorkerPool {
    sem: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            sem: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn available(&self) -> usize {
        self.sem.available_permits()
    }

    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, Status> {
        self.sem
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Status::unavailable("worker pool closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_zero_is_clamped_to_one_worker() {
        let pool = WorkerPool::new(0);

        assert_eq!(pool.size(), 1);
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn test_permit_is_returned_on_drop() {
        let pool = WorkerPool::new(1);

        let permit = pool.acquire().await.unwrap();
        assert_eq!(pool.available(), 0);

        drop(permit);
        assert_eq!(pool.available(), 1);
    }
}
