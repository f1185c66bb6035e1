//! Future combinators for racing a batch against a deadline.

use std::future::Future;

use futures_util::stream::{FuturesUnordered, StreamExt};

/// Outcome of one task in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled<T, E> {
    /// The task had not finished when the batch was abandoned.
    Pending,
    /// The task finished successfully.
    Resolved(T),
    /// The task finished with an error.
    Failed(E),
}

impl<T, E> Settled<T, E> {
    /// Whether the task finished, either way.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Settled::Pending)
    }
}

/// Which of two raced futures finished first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum First<A, B> {
    Left(A),
    Right(B),
}

/// Race two futures; the loser is dropped.
///
/// When both are ready on the same poll, `left` wins.
pub async fn first_of<A, B>(left: A, right: B) -> First<A::Output, B::Output>
where
    A: Future,
    B: Future,
{
    tokio::pin!(left);
    tokio::pin!(right);

    tokio::select! {
        biased;
        a = &mut left => First::Left(a),
        b = &mut right => First::Right(b),
    }
}

/// Drive every task to completion, writing each outcome into its slot.
///
/// Slots are written as tasks finish, so a caller that abandons this future
/// early (for example through [`first_of`]) still sees every outcome that
/// arrived in time; the rest stay [`Settled::Pending`]. `slots` must be at
/// least as long as `tasks`.
pub async fn all_settled<F, T, E>(tasks: Vec<F>, slots: &mut [Settled<T, E>])
where
    F: Future<Output = Result<T, E>>,
{
    let mut running: FuturesUnordered<_> = tasks
        .into_iter()
        .enumerate()
        .map(|(i, task)| async move { (i, task.await) })
        .collect();

    while let Some((i, outcome)) = running.next().await {
        if let Some(slot) = slots.get_mut(i) {
            *slot = match outcome {
                Ok(value) => Settled::Resolved(value),
                Err(e) => Settled::Failed(e),
            };
        }
    }
}

/// Run `tasks` concurrently until all settle or `deadline` completes.
///
/// Returns the per-task outcomes (index-aligned with `tasks`) and whether the
/// deadline won the race.
pub async fn settle_within<F, T, E, D>(tasks: Vec<F>, deadline: D) -> (Vec<Settled<T, E>>, bool)
where
    F: Future<Output = Result<T, E>>,
    D: Future<Output = ()>,
{
    let mut slots: Vec<Settled<T, E>> = (0..tasks.len()).map(|_| Settled::Pending).collect();
    let timed_out = matches!(
        first_of(all_settled(tasks, &mut slots), deadline).await,
        First::Right(())
    );
    (slots, timed_out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefetch::{ManualTimer, Timer};
    use futures_util::future::{pending, ready, BoxFuture, FutureExt};
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready, task};

    type Task = BoxFuture<'static, Result<u32, &'static str>>;

    #[tokio::test]
    async fn test_first_of_left_wins_tie() {
        let result = first_of(ready(1), ready("b")).await;
        assert_eq!(result, First::Left(1));
    }

    #[tokio::test]
    async fn test_first_of_right() {
        let result = first_of(pending::<()>(), ready(7)).await;
        assert_eq!(result, First::Right(7));
    }

    #[tokio::test]
    async fn test_all_settled_before_deadline() {
        let tasks: Vec<Task> = vec![ready(Ok(1)).boxed(), ready(Err("boom")).boxed()];

        let (slots, timed_out) = settle_within(tasks, pending::<()>()).await;

        assert!(!timed_out);
        assert_eq!(slots, vec![Settled::Resolved(1), Settled::Failed("boom")]);
    }

    #[tokio::test]
    async fn test_deadline_keeps_partial_results() {
        let timer = ManualTimer::new();
        timer.fire();
        let tasks: Vec<Task> = vec![
            ready(Ok(1)).boxed(),
            pending().boxed(),
            ready(Ok(3)).boxed(),
            pending().boxed(),
        ];

        let (slots, timed_out) = settle_within(tasks, timer.sleep(Duration::from_secs(25))).await;

        assert!(timed_out);
        assert_eq!(
            slots,
            vec![
                Settled::Resolved(1),
                Settled::Pending,
                Settled::Resolved(3),
                Settled::Pending
            ]
        );
    }

    #[test]
    fn test_batch_waits_for_timer() {
        let timer = ManualTimer::new();
        let tasks: Vec<Task> = vec![ready(Ok(1)).boxed(), pending().boxed()];
        let mut race = task::spawn(settle_within(tasks, timer.sleep(Duration::from_secs(25))));

        // One task is still outstanding and the timer has not fired.
        assert_pending!(race.poll());

        timer.fire();
        assert!(race.is_woken());
        let (slots, timed_out) = assert_ready!(race.poll());
        assert!(timed_out);
        assert_eq!(slots[0], Settled::Resolved(1));
        assert!(!slots[1].is_settled());
    }

    #[tokio::test]
    async fn test_empty_batch_settles_immediately() {
        let tasks: Vec<Task> = Vec::new();
        let (slots, timed_out) = settle_within(tasks, pending::<()>()).await;
        assert!(slots.is_empty());
        assert!(!timed_out);
    }
}
