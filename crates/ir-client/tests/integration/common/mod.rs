//! Shared helpers for integration tests.

pub mod mock_ws;

/// Re-evaluate `$check` every 20ms until it is true or `$timeout` elapses.
/// Evaluates to whether the condition was met. `$check` may `.await`.
macro_rules! wait_until {
    ($timeout:expr, $check:expr) => {{
        let deadline = tokio::time::Instant::now() + $timeout;
        loop {
            if $check {
                break true;
            }
            if tokio::time::Instant::now() >= deadline {
                break false;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
    }};
}
