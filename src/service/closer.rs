use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rocket::tokio::{self, task::JoinHandle, time::Duration};

use super::ElectionService;

/// Delay before the first retry of a failed close. Doubles up to [`MAX_RETRY_DELAY`].
const RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Closes an active election when its scheduled deadline passes.
///
/// At most one close is pending at a time; scheduling a new one replaces it.
#[derive(Default)]
pub struct ElectionCloser {
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ElectionCloser {
    /// Close the election at `deadline`, or immediately if it has already passed.
    pub fn schedule(&self, service: ElectionService, deadline: DateTime<Utc>) {
        let sleep_duration = datetime_to_duration(deadline);
        debug!("Scheduling election close in {}s", sleep_duration.as_secs());

        let task = tokio::spawn(async move {
            tokio::time::sleep(sleep_duration).await;

            // Keep trying until the close lands or the task is cancelled.
            let mut retry_delay = RETRY_DELAY;
            loop {
                match service.close_if_due().await {
                    Ok(true) => {
                        info!("Election deadline reached, voting is closed");
                        break;
                    }
                    Ok(false) => {
                        debug!("Election closer woke with nothing to close");
                        break;
                    }
                    Err(e) => {
                        error!(
                            "Failed to close election at its deadline, retrying in {}s: {e}",
                            retry_delay.as_secs()
                        );
                        tokio::time::sleep(retry_delay).await;
                        retry_delay = (retry_delay * 2).min(MAX_RETRY_DELAY);
                    }
                }
            }
        });

        if let Some(previous) = self.task.lock().replace(task) {
            previous.abort();
        }
    }

    /// Drop any pending close.
    pub fn cancel(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

/// Convert a `DateTime` into a duration from the current instant.
/// A `DateTime` in the past will produce a duration of zero.
fn datetime_to_duration(datetime: DateTime<Utc>) -> Duration {
    let target_timestamp = datetime.timestamp_millis();
    let now_timestamp = Utc::now().timestamp_millis();
    let time_diff = u64::try_from(target_timestamp - now_timestamp).unwrap_or(0);
    Duration::from_millis(time_diff)
}
