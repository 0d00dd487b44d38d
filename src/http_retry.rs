//! Shared retry/backoff policy for outbound calls to Overpass and
//! Wikidata: up to `max_attempts` tries, retrying on 429/5xx and network
//! errors with a `400ms × attempt` sleep; any other non-OK status fails
//! immediately without retrying.

use std::time::Duration;

pub enum RetryOutcome {
    Success(String),
    Failed(anyhow::Error),
}

/// Sends a request built from `request_builder`, retrying on 429/5xx and
/// transport errors. The builder must be cloneable (i.e. built from a
/// concrete in-memory body, not a stream).
pub async fn send_with_retry(request_builder: reqwest::RequestBuilder, max_attempts: u32) -> RetryOutcome {
    let mut last_error: Option<anyhow::Error> = None;

    for attempt in 1..=max_attempts {
        let Some(builder) = request_builder.try_clone() else {
            return RetryOutcome::Failed(anyhow::anyhow!("request body is not cloneable"));
        };

        match builder.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return match response.text().await {
                        Ok(body) => RetryOutcome::Success(body),
                        Err(e) => RetryOutcome::Failed(e.into()),
                    };
                }

                if status.as_u16() == 429 || status.is_server_error() {
                    last_error = Some(anyhow::anyhow!("upstream returned {status}"));
                    sleep_backoff(attempt).await;
                    continue;
                }

                return RetryOutcome::Failed(anyhow::anyhow!("upstream returned {status}"));
            }
            Err(e) => {
                last_error = Some(e.into());
                sleep_backoff(attempt).await;
            }
        }
    }

    RetryOutcome::Failed(
        last_error.unwrap_or_else(|| anyhow::anyhow!("retry attempts exhausted with no response")),
    )
}

async fn sleep_backoff(attempt: u32) {
    tokio::time::sleep(Duration::from_millis(400 * attempt as u64)).await;
}

/// POSTs a plain-text body with the shared retry policy.
pub async fn post_text_with_retry(
    client: &reqwest::Client,
    url: &str,
    body: &str,
    max_attempts: u32,
) -> RetryOutcome {
    let builder = client
        .post(url)
        .header("content-type", "text/plain; charset=utf-8")
        .body(body.to_owned());
    send_with_retry(builder, max_attempts).await
}

/// GETs a URL with the shared retry policy.
pub async fn get_with_retry(client: &reqwest::Client, url: &str, max_attempts: u32) -> RetryOutcome {
    send_with_retry(client.get(url), max_attempts).await
}
