//! Bounded retry around a single channel send.

use relay_channel::{ChannelAdapter, ChannelSendError, OutboundRequest, SendReceipt};
use relay_core::retry::RetryPolicy;

/// Send once, retrying transient failures with jittered exponential backoff
/// until `policy` is exhausted. Permanent failures return immediately.
pub async fn send_with_retry(
    channel: &dyn ChannelAdapter,
    request: &OutboundRequest,
    policy: &RetryPolicy,
) -> Result<SendReceipt, ChannelSendError> {
    let mut attempt = 1;
    loop {
        match channel.send(request).await {
            Ok(receipt) => return Ok(receipt),
            Err(err) if err.is_transient() && policy.should_retry(attempt) => {
                let delay = policy.jittered_delay_for(attempt);
                tracing::warn!(
                    tenant_id = request.tenant_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient channel failure, retrying",
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
