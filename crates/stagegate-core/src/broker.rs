//! Approval broker contract.
//!
//! The channel through which a human decision is obtained is external to
//! this core; only its boundary is specified here. A broker timeout is
//! reported distinctly from rejection so the controller records "no
//! decision" rather than "denied".

use async_trait::async_trait;

use stagegate_domain::{ApprovalRequest, ApprovalResponse};

/// Failures of the approval channel itself.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The request expired with no decision made.
    #[error("approval request timed out after {waited_secs}s with no decision")]
    TimedOut { waited_secs: u64 },

    /// The channel broke before a decision could be obtained.
    #[error("approval channel error: {0}")]
    Channel(String),
}

/// Obtains a human decision for one escalation.
///
/// Implementations must be idempotent-safe per escalation: repeated
/// polling for the same request must not create duplicate decisions.
/// May block until the configured expiry.
#[async_trait]
pub trait ApprovalBroker: Send + Sync {
    async fn request_approval(
        &self,
        request: &ApprovalRequest,
    ) -> Result<ApprovalResponse, BrokerError>;
}

/// An escalation waiting for an operator decision.
pub struct PendingApproval {
    pub request: ApprovalRequest,
    /// Send the decision back through this channel.
    pub reply: tokio::sync::oneshot::Sender<ApprovalResponse>,
}

/// In-process broker that forwards each escalation to an operator task
/// and awaits its reply, honoring the request expiry.
///
/// Each escalation gets its own oneshot reply channel, so repeated
/// polling cannot create duplicate decisions.
pub struct ChannelBroker {
    tx: tokio::sync::mpsc::Sender<PendingApproval>,
}

impl ChannelBroker {
    /// Create a broker and the receiver the operator task consumes.
    pub fn new(capacity: usize) -> (Self, tokio::sync::mpsc::Receiver<PendingApproval>) {
        let (tx, rx) = tokio::sync::mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ApprovalBroker for ChannelBroker {
    async fn request_approval(
        &self,
        request: &ApprovalRequest,
    ) -> Result<ApprovalResponse, BrokerError> {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(PendingApproval {
                request: request.clone(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| BrokerError::Channel("operator channel closed".into()))?;

        match request.expires_after_secs {
            Some(secs) => {
                match tokio::time::timeout(std::time::Duration::from_secs(secs), reply_rx).await {
                    Ok(Ok(response)) => Ok(response),
                    Ok(Err(_)) => Err(BrokerError::Channel("operator dropped reply".into())),
                    Err(_) => Err(BrokerError::TimedOut { waited_secs: secs }),
                }
            }
            None => reply_rx
                .await
                .map_err(|_| BrokerError::Channel("operator dropped reply".into())),
        }
    }
}
