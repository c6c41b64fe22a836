use crate::migrate::history::HistoryGateway;
use crate::{Error, Result};
use log::warn;
use std::future::Future;

/// An open transaction on a [`HistoryGateway`].
///
/// [`Transaction::run`] is the only way to consume it: the body is awaited,
/// then a rollback is always issued, whatever the body returned. A body that
/// committed leaves nothing for the rollback to undo.
#[must_use = "an open transaction must be released through `run`"]
pub(super) struct Transaction<'g> {
    gateway: &'g dyn HistoryGateway,
}

impl<'g> Transaction<'g> {
    pub(super) async fn begin(gateway: &'g dyn HistoryGateway) -> Result<Self> {
        gateway
            .begin_transaction()
            .await
            .map_err(Error::creating_transaction)?;

        Ok(Self { gateway })
    }

    pub(super) async fn run<F, T>(self, body: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let result = body.await;
        if let Err(e) = self.gateway.rollback_transaction().await {
            warn!(target: "creed::migrate", "Error while releasing the transaction: {}", e);
        }

        result
    }
}
