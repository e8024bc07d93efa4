//! Backfill consumer (spec §4.3.4): the thinnest of the four consumers —
//! parse the `backfill-queue` message, hand it to
//! `alexandria_backfill::BackfillOrchestrator`, and translate its terminal
//! `BackfillJobStatus` into a queue disposition. `BackfillOrchestrator::run`
//! itself never fails the whole message on a business-level outcome (quota
//! exhaustion, lock contention); only a message that cannot even be turned
//! into a `BackfillRequest` is poison.

use std::sync::Arc;

use alexandria_backfill::{BackfillOrchestrator, BackfillRequest};
use alexandria_quota::QuotaGate;

use crate::error::{ConsumerError, Disposition, Result};
use crate::messages::BackfillMessage;

pub struct BackfillConsumer<Q: QuotaGate> {
    orchestrator: Arc<BackfillOrchestrator<Q>>,
}

impl<Q: QuotaGate> BackfillConsumer<Q> {
    pub fn new(orchestrator: Arc<BackfillOrchestrator<Q>>) -> Self {
        Self { orchestrator }
    }

    fn to_request(message: &BackfillMessage) -> Result<BackfillRequest> {
        let prompt_variant = message
            .prompt_variant
            .clone()
            .ok_or_else(|| ConsumerError::Poison("backfill message is missing prompt_variant".to_string()))?;

        Ok(BackfillRequest {
            job_id: message.job_id.clone(),
            year: message.year,
            month: message.month,
            batch_size: message.batch_size,
            dry_run: message.dry_run,
            experiment_id: message.experiment_id.clone(),
            prompt_variant,
            max_quota: message.max_quota,
        })
    }

    pub async fn process_message(&self, message: &BackfillMessage) -> Disposition {
        let request = match Self::to_request(message) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(job_id = message.job_id, error = %err, "poison backfill message, acking without retry");
                return Disposition::Ack;
            }
        };

        match self.orchestrator.run(request).await {
            Ok(status) => {
                tracing::info!(job_id = message.job_id, state = ?status.status, "backfill job finished");
                Disposition::Ack
            }
            Err(err) => {
                tracing::error!(job_id = message.job_id, error = %err, "backfill orchestrator failed, will retry");
                Disposition::Retry
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> BackfillMessage {
        BackfillMessage {
            job_id: "j1".to_string(),
            year: 2026,
            month: 7,
            batch_size: 20,
            dry_run: true,
            experiment_id: None,
            prompt_variant: None,
            model_override: None,
            max_quota: None,
        }
    }

    #[test]
    fn missing_prompt_variant_is_poison() {
        let message = message();
        assert!(BackfillConsumer::<alexandria_quota::QuotaManager<DummyKv>>::to_request(&message).is_err());
    }

    struct DummyKv;

    #[async_trait::async_trait]
    impl alexandria_kv::KvStore for DummyKv {
        async fn get(&self, _ns: alexandria_kv::Namespace, _key: &str) -> alexandria_kv::Result<Option<String>> {
            Ok(None)
        }
        async fn set(
            &self,
            _ns: alexandria_kv::Namespace,
            _key: &str,
            _value: &str,
            _ttl: Option<std::time::Duration>,
        ) -> alexandria_kv::Result<()> {
            Ok(())
        }
        async fn incr_by(&self, _ns: alexandria_kv::Namespace, _key: &str, _delta: i64) -> alexandria_kv::Result<i64> {
            Ok(1)
        }
        async fn expire(&self, _ns: alexandria_kv::Namespace, _key: &str, _ttl: std::time::Duration) -> alexandria_kv::Result<()> {
            Ok(())
        }
        async fn delete(&self, _ns: alexandria_kv::Namespace, _key: &str) -> alexandria_kv::Result<()> {
            Ok(())
        }
        async fn exists(&self, _ns: alexandria_kv::Namespace, _key: &str) -> alexandria_kv::Result<bool> {
            Ok(false)
        }
    }
}
