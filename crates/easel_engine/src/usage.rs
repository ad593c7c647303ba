//! Best-effort usage logging.
//!
//! The analytics sink is fire-and-forget: the orchestrator spawns the
//! record call and a failure can never alter the response already handed
//! to the caller.

use async_trait::async_trait;
use easel_common::{FinalResponse, QueryContext};
use tracing::info;

/// External analytics sink boundary.
#[async_trait]
pub trait UsageLogger: Send + Sync {
    async fn record(
        &self,
        response: &FinalResponse,
        message: &str,
        context: &QueryContext,
    ) -> anyhow::Result<()>;
}

/// Default sink: structured tracing events.
pub struct TracingUsageLogger;

#[async_trait]
impl UsageLogger for TracingUsageLogger {
    async fn record(
        &self,
        response: &FinalResponse,
        message: &str,
        context: &QueryContext,
    ) -> anyhow::Result<()> {
        info!(
            query_id = %context.query_id,
            provider = %response.provider,
            attempts = response.attempts.len(),
            tokens = ?response.metadata.tokens_used,
            cost_usd = ?response.metadata.cost_usd,
            skill = %context.skill_level,
            session = ?context.session_id,
            message_chars = message.len(),
            "query completed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easel_common::{AttemptRecord, CandidateResponse, ResponseMetadata, SkillLevel};

    #[tokio::test]
    async fn test_tracing_logger_never_fails() {
        let logger = TracingUsageLogger;
        let response = FinalResponse::accepted(
            CandidateResponse::new("hello there", ResponseMetadata::default(), "ollama"),
            vec![AttemptRecord::succeeded("ollama")],
        );
        let context = QueryContext::new("hi", SkillLevel::Beginner);
        assert!(logger.record(&response, "hi", &context).await.is_ok());
    }
}
