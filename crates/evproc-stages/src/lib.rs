//! evproc Stages: reference stages used by the bundled pipelines.
//!
//! They stay small and cover each outcome of the stage contract: pass
//! through, replace data, halt quietly and fail. Processors are expected to
//! bring their own stages; these keep the binary runnable out of the box.
//!
//! # Pipeline Flow
//!
//! ```text
//! Message → domain-filter → require-fields → merge-payload → publish
//!               ↓                ↓                 ↓             ↓
//!             Halt             Fail           new data     main queue
//! ```

mod domain_filter;
mod merge_payload;
mod publish;
mod require_fields;

pub use domain_filter::DomainFilterStage;
pub use merge_payload::MergePayloadStage;
pub use publish::{PublishStage, PROCESSED_EVENT};
pub use require_fields::RequireFieldsStage;

use evproc_core::{StageChain, StageDef};

/// `merge-payload → publish`
pub fn echo_chain() -> StageChain {
    StageChain::default()
        .then(StageDef::of::<MergePayloadStage>())
        .then(StageDef::of::<PublishStage>())
}

/// `domain-filter → require-fields → merge-payload → publish`
pub fn guarded_chain(domains: &[&str], fields: &[&str]) -> StageChain {
    StageChain::default()
        .then(StageDef::from_prototype(DomainFilterStage::allow(
            domains.iter().copied(),
        )))
        .then(StageDef::from_prototype(RequireFieldsStage::new(
            fields.iter().copied(),
        )))
        .then(StageDef::of::<MergePayloadStage>())
        .then(StageDef::of::<PublishStage>())
}

/// Pipelines the `evproc` binary registers by default, keyed by event tag.
pub fn default_pipelines() -> Vec<(&'static str, StageChain)> {
    vec![
        ("echo", echo_chain()),
        ("user-signup", guarded_chain(&["users"], &["email"])),
    ]
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use evproc_core::{
        AppContext, ChainPipeline, Environment, Message, Pipeline, PipelineContext,
        PipelineError, Services, Stage, StageData, StageError, StageOutcome,
    };
    use evproc_queue::{MemoryBroker, QueueOptions};
    use serde_json::json;
    use std::sync::Arc;

    fn app(broker: &Arc<MemoryBroker>) -> Arc<AppContext> {
        let main = broker.queue(QueueOptions::new("memory://test", "main"));
        let sub = broker.queue(QueueOptions::new("memory://test", "queue-worker"));
        Arc::new(AppContext::new(
            "worker",
            Environment::Production,
            Arc::new(main),
            Arc::new(sub),
            Services::new(),
        ))
    }

    async fn connected_app(broker: &Arc<MemoryBroker>) -> Arc<AppContext> {
        let app = app(broker);
        app.main_queue().connect().await.unwrap();
        app.subqueue().connect().await.unwrap();
        app
    }

    #[tokio::test]
    async fn test_domain_filter() {
        let broker = MemoryBroker::with_history();
        let ctx = PipelineContext::new(app(&broker), "x");
        let stage = DomainFilterStage::allow(["users"]);

        let kept = Message::new("users", "x");
        let dropped = Message::new("billing", "x");

        assert_eq!(
            stage.execute(&StageData::new(), &kept, &ctx).await,
            StageOutcome::Continue(None)
        );
        assert_eq!(
            stage.execute(&StageData::new(), &dropped, &ctx).await,
            StageOutcome::Halt
        );
    }

    #[tokio::test]
    async fn test_require_fields() {
        let broker = MemoryBroker::with_history();
        let ctx = PipelineContext::new(app(&broker), "x");
        let stage = RequireFieldsStage::new(["email", "name"]);

        let complete = Message::new("users", "x")
            .with_payload(json!({ "email": "a@b.c", "name": "Ana" }));
        let partial = Message::new("users", "x").with_payload(json!({ "email": null }));

        assert_eq!(
            stage.execute(&StageData::new(), &complete, &ctx).await,
            StageOutcome::Continue(None)
        );
        match stage.execute(&StageData::new(), &partial, &ctx).await {
            StageOutcome::Fail(StageError::ValidationFailed(msg)) => {
                assert!(msg.contains("email, name"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_merge_payload_overrides_data() {
        let broker = MemoryBroker::with_history();
        let ctx = PipelineContext::new(app(&broker), "x");
        let data = StageData::new()
            .with("plan", json!("free"))
            .with("seen", json!(1));
        let event = Message::new("users", "upgrade")
            .with_user("u-3")
            .with_payload(json!({ "plan": "pro" }));

        let StageOutcome::Continue(Some(merged)) =
            MergePayloadStage.execute(&data, &event, &ctx).await
        else {
            panic!("expected replacement data");
        };

        assert_eq!(merged.get_str("plan"), Some("pro"));
        assert_eq!(merged.get("seen"), Some(&json!(1)));
        assert_eq!(merged.get_str("user_id"), Some("u-3"));
        assert_eq!(merged.get_str("event"), Some("upgrade"));
    }

    #[tokio::test]
    async fn test_publish_requires_connected_queue() {
        let broker = MemoryBroker::with_history();
        let ctx = PipelineContext::new(app(&broker), "x");

        let outcome = PublishStage::default()
            .execute(&StageData::new(), &Message::new("d", "e"), &ctx)
            .await;

        assert!(matches!(
            outcome,
            StageOutcome::Fail(StageError::Dependency(_))
        ));
        assert_eq!(PublishStage::default().requirements(), vec!["main_queue"]);
    }

    #[tokio::test]
    async fn test_echo_pipeline_publishes_merged_data() {
        let broker = MemoryBroker::with_history();
        let app = connected_app(&broker).await;
        let pipeline = ChainPipeline::new(app, "echo", echo_chain());
        let event = Message::new("demo", "echo")
            .with_user("u-1")
            .with_payload(json!({ "text": "hi" }));

        let report = pipeline.run(&event).await.unwrap();

        assert_eq!(pipeline.name_stages(), vec!["merge-payload", "publish"]);
        assert!(!report.halted);
        let sent = broker.sent("main");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].event, "processed");
        assert_eq!(sent[0].user_id.as_deref(), Some("u-1"));
        assert_eq!(sent[0].payload["text"], "hi");
    }

    #[tokio::test]
    async fn test_guarded_pipeline_halts_and_fails() {
        let broker = MemoryBroker::with_history();
        let app = connected_app(&broker).await;
        let chain = guarded_chain(&["users"], &["email"]);

        let other_domain = Message::new("billing", "user-signup");
        let report = ChainPipeline::new(Arc::clone(&app), "user-signup", chain.clone())
            .run(&other_domain)
            .await
            .unwrap();
        assert_eq!(report.halted_at(), Some("domain-filter"));

        let no_email = Message::new("users", "user-signup").with_payload(json!({}));
        let err = ChainPipeline::new(app, "user-signup", chain)
            .run(&no_email)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Stage { ref stage, .. } if stage == "require-fields"));

        assert!(broker.sent("main").is_empty());
    }

    #[test]
    fn test_default_pipelines() {
        let tags: Vec<_> = default_pipelines().into_iter().map(|(t, _)| t).collect();
        assert_eq!(tags, vec!["echo", "user-signup"]);
    }
}
