//! Post-acceptance enrichment pipeline.
//!
//! After the orchestrator accepts a response, this pipeline classifies
//! the finished turn and attaches concrete material: catalog components
//! matching the detected types, tutorial search hits for extracted
//! topics, and a deterministic guidance walkthrough when the user looks
//! stuck on a concrete component. Collaborators are optional and
//! best-effort; a failed lookup degrades to an empty list and is
//! logged, never surfaced.

use async_trait::async_trait;
use easel_common::{
    ComponentSummary, GuidanceStep, IntentExtractor, ParsedIntent, QueryContext, SkillLevel,
    TutorialRequest, TutorialSummary,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Cap on hits requested per tutorial topic.
pub const MAX_TUTORIAL_RESULTS: usize = 3;

/// Design-system catalog boundary, queried by component type tag.
#[async_trait]
pub trait ComponentCatalog: Send + Sync {
    async fn find_by_type(&self, component_type: &str) -> anyhow::Result<Vec<ComponentSummary>>;

    /// Analytics ping for one suggested component. Fire-and-forget from
    /// the pipeline's perspective.
    async fn record_usage(&self, component_id: &str, caller_id: Option<&str>)
        -> anyhow::Result<()>;
}

/// Video tutorial search boundary.
#[async_trait]
pub trait TutorialSearch: Send + Sync {
    async fn search(&self, request: &TutorialRequest) -> anyhow::Result<Vec<TutorialSummary>>;
}

/// Everything the pipeline derived from one accepted turn.
#[derive(Debug, Clone)]
pub struct EnrichmentResult {
    pub intent: ParsedIntent,
    pub components: Vec<ComponentSummary>,
    /// Pending video searches, one per extracted topic. Built even when
    /// no search collaborator is wired, so an external executor can
    /// still pick them up.
    pub tutorial_requests: Vec<TutorialRequest>,
    pub tutorials: Vec<TutorialSummary>,
    pub guidance: Vec<GuidanceStep>,
}

pub struct EnrichmentPipeline {
    extractor: IntentExtractor,
    catalog: Option<Arc<dyn ComponentCatalog>>,
    tutorials: Option<Arc<dyn TutorialSearch>>,
}

impl EnrichmentPipeline {
    pub fn new() -> Self {
        Self {
            extractor: IntentExtractor::new(),
            catalog: None,
            tutorials: None,
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn ComponentCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_tutorial_search(mut self, search: Arc<dyn TutorialSearch>) -> Self {
        self.tutorials = Some(search);
        self
    }

    /// Enrich one finished turn. The two collaborator lookups run
    /// concurrently; either failing leaves its list empty.
    pub async fn enrich(&self, context: &QueryContext, response_text: &str) -> EnrichmentResult {
        let intent = self.extractor.classify(&context.message, response_text);
        debug!(
            action = ?intent.action,
            components = ?intent.component_types,
            confidence = intent.confidence,
            "Turn classified"
        );

        let tutorial_requests: Vec<TutorialRequest> = intent
            .tutorial_topics
            .iter()
            .map(|topic| TutorialRequest {
                topic: topic.clone(),
                max_results: MAX_TUTORIAL_RESULTS,
            })
            .collect();

        let (components, tutorials) = tokio::join!(
            self.lookup_components(&intent.component_types, context.caller_id.as_deref()),
            self.search_tutorials(&tutorial_requests),
        );

        // The walkthrough needs something concrete to walk through: a
        // stuck user and at least one detected component type.
        let guidance = if intent.needs_guidance && !intent.component_types.is_empty() {
            build_guidance(&intent, context.skill_level)
        } else {
            Vec::new()
        };

        EnrichmentResult {
            intent,
            components,
            tutorial_requests,
            tutorials,
            guidance,
        }
    }

    async fn lookup_components(
        &self,
        component_types: &[String],
        caller_id: Option<&str>,
    ) -> Vec<ComponentSummary> {
        let Some(catalog) = &self.catalog else {
            return Vec::new();
        };
        let mut found = Vec::new();
        for component_type in component_types {
            match catalog.find_by_type(component_type).await {
                Ok(matches) => found.extend(matches),
                Err(e) => warn!("Catalog lookup for '{}' failed: {}", component_type, e),
            }
        }

        // Usage analytics per suggested component, off the hot path.
        for component in &found {
            let catalog = Arc::clone(catalog);
            let component_id = component.id.clone();
            let caller = caller_id.map(str::to_string);
            tokio::spawn(async move {
                if let Err(e) = catalog
                    .record_usage(&component_id, caller.as_deref())
                    .await
                {
                    warn!(
                        "Usage recording for component '{}' failed (ignored): {}",
                        component_id, e
                    );
                }
            });
        }

        found
    }

    async fn search_tutorials(&self, requests: &[TutorialRequest]) -> Vec<TutorialSummary> {
        let Some(search) = &self.tutorials else {
            return Vec::new();
        };
        let mut hits = Vec::new();
        for request in requests {
            match search.search(request).await {
                Ok(matches) => hits.extend(matches),
                Err(e) => warn!("Tutorial search for '{}' failed: {}", request.topic, e),
            }
        }
        hits
    }
}

impl Default for EnrichmentPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic three-step walkthrough for a user who looks stuck.
/// Anchored on the first detected component type.
fn build_guidance(intent: &ParsedIntent, skill_level: SkillLevel) -> Vec<GuidanceStep> {
    let subject = intent
        .component_types
        .first()
        .map(String::as_str)
        .unwrap_or("component");

    let first_detail = match skill_level {
        SkillLevel::Beginner => {
            "Press F to create a frame and pick a preset size for your target screen.".to_string()
        }
        _ => "Create a frame sized for your target screen.".to_string(),
    };

    vec![
        GuidanceStep {
            step: 1,
            title: "Set up your canvas".to_string(),
            detail: first_detail,
        },
        GuidanceStep {
            step: 2,
            title: format!("Add the {}", subject),
            detail: format!(
                "Drag a {} from the assets panel, or build one from basic shapes and text.",
                subject
            ),
        },
        GuidanceStep {
            step: 3,
            title: "Refine and reuse".to_string(),
            detail: "Apply auto layout for spacing, then save the result as a reusable \
                     component."
                .to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingCatalog, FakeCatalog, FakeTutorialSearch};
    use std::time::Duration;

    fn context(message: &str, skill_level: SkillLevel) -> QueryContext {
        QueryContext::new(message, skill_level)
    }

    #[tokio::test]
    async fn test_enrich_without_collaborators() {
        let pipeline = EnrichmentPipeline::new();
        let result = pipeline
            .enrich(
                &context("create a button", SkillLevel::Beginner),
                "Here is a primary button.",
            )
            .await;

        assert_eq!(result.intent.component_types, vec!["button".to_string()]);
        assert!(result.components.is_empty());
        assert!(result.tutorials.is_empty());
    }

    #[tokio::test]
    async fn test_catalog_lookup_per_detected_type() {
        let catalog = Arc::new(FakeCatalog::with_entry("button", "Primary Button"));
        let pipeline = EnrichmentPipeline::new().with_catalog(catalog.clone());

        let result = pipeline
            .enrich(
                &context("create a button", SkillLevel::Beginner),
                "Here is your primary button.",
            )
            .await;

        assert_eq!(result.components.len(), 1);
        assert_eq!(result.components[0].name, "Primary Button");
        assert_eq!(catalog.requested_types().await, vec!["button".to_string()]);
    }

    #[tokio::test]
    async fn test_suggested_components_are_usage_recorded() {
        let catalog = Arc::new(FakeCatalog::with_entry("button", "Primary Button"));
        let pipeline = EnrichmentPipeline::new().with_catalog(catalog.clone());

        pipeline
            .enrich(
                &context("create a button", SkillLevel::Beginner).with_caller("plugin-7"),
                "Here is your primary button.",
            )
            .await;

        // Recording runs on a spawned task.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let events = catalog.usage_events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "button-1");
        assert_eq!(events[0].1.as_deref(), Some("plugin-7"));
    }

    #[tokio::test]
    async fn test_tutorial_search_capped_at_three() {
        let search = Arc::new(FakeTutorialSearch::with_hits("auto layout", 5));
        let pipeline = EnrichmentPipeline::new().with_tutorial_search(search.clone());

        let result = pipeline
            .enrich(
                &context(
                    "show me a tutorial on auto layout",
                    SkillLevel::Intermediate,
                ),
                "Auto layout keeps spacing consistent.",
            )
            .await;

        let requests = search.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].topic, "auto layout");
        assert_eq!(requests[0].max_results, MAX_TUTORIAL_RESULTS);
        assert_eq!(result.tutorials.len(), MAX_TUTORIAL_RESULTS);
    }

    #[tokio::test]
    async fn test_tutorial_requests_built_without_a_search_collaborator() {
        let pipeline = EnrichmentPipeline::new();
        let result = pipeline
            .enrich(
                &context(
                    "show me a tutorial on auto layout",
                    SkillLevel::Intermediate,
                ),
                "Auto layout keeps spacing consistent.",
            )
            .await;

        assert_eq!(result.tutorial_requests.len(), 1);
        assert_eq!(result.tutorial_requests[0].topic, "auto layout");
        assert_eq!(
            result.tutorial_requests[0].max_results,
            MAX_TUTORIAL_RESULTS
        );
        assert!(result.tutorials.is_empty());
    }

    #[tokio::test]
    async fn test_failing_catalog_degrades_to_empty() {
        let pipeline = EnrichmentPipeline::new().with_catalog(Arc::new(FailingCatalog));
        let result = pipeline
            .enrich(
                &context("create a button", SkillLevel::Beginner),
                "Done, one button.",
            )
            .await;
        assert!(result.components.is_empty());
    }

    #[tokio::test]
    async fn test_guidance_only_when_needed() {
        let pipeline = EnrichmentPipeline::new();

        let stuck = pipeline
            .enrich(
                &context("I'm confused, how do I make a navbar?", SkillLevel::Beginner),
                "Start with a frame.",
            )
            .await;
        assert_eq!(stuck.guidance.len(), 3);
        assert_eq!(stuck.guidance[0].step, 1);
        assert!(stuck.guidance[1].title.contains("navbar"));

        let confident = pipeline
            .enrich(
                &context("make the card wider", SkillLevel::Advanced),
                "Resized the card.",
            )
            .await;
        assert!(confident.guidance.is_empty());
    }

    #[tokio::test]
    async fn test_guidance_requires_a_detected_component() {
        // A stuck user with nothing concrete to build gets no
        // walkthrough; there is no component to anchor the steps on.
        let pipeline = EnrichmentPipeline::new();
        let result = pipeline
            .enrich(
                &context("what is auto layout?", SkillLevel::Beginner),
                "Auto layout resizes frames to fit their content.",
            )
            .await;

        assert!(result.intent.needs_guidance);
        assert!(result.intent.component_types.is_empty());
        assert!(result.guidance.is_empty());
    }

    #[tokio::test]
    async fn test_guidance_detail_varies_with_skill() {
        let pipeline = EnrichmentPipeline::new();
        let beginner = pipeline
            .enrich(&context("help me with a button", SkillLevel::Beginner), "Sure.")
            .await;
        let advanced = pipeline
            .enrich(&context("help me with a button", SkillLevel::Advanced), "Sure.")
            .await;
        assert_ne!(beginner.guidance[0].detail, advanced.guidance[0].detail);
    }
}
