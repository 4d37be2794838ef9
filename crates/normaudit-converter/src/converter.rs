//! Core RequirementConverter implementation
//!
//! A conversion runs in three phases so the store is only needed for the
//! short synchronous ones:
//!
//! 1. [`RequirementConverter::plan`] reads the source, its approved fragments
//!    and the auto set (store, sync)
//! 2. [`RequirementConverter::draft`] calls the oracle batch by batch and
//!    validates every answer (no store)
//! 3. [`RequirementConverter::commit`] allocates identifiers and writes
//!    everything in one transaction (store, sync)

use crate::classify::SystemClassifier;
use crate::config::ConverterConfig;
use crate::error::ConversionError;
use crate::ids::IdAllocator;
use crate::parser::{parse_conversion_response, RequirementDraft};
use crate::prompt::{BatchPromptBuilder, CONVERSION_SYSTEM_PROMPT};
use normaudit_domain::traits::{
    ConversionCommit, FragmentStore, LlmProvider, RequirementStore, SourceStore,
};
use normaudit_domain::{
    requirement_prefix, FragmentStatus, RawFragment, Requirement, RequirementSet, SourceDocument,
    SourceId,
};
use normaudit_extractor::{CancelFlag, ProgressFn};
use std::fmt::Display;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info};

/// Everything read from the store before the oracle is called
#[derive(Debug, Clone)]
pub struct ConversionPlan {
    /// Source document being converted
    pub source: SourceDocument,
    /// Auto set of the source, existing or prepared
    pub requirement_set: RequirementSet,
    /// Whether the set still has to be created
    pub set_is_new: bool,
    /// Inspection discipline of the document
    pub system_id: String,
    /// Requirement id prefix
    pub prefix: String,
    /// APPROVED fragments in document order
    pub fragments: Vec<RawFragment>,
}

impl ConversionPlan {
    /// Number of oracle calls for the given batch size
    pub fn batch_count(&self, batch_size: usize) -> usize {
        self.fragments.len().div_ceil(batch_size.max(1))
    }
}

/// Result of a conversion run
#[derive(Debug, Clone)]
pub struct ConversionReport {
    /// Auto set the requirements belong to
    pub requirement_set: RequirementSet,
    /// Whether the set was created by this run
    pub set_created: bool,
    /// New requirements, in fragment order
    pub created: Vec<Requirement>,
    /// Fragments flipped to PROCESSED (0 on a dry run)
    pub fragments_processed: usize,
    /// Inspection discipline
    pub system_id: String,
    /// Oracle calls made
    pub batches: usize,
    /// Nothing was written
    pub dry_run: bool,
}

/// Converts APPROVED fragments of a source into requirements
pub struct RequirementConverter<L>
where
    L: LlmProvider,
{
    llm_provider: Arc<L>,
    classifier: SystemClassifier,
    config: ConverterConfig,
}

impl<L> RequirementConverter<L>
where
    L: LlmProvider + Send + Sync + 'static,
    L::Error: Display,
{
    /// Create a new RequirementConverter
    pub fn new(llm_provider: L, config: ConverterConfig) -> Result<Self, ConversionError> {
        Self::with_shared(Arc::new(llm_provider), config)
    }

    /// Create a RequirementConverter around a shared provider
    pub fn with_shared(llm_provider: Arc<L>, config: ConverterConfig) -> Result<Self, ConversionError> {
        config.validate().map_err(ConversionError::Config)?;
        Ok(Self {
            llm_provider,
            classifier: SystemClassifier::default(),
            config,
        })
    }

    /// Replace the discipline classifier
    pub fn with_classifier(mut self, classifier: SystemClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Run all three phases against one store
    pub async fn convert<S>(&self, store: &mut S, source_id: SourceId) -> Result<ConversionReport, ConversionError>
    where
        S: SourceStore + FragmentStore + RequirementStore,
        S::Error: Display,
    {
        let plan = self.plan(store, source_id)?;
        let drafts = self.draft(&plan, &CancelFlag::new(), None).await?;
        self.commit(store, plan, drafts)
    }

    /// Read the source, its approved fragments and its auto set
    pub fn plan<S>(&self, store: &S, source_id: SourceId) -> Result<ConversionPlan, ConversionError>
    where
        S: SourceStore + FragmentStore + RequirementStore,
        S::Error: Display,
    {
        let source = store
            .get_source(source_id)
            .map_err(store_error)?
            .ok_or(ConversionError::SourceNotFound(source_id))?;

        let fragments = store
            .list_by_source(source_id, Some(FragmentStatus::Approved))
            .map_err(store_error)?;
        if fragments.is_empty() {
            return Err(ConversionError::NoApprovedFragments(source_id));
        }

        let code = source.auto_set_code();
        let (requirement_set, set_is_new) = match store.find_set_by_code(&code).map_err(store_error)? {
            Some(set) if set.source_id == Some(source_id) => (set, false),
            Some(set) => {
                return Err(ConversionError::SetConflict {
                    code,
                    owner: set
                        .source_id
                        .map(|owner| owner.to_string())
                        .unwrap_or_else(|| "manual".to_string()),
                })
            }
            None => (
                RequirementSet::draft(code, format!("{} (auto)", source.code), Some(source_id)),
                true,
            ),
        };

        let system_id = self.classifier.classify(&source.title, &source.code).to_string();
        let prefix = requirement_prefix(&source.code);

        info!(
            "Conversion plan for {}: {} approved fragments, system {}, set {}{}",
            source_id,
            fragments.len(),
            system_id,
            requirement_set.code,
            if set_is_new { " (new)" } else { "" }
        );

        Ok(ConversionPlan {
            source,
            requirement_set,
            set_is_new,
            system_id,
            prefix,
            fragments,
        })
    }

    /// Call the oracle for every batch of the plan
    ///
    /// Any failing or malformed batch aborts the whole run.
    pub async fn draft(
        &self,
        plan: &ConversionPlan,
        cancel: &CancelFlag,
        progress: Option<&ProgressFn>,
    ) -> Result<Vec<RequirementDraft>, ConversionError> {
        let total = plan.batch_count(self.config.batch_size);
        let mut drafts = Vec::with_capacity(plan.fragments.len());

        for (index, batch) in plan.fragments.chunks(self.config.batch_size).enumerate() {
            if cancel.is_cancelled() {
                info!("Conversion of {} cancelled at batch {}", plan.source.id, index);
                return Err(ConversionError::Cancelled(index));
            }
            if index > 0 && self.config.inter_call_delay_ms > 0 {
                tokio::time::sleep(self.config.inter_call_delay()).await;
            }

            debug!("Converting batch {}/{} ({} fragments)", index + 1, total, batch.len());
            let prompt = BatchPromptBuilder::new(batch, &plan.system_id, index, total).build();
            let response = self.call_llm(prompt).await?;
            drafts.extend(parse_conversion_response(&response, batch, index)?);

            if let Some(progress) = progress {
                progress(index + 1, total);
            }
        }

        Ok(drafts)
    }

    /// Allocate identifiers and write the requirements
    ///
    /// On a dry run the report carries the identifiers that would have been
    /// used and nothing is written.
    pub fn commit<S>(
        &self,
        store: &mut S,
        plan: ConversionPlan,
        drafts: Vec<RequirementDraft>,
    ) -> Result<ConversionReport, ConversionError>
    where
        S: RequirementStore,
        S::Error: Display,
    {
        let existing = store
            .list_requirement_ids_with_prefix(&format!("{}-", plan.prefix))
            .map_err(store_error)?;
        let mut allocator = IdAllocator::new(plan.prefix.as_str(), &existing);

        let created: Vec<Requirement> = drafts
            .into_iter()
            .map(|draft| {
                draft.into_requirement(
                    allocator.allocate(),
                    &plan.requirement_set.id,
                    plan.source.id,
                    &plan.system_id,
                )
            })
            .collect();
        let batches = plan.batch_count(self.config.batch_size);

        if self.config.dry_run {
            info!("Dry run: {} requirements would be created", created.len());
            return Ok(ConversionReport {
                requirement_set: plan.requirement_set,
                set_created: false,
                created,
                fragments_processed: 0,
                system_id: plan.system_id,
                batches,
                dry_run: true,
            });
        }

        let commit = ConversionCommit {
            new_set: plan.set_is_new.then(|| plan.requirement_set.clone()),
            requirements: created,
        };
        store.commit_conversion(&commit).map_err(store_error)?;

        info!(
            "Conversion of {} committed: {} requirements in set {}",
            plan.source.id,
            commit.requirements.len(),
            plan.requirement_set.code
        );

        Ok(ConversionReport {
            requirement_set: plan.requirement_set,
            set_created: plan.set_is_new,
            fragments_processed: commit.requirements.len(),
            created: commit.requirements,
            system_id: plan.system_id,
            batches,
            dry_run: false,
        })
    }

    /// Call the LLM provider on a blocking thread, bounded by the timeout
    async fn call_llm(&self, prompt: String) -> Result<String, ConversionError> {
        let llm = Arc::clone(&self.llm_provider);

        let call = tokio::task::spawn_blocking(move || {
            llm.generate(CONVERSION_SYSTEM_PROMPT, &prompt)
                .map_err(|e| ConversionError::Llm(e.to_string()))
        });

        timeout(self.config.conversion_timeout(), call)
            .await
            .map_err(|_| ConversionError::Timeout(self.config.conversion_timeout_secs))?
            .map_err(|e| ConversionError::Llm(format!("Task join error: {}", e)))?
    }
}

fn store_error<E: Display>(e: E) -> ConversionError {
    ConversionError::Store(e.to_string())
}
