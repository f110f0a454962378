use crate::aggregator::VocabularyAggregator;
use crate::config::VocabularyPolicy;
use crate::labeler::Labeler;
use crate::models::{AnalysisResult, Commons, LabelResult, Vocabulary};
use crate::oracle::TextOracle;
use crate::source::ConversationSource;
use crate::store::ResultStore;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Orchestrates the three passes: topic discovery, theme discovery, labeling
pub struct Pipeline {
    oracle: Arc<dyn TextOracle>,
    policy: VocabularyPolicy,
    store: Option<ResultStore>,
}

impl Pipeline {
    /// Create a pipeline that does not persist its results
    pub fn new(oracle: Arc<dyn TextOracle>, policy: VocabularyPolicy) -> Self {
        Self {
            oracle,
            policy,
            store: None,
        }
    }

    /// Persist the final result through `store`
    pub fn with_store(mut self, store: Option<ResultStore>) -> Self {
        self.store = store;
        self
    }

    /// Run every pass over `source` and assemble the result.
    ///
    /// Each pass starts a fresh traversal and only begins once the previous
    /// pass has finished. Only source or storage failures abort the run.
    pub async fn run(&self, source: &dyn ConversationSource) -> Result<AnalysisResult> {
        let topics = self
            .discover(source, VocabularyAggregator::topics(self.oracle.as_ref()), "topics")
            .await?;
        let themes = self
            .discover(source, VocabularyAggregator::themes(self.oracle.as_ref()), "themes")
            .await?;
        let data = self.label_all(source, &topics, &themes).await?;

        let result = AnalysisResult {
            data,
            commons: Commons { topics, themes },
        };

        self.store_if_configured(&result)?;
        Ok(result)
    }

    /// One aggregation pass over a fresh traversal
    async fn discover(
        &self,
        source: &dyn ConversationSource,
        aggregator: VocabularyAggregator<'_>,
        name: &str,
    ) -> Result<Vocabulary> {
        tracing::info!("Discovering common {}", name);
        let records = source
            .traverse()
            .with_context(|| format!("Failed to read conversations for {} discovery", name))?;

        let vocabulary = aggregator.aggregate(records).await;
        tracing::info!(count = vocabulary.len(), "Discovered {}", name);
        Ok(vocabulary)
    }

    /// Labeling pass over a fresh traversal, against the frozen vocabularies
    async fn label_all(
        &self,
        source: &dyn ConversationSource,
        topics: &Vocabulary,
        themes: &Vocabulary,
    ) -> Result<Vec<LabelResult>> {
        let topic_candidates = topics.labels();
        let theme_candidates = themes.labels();
        let labeler = Labeler::new(self.oracle.as_ref(), self.policy);

        let records = source
            .traverse()
            .context("Failed to read conversations for labeling")?;

        let mut data = Vec::new();
        for (index, record) in records.enumerate() {
            tracing::info!(record = index + 1, "Labeling conversation");
            let result = labeler
                .label(index, &record, &topic_candidates, &theme_candidates)
                .await;
            data.push(result);
        }

        let degraded = data.iter().filter(|result| result.is_degraded()).count();
        if degraded > 0 {
            tracing::warn!(degraded, total = data.len(), "Some conversations could not be labeled");
        }
        Ok(data)
    }

    /// Store results if an output directory is configured
    fn store_if_configured(&self, result: &AnalysisResult) -> Result<()> {
        if let Some(store) = &self.store {
            store.save(result)?;
        }
        Ok(())
    }
}
