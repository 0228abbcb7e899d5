//! The harvester: drive a language model against a site and import
//! whatever it reports.
//!
//! One harvest is one completion call (with timeout and retries), an
//! idempotency pre-check on the payload hash, and one import run. A
//! multi-site sweep runs sites sequentially with a pause between them;
//! a failing site never stops the sweep.

mod prompts;

pub use prompts::{
    format_harvest_prompt, harvest_prompt_hash, strip_code_fences, DEFAULT_HARVEST_PROMPT,
    HARVEST_PROMPT_SETTING,
};

use chrono::Duration as ChronoDuration;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::TtlCache;
use crate::error::{LlmError, LlmResult, Result};
use crate::import::{batch_id_for_payload, Importer, ImportTarget};
use crate::traits::{HarvestStore, LanguageModel, SettingsStore};
use crate::types::{ImportResult, SiteRecord};

/// Timing and retry knobs for harvest runs.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Deadline for a single completion call
    pub llm_timeout: Duration,
    /// Completion attempts before a harvest gives up
    pub llm_attempts: u32,
    /// First retry delay; doubles per attempt
    pub backoff_base: Duration,
    /// Pause between sites in a sweep
    pub site_pause: Duration,
    /// Freshness window of the cached system prompt
    pub prompt_max_age: ChronoDuration,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            llm_timeout: Duration::from_secs(30),
            llm_attempts: 3,
            backoff_base: Duration::from_secs(1),
            site_pause: Duration::from_secs(1),
            prompt_max_age: ChronoDuration::minutes(10),
        }
    }
}

impl HarvestConfig {
    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    pub fn with_llm_attempts(mut self, attempts: u32) -> Self {
        self.llm_attempts = attempts;
        self
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn with_site_pause(mut self, pause: Duration) -> Self {
        self.site_pause = pause;
        self
    }

    pub fn with_prompt_max_age(mut self, max_age: ChronoDuration) -> Self {
        self.prompt_max_age = max_age;
        self
    }
}

/// How one site's harvest ended.
#[derive(Debug)]
pub enum HarvestOutcome {
    /// The payload was imported (successfully or not; see the result)
    Imported(ImportResult),
    /// An identical payload was imported recently; nothing was written
    AlreadyImported { batch_id: String },
    /// The language model never produced a payload
    Failed { error: String },
}

impl HarvestOutcome {
    pub fn result(&self) -> Option<&ImportResult> {
        match self {
            Self::Imported(result) => Some(result),
            _ => None,
        }
    }
}

/// One site's entry in a sweep report.
#[derive(Debug)]
pub struct SiteHarvest {
    pub site_id: Uuid,
    pub site_name: String,
    pub outcome: HarvestOutcome,
}

/// Drives harvests: prompt assembly, the completion call, idempotency,
/// and the import.
pub struct Harvester<S, L> {
    importer: Importer<S>,
    llm: L,
    config: HarvestConfig,
    prompt_cache: TtlCache<String>,
}

impl<S: HarvestStore, L: LanguageModel> Harvester<S, L> {
    pub fn new(store: S, llm: L) -> Self {
        Self::with_config(store, llm, HarvestConfig::default())
    }

    pub fn with_config(store: S, llm: L, config: HarvestConfig) -> Self {
        Self::with_importer(Importer::new(store), llm, config)
    }

    /// Full control over the inner importer (custom import options).
    pub fn with_importer(importer: Importer<S>, llm: L, config: HarvestConfig) -> Self {
        let prompt_cache = TtlCache::new(config.prompt_max_age);
        Self {
            importer,
            llm,
            config,
            prompt_cache,
        }
    }

    pub fn importer(&self) -> &Importer<S> {
        &self.importer
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// The system prompt to harvest with: the stored override when one
    /// exists, the built-in default otherwise.
    ///
    /// The resolved value is cached for
    /// [`prompt_max_age`](HarvestConfig::prompt_max_age); a failed
    /// lookup falls back to the default without caching, so the next
    /// call retries the store.
    pub async fn system_prompt(&self) -> String {
        if let Some(prompt) = self.prompt_cache.get() {
            return prompt;
        }
        match self.importer.store().load_setting(HARVEST_PROMPT_SETTING).await {
            Ok(Some(value)) if !value.trim().is_empty() => {
                debug!("using stored harvest prompt override");
                self.prompt_cache.put(value.clone());
                value
            }
            Ok(_) => {
                debug!(
                    prompt_hash = %harvest_prompt_hash(),
                    "no stored harvest prompt; using the built-in default"
                );
                self.prompt_cache.put(DEFAULT_HARVEST_PROMPT.to_string());
                DEFAULT_HARVEST_PROMPT.to_string()
            }
            Err(err) => {
                warn!(error = %err, "failed to load harvest prompt; using the built-in default");
                DEFAULT_HARVEST_PROMPT.to_string()
            }
        }
    }

    /// Drop the cached system prompt so the next harvest rereads it.
    pub fn invalidate_prompt_cache(&self) {
        self.prompt_cache.invalidate();
    }

    /// Harvest one site and import the payload.
    ///
    /// Errors only when the language model never produces a payload;
    /// import problems come back inside the
    /// [`HarvestOutcome::Imported`] result.
    pub async fn harvest_site(&self, site: &SiteRecord) -> Result<HarvestOutcome> {
        info!(site = %site.name, url = %site.url, "starting harvest");

        let system = self.system_prompt().await;
        let user = format_harvest_prompt(site);
        let raw = self.complete_with_retry(&system, &user).await?;
        let payload = strip_code_fences(&raw);

        let batch_id = batch_id_for_payload(payload);
        if self.importer.was_already_imported(&batch_id).await {
            info!(site = %site.name, batch_id = %batch_id, "identical payload already imported; skipping");
            return Ok(HarvestOutcome::AlreadyImported { batch_id });
        }

        let target = ImportTarget::new(site.id, batch_id);
        let result = self.importer.import_json(payload, &target).await;
        Ok(HarvestOutcome::Imported(result))
    }

    /// Harvest several sites sequentially, pausing between them.
    ///
    /// A failed site is reported in its [`SiteHarvest`] entry and the
    /// sweep continues.
    pub async fn harvest_sites(&self, sites: &[SiteRecord]) -> Vec<SiteHarvest> {
        let mut harvests = Vec::with_capacity(sites.len());
        for (index, site) in sites.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.site_pause).await;
            }
            let outcome = match self.harvest_site(site).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(site = %site.name, error = %err, "harvest failed");
                    HarvestOutcome::Failed {
                        error: err.to_string(),
                    }
                }
            };
            harvests.push(SiteHarvest {
                site_id: site.id,
                site_name: site.name.clone(),
                outcome,
            });
        }
        harvests
    }

    async fn complete_with_retry(&self, system: &str, user: &str) -> LlmResult<String> {
        let attempts = self.config.llm_attempts.max(1);
        let timeout_secs = self.config.llm_timeout.as_secs();
        let mut delay = self.config.backoff_base;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match tokio::time::timeout(self.config.llm_timeout, self.llm.complete(system, user))
                .await
            {
                Ok(Ok(text)) => return Ok(text),
                Ok(Err(err)) if attempt >= attempts => return Err(err),
                Err(_) if attempt >= attempts => {
                    return Err(LlmError::Timeout {
                        seconds: timeout_secs,
                    })
                }
                Ok(Err(err)) => {
                    warn!(attempt, error = %err, "completion failed; retrying")
                }
                Err(_) => {
                    warn!(attempt, timeout_s = timeout_secs, "completion timed out; retrying")
                }
            }
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;
    use crate::stores::MemoryStore;
    use crate::testing::{EnvelopeBuilder, FlakyStore, MockLanguageModel, MockLlmCall};
    use crate::traits::{DocumentStore, SettingsStore};

    fn fenced_envelope() -> String {
        let payload = EnvelopeBuilder::new()
            .document("https://ville.example.org/bulletins/bulletin-1.pdf")
            .document("https://ville.example.org/bulletins/bulletin-2.pdf")
            .log("info", "deux documents trouvés")
            .build();
        format!("```json\n{payload}\n```")
    }

    fn test_config() -> HarvestConfig {
        HarvestConfig::default()
            .with_backoff_base(Duration::from_millis(10))
            .with_site_pause(Duration::from_millis(10))
    }

    #[tokio::test(start_paused = true)]
    async fn harvest_imports_the_model_payload() {
        let llm = MockLanguageModel::new().with_default_response(fenced_envelope());
        let harvester = Harvester::with_config(MemoryStore::new(), llm, test_config());
        let site = SiteRecord::new("Ville", "https://ville.example.org");

        let outcome = harvester.harvest_site(&site).await.unwrap();
        let result = outcome.result().expect("payload should import");
        assert!(result.success);
        assert_eq!(result.documents_imported, 2);
        assert_eq!(result.logs_imported, 1);

        let stored = harvester
            .importer()
            .store()
            .documents_for_site(site.id)
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn replayed_payload_is_skipped_before_import() {
        let llm = MockLanguageModel::new().with_default_response(fenced_envelope());
        let harvester = Harvester::with_config(MemoryStore::new(), llm, test_config());
        let site = SiteRecord::new("Ville", "https://ville.example.org");

        let first = harvester.harvest_site(&site).await.unwrap();
        assert!(matches!(first, HarvestOutcome::Imported(_)));

        let second = harvester.harvest_site(&site).await.unwrap();
        assert!(matches!(second, HarvestOutcome::AlreadyImported { .. }));
        assert_eq!(harvester.importer().store().document_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stored_prompt_overrides_the_default_and_is_cached() {
        let store = MemoryStore::new();
        store
            .store_setting(HARVEST_PROMPT_SETTING, "consignes personnalisées")
            .await
            .unwrap();

        let llm = MockLanguageModel::new();
        let harvester = Harvester::with_config(store, llm, test_config());

        assert_eq!(harvester.system_prompt().await, "consignes personnalisées");

        // a store edit is invisible while the cache is fresh
        harvester
            .importer()
            .store()
            .store_setting(HARVEST_PROMPT_SETTING, "nouvelles consignes")
            .await
            .unwrap();
        assert_eq!(harvester.system_prompt().await, "consignes personnalisées");

        harvester.invalidate_prompt_cache();
        assert_eq!(harvester.system_prompt().await, "nouvelles consignes");
    }

    #[tokio::test(start_paused = true)]
    async fn prompt_lookup_failure_falls_back_to_default() {
        let store = FlakyStore::new(MemoryStore::new()).fail_settings_loads();
        let harvester = Harvester::with_config(store, MockLanguageModel::new(), test_config());
        assert_eq!(harvester.system_prompt().await, DEFAULT_HARVEST_PROMPT);
    }

    #[tokio::test(start_paused = true)]
    async fn harvest_sends_the_site_prompt() {
        let llm = MockLanguageModel::new().with_default_response(fenced_envelope());
        let harvester = Harvester::with_config(MemoryStore::new(), llm, test_config());
        let site = SiteRecord::new("Ville d'Exemple", "https://ville.example.org")
            .with_instructions("Ignorer les pages de contact.");

        harvester.harvest_site(&site).await.unwrap();

        let calls = harvester.llm.calls();
        let MockLlmCall::Complete { system, user } = &calls[0] else {
            panic!("expected a completion call");
        };
        assert!(system.contains("url_doc"));
        assert!(user.contains("Ville d'Exemple"));
        assert!(user.contains("Ignorer les pages de contact."));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_with_backoff() {
        let llm = MockLanguageModel::new()
            .fail_times(2)
            .with_default_response(fenced_envelope());
        let harvester = Harvester::with_config(MemoryStore::new(), llm, test_config());
        let site = SiteRecord::new("Ville", "https://ville.example.org");

        let outcome = harvester.harvest_site(&site).await.unwrap();
        assert!(matches!(outcome, HarvestOutcome::Imported(_)));
        assert_eq!(harvester.llm.complete_call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn attempts_are_bounded() {
        let llm = MockLanguageModel::new().fail_times(3);
        let harvester = Harvester::with_config(MemoryStore::new(), llm, test_config());
        let site = SiteRecord::new("Ville", "https://ville.example.org");

        let err = harvester.harvest_site(&site).await.unwrap_err();
        assert!(matches!(err, IngestError::Llm(LlmError::Api { status: 503, .. })));
        assert_eq!(harvester.llm.complete_call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_completions_time_out() {
        let llm = MockLanguageModel::new().with_response_delay(Duration::from_secs(120));
        let config = test_config()
            .with_llm_timeout(Duration::from_secs(5))
            .with_llm_attempts(1);
        let harvester = Harvester::with_config(MemoryStore::new(), llm, config);
        let site = SiteRecord::new("Ville", "https://ville.example.org");

        let err = harvester.harvest_site(&site).await.unwrap_err();
        assert!(matches!(err, IngestError::Llm(LlmError::Timeout { seconds: 5 })));
    }

    #[tokio::test(start_paused = true)]
    async fn a_failing_site_does_not_stop_the_sweep() {
        // first site exhausts its attempts, second succeeds
        let llm = MockLanguageModel::new()
            .fail_times(1)
            .with_default_response(fenced_envelope());
        let config = test_config().with_llm_attempts(1);
        let harvester = Harvester::with_config(MemoryStore::new(), llm, config);

        let sites = vec![
            SiteRecord::new("Premier", "https://premier.example.org"),
            SiteRecord::new("Second", "https://second.example.org"),
        ];
        let harvests = harvester.harvest_sites(&sites).await;

        assert_eq!(harvests.len(), 2);
        assert!(matches!(harvests[0].outcome, HarvestOutcome::Failed { .. }));
        assert!(matches!(harvests[1].outcome, HarvestOutcome::Imported(_)));
        assert_eq!(harvests[0].site_name, "Premier");
    }
}
