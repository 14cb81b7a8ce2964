use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use authorlink_core::{
    AppConfig, AuthorMention, ConsolidatedAuthor, MentionSource, PendingContributor,
    PreprintBatch, RunOutcome, RunReport, SourceInput,
};
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::enrichment::email::EmailAssigner;
use crate::enrichment::join::{FuzzyJoiner, Slot, build_slots};
use crate::enrichment::merge::PriorityMerger;
use crate::error::{Result, ScienceError};
use crate::normalize::{normalize_off_thread, platform_mention};
use crate::sources::{
    ContributorDirectory, Offline, OrcidRegistry, OsfDirectory, RegistryPerson,
    ResearcherRegistry,
};

/// Cooperative cancellation shared between the caller and a running pipeline.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything one preprint contributes to the run report.
#[derive(Debug, Clone, Default)]
pub struct PreprintResult {
    pub preprint_id: String,
    pub authors: Vec<ConsolidatedAuthor>,
    pub notes: Vec<String>,
    pub transient_failures: usize,
    pub ambiguous_lookups: usize,
    pub emails_assigned_from_pool: usize,
    external_calls: usize,
}

impl PreprintResult {
    fn new(preprint_id: &str) -> Self {
        Self {
            preprint_id: preprint_id.to_string(),
            ..Default::default()
        }
    }

    /// Every external call of this preprint failed transiently.
    pub fn all_calls_failed(&self) -> bool {
        self.external_calls > 0 && self.transient_failures == self.external_calls
    }

    /// Count one external call; transient failures also land in the notes.
    fn track<T>(&mut self, what: &str, result: &Result<T>) {
        self.external_calls += 1;
        if let Err(err) = result
            && err.is_transient()
        {
            self.transient_failures += 1;
            warn!(preprint_id = %self.preprint_id, what, error = %err, "lookup failed");
            self.notes.push(format!("{what}: {err}"));
        }
    }
}

#[derive(Clone)]
pub struct EnrichmentPipeline {
    directory: Arc<dyn ContributorDirectory>,
    registry: Arc<dyn ResearcherRegistry>,
    joiner: FuzzyJoiner,
    merger: PriorityMerger,
    emails: EmailAssigner,
    name_lookup: bool,
    max_in_flight: usize,
    max_consecutive_failures: usize,
}

impl EnrichmentPipeline {
    pub fn new(
        directory: Arc<dyn ContributorDirectory>,
        registry: Arc<dyn ResearcherRegistry>,
        config: &AppConfig,
    ) -> Self {
        Self {
            directory,
            registry,
            joiner: FuzzyJoiner::new(config.matching.max_name_distance),
            merger: PriorityMerger::from_config(&config.precedence),
            emails: EmailAssigner::from_config(&config.email),
            name_lookup: config.pipeline.name_lookup && !config.pipeline.offline,
            max_in_flight: config.pipeline.max_in_flight.max(1),
            max_consecutive_failures: config.pipeline.max_consecutive_failures,
        }
    }

    /// Pipeline backed by the live OSF and ORCID clients, or by [`Offline`]
    /// stand-ins when `pipeline.offline` is set.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        if config.pipeline.offline {
            return Ok(Self::new(Arc::new(Offline), Arc::new(Offline), config));
        }
        let user_agent = config.user_agent();
        let directory = OsfDirectory::new(&config.platform, &user_agent)?;
        let registry = OrcidRegistry::new(&config.registry, &user_agent)?;
        Ok(Self::new(Arc::new(directory), Arc::new(registry), config))
    }

    /// Resolve every preprint of `input`.
    ///
    /// Preprints run through an ordered window of `max_in_flight`, so rows come
    /// out in batch order. Cancellation is checked before each preprint's rows
    /// are taken; a preprint's rows are appended all at once or not at all.
    pub async fn run(&self, input: &SourceInput, cancel: &CancelFlag) -> RunReport {
        let mut report = RunReport::start();
        let normalized = match normalize_off_thread(input).await {
            Ok(normalized) => normalized,
            Err(err) => {
                warn!(error = %err, "normalization failed");
                report.finish(RunOutcome::Aborted {
                    reason: err.to_string(),
                });
                return report;
            }
        };
        report.stats.preprints_total = normalized.batches.len();
        report.stats.malformed_dropped = normalized.malformed_dropped;
        for (preprint_id, message) in &normalized.notes {
            report.note(preprint_id, message.clone());
        }

        info!(
            run_id = %report.run_id,
            preprints = report.stats.preprints_total,
            malformed = report.stats.malformed_dropped,
            directory = self.directory.name(),
            registry = self.registry.name(),
            "starting enrichment run"
        );

        let mut results = futures::stream::iter(normalized.batches)
            .map(|batch| async move {
                if cancel.is_cancelled() {
                    None
                } else {
                    Some(self.process_preprint(batch).await)
                }
            })
            .buffered(self.max_in_flight);

        let mut outcome = RunOutcome::Completed;
        let mut consecutive_failures = 0usize;

        while let Some(result) = results.next().await {
            let Some(result) = result.filter(|_| !cancel.is_cancelled()) else {
                outcome = RunOutcome::Cancelled;
                break;
            };

            if result.all_calls_failed() {
                consecutive_failures += 1;
            } else {
                consecutive_failures = 0;
            }
            absorb(&mut report, result);

            if self.max_consecutive_failures > 0
                && consecutive_failures >= self.max_consecutive_failures
            {
                let err = ScienceError::SourceUnavailable(format!(
                    "{consecutive_failures} consecutive preprints failed every external lookup"
                ));
                warn!(error = %err, "aborting run");
                outcome = RunOutcome::Aborted {
                    reason: err.to_string(),
                };
                break;
            }
        }

        report.finish(outcome);
        info!(
            run_id = %report.run_id,
            outcome = ?report.outcome,
            completed = report.stats.preprints_completed,
            authors = report.authors.len(),
            "enrichment run finished"
        );
        report
    }

    /// Enrich, join, merge and assign emails for one preprint.
    pub async fn process_preprint(&self, batch: PreprintBatch) -> PreprintResult {
        let preprint_id = batch.preprint_id.clone();
        let mut result = PreprintResult::new(&preprint_id);
        let mut mentions = batch.mentions.clone();

        let pending = self.pending_contributors(&batch, &mut result).await;
        for entry in pending {
            mentions.push(self.lookup_contributor(&preprint_id, entry, &mut result).await);
        }

        let mut registry_position = 0usize;
        let mut looked_up: Vec<String> = Vec::new();
        let identifiers: Vec<String> = mentions
            .iter()
            .filter_map(|m| m.identifier().map(ToOwned::to_owned))
            .collect();
        for identifier in identifiers {
            if looked_up.contains(&identifier) {
                continue;
            }
            looked_up.push(identifier.clone());
            if let Some(person) = self.lookup_person(&identifier, &mut result).await {
                mentions.push(registry_mention(&preprint_id, registry_position, &person));
                registry_position += 1;
            }
        }

        // Identifiers scraped from the document text come without a name; the
        // registry supplies one so they can be joined like attributed text.
        let mut pdf_position = batch
            .email_pool
            .as_ref()
            .map(|pool| pool.position + 1)
            .unwrap_or_else(|| batch.next_position(MentionSource::PdfText));
        for identifier in &batch.candidate_identifiers {
            if looked_up.contains(identifier) {
                continue;
            }
            looked_up.push(identifier.clone());
            if let Some(person) = self.lookup_person(identifier, &mut result).await {
                mentions.push(
                    AuthorMention::new(&preprint_id, MentionSource::PdfText, pdf_position)
                        .with_name(&person.given_name, &person.family_name)
                        .with_identifier(Some(&person.identifier)),
                );
                mentions.push(registry_mention(&preprint_id, registry_position, &person));
                pdf_position += 1;
                registry_position += 1;
            }
        }

        let mut slots = build_slots(&mentions, &self.joiner);

        if self.name_lookup {
            for (position, slot) in slots.iter_mut().enumerate() {
                if slot.has_identifier() {
                    continue;
                }
                self.lookup_by_name(
                    &preprint_id,
                    position,
                    slot,
                    &mut registry_position,
                    &mut result,
                )
                .await;
            }
        }

        let mut rows: Vec<ConsolidatedAuthor> = slots
            .iter()
            .enumerate()
            .map(|(position, slot)| self.merger.merge(&preprint_id, position, slot))
            .collect();

        if let Some(pool) = batch.candidate_emails() {
            let assigned = self.emails.assign(&mut rows, pool);
            result.emails_assigned_from_pool = assigned.len();
        }

        debug!(
            preprint_id = %preprint_id,
            mentions = mentions.len(),
            authors = rows.len(),
            "preprint resolved"
        );
        result.authors = rows;
        result
    }

    async fn pending_contributors(
        &self,
        batch: &PreprintBatch,
        result: &mut PreprintResult,
    ) -> Vec<PendingContributor> {
        if !batch.discover_contributors {
            return batch.pending_contributors.clone();
        }
        let listed = self.directory.contributors(&batch.preprint_id).await;
        result.track("contributor list", &listed);
        let start = batch.next_position(MentionSource::Platform);
        match listed {
            Ok(ids) => ids
                .into_iter()
                .enumerate()
                .map(|(i, contributor_id)| PendingContributor {
                    position: start + i,
                    contributor_id,
                })
                .collect(),
            Err(err) => {
                if !err.is_transient() {
                    debug!(preprint_id = %batch.preprint_id, error = %err, "no contributor list");
                }
                Vec::new()
            }
        }
    }

    async fn lookup_contributor(
        &self,
        preprint_id: &str,
        entry: PendingContributor,
        result: &mut PreprintResult,
    ) -> AuthorMention {
        let profile = self.directory.contributor(&entry.contributor_id).await;
        result.track("contributor", &profile);
        match profile {
            Ok(profile) => platform_mention(
                preprint_id,
                entry.position,
                &profile.full_name,
                profile.identifier.as_deref(),
            ),
            Err(err) => {
                if !err.is_transient() {
                    result
                        .notes
                        .push(format!("contributor {}: {err}", entry.contributor_id));
                }
                AuthorMention::new(preprint_id, MentionSource::Platform, entry.position)
                    .with_error(err.to_string())
            }
        }
    }

    async fn lookup_person(
        &self,
        identifier: &str,
        result: &mut PreprintResult,
    ) -> Option<RegistryPerson> {
        let person = self.registry.person(identifier).await;
        result.track("registry", &person);
        match person {
            Ok(person) => Some(person),
            Err(err) => {
                if !err.is_transient() {
                    debug!(preprint_id = %result.preprint_id, identifier, error = %err, "no registry record");
                }
                None
            }
        }
    }

    /// Registry search for a slot nobody identified. Only a single distinct
    /// candidate is accepted.
    async fn lookup_by_name(
        &self,
        preprint_id: &str,
        position: usize,
        slot: &mut Slot,
        registry_position: &mut usize,
        result: &mut PreprintResult,
    ) {
        let Some((given, family)) = slot
            .representative()
            .map(|m| (m.given_name.clone(), m.family_name.clone()))
        else {
            return;
        };
        if family.is_empty() {
            return;
        }

        let found = self.registry.search_by_name(&family, &given).await;
        result.track("name lookup", &found);
        let mention = AuthorMention::new(preprint_id, MentionSource::NameLookup, position)
            .with_name(&given, &family);

        match found {
            Ok(candidates) if candidates.len() == 1 => {
                let identifier = &candidates[0];
                slot.mentions.push(mention.with_identifier(Some(identifier)));
                if let Some(person) = self.lookup_person(identifier, result).await {
                    slot.mentions
                        .push(registry_mention(preprint_id, *registry_position, &person));
                    *registry_position += 1;
                }
            }
            Ok(candidates) if candidates.is_empty() => {
                slot.mentions.push(mention.with_error("no registry match"));
            }
            Ok(candidates) => {
                let err = ScienceError::AmbiguousLookup {
                    query: mention.display_name(),
                    candidates: candidates.len(),
                };
                result.ambiguous_lookups += 1;
                result.notes.push(err.to_string());
                slot.mentions.push(mention.with_error(err.to_string()));
            }
            Err(err) => {
                slot.mentions.push(mention.with_error(err.to_string()));
            }
        }
    }
}

fn registry_mention(preprint_id: &str, position: usize, person: &RegistryPerson) -> AuthorMention {
    AuthorMention::new(preprint_id, MentionSource::Registry, position)
        .with_name(&person.given_name, &person.family_name)
        .with_identifier(Some(&person.identifier))
        .with_email(person.email.as_deref())
}

fn absorb(report: &mut RunReport, result: PreprintResult) {
    let stats = &mut report.stats;
    stats.preprints_completed += 1;
    stats.transient_failures += result.transient_failures;
    stats.ambiguous_lookups += result.ambiguous_lookups;
    stats.emails_assigned_from_pool += result.emails_assigned_from_pool;
    for row in &result.authors {
        stats.conflicts += row.conflicts().len();
        stats.identifiers_resolved += usize::from(row.identifier().is_some());
        stats.emails_resolved += usize::from(row.email().is_some());
    }
    for message in result.notes {
        report.note(&result.preprint_id, message);
    }
    report.authors.extend(result.authors);
}
