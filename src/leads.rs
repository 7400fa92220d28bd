//! Lead record management.
//!
//! Public submissions are scored, checked against the same-day dedupe index,
//! and either create a new lead or update the lead already captured today.
//! Admin operations list, patch, re-status and soft-delete leads. Every
//! read-modify-write of a lead runs inside a single-document transaction.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::dedupe::{dedupe_key, DedupeGate};
use crate::errors::{AppError, ResultExt};
use crate::models::{
    default_preferred_contact, default_timeframe, timestamp, Contact, ContactPatch, FieldChange,
    Lead, LeadMetadata, LeadPatch, LeadStatus, ListLeadsParams, PublicLeadForm, RequestContext,
    StatusHistoryEntry, StatusUpdate, SubmissionOutcome, TimelineEntry,
};
use crate::notifications::{LeadNotice, Notifier};
use crate::scoring::{compute_score, parse_interest_flag, ScoreResult, ScoringInput};
use crate::store::{
    merge_json, Document, DocumentQuery, DocumentStore, Mutation, SortDirection, WriteMode,
};

pub const LEADS_COLLECTION: &str = "leads";
pub const DEFAULT_LIST_LIMIT: usize = 20;
pub const MAX_LIST_LIMIT: usize = 100;

const INITIAL_STATUS: &str = "new";
const FORM_NOTES: &str = "Lead from homepage form";
const RESUBMISSION_KIND: &str = "resubmission";
const RESUBMISSION_SOURCE: &str = "homepage form";

/// Form values after trimming and case normalisation.
///
/// Optional fields are `None` when the form left them empty, so a
/// resubmission can fall back to what the stored lead already has.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSubmission {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub preferred_contact: Option<String>,
    pub suburb: Option<String>,
    pub address: Option<String>,
    pub timeframe: Option<String>,
    pub description: Option<String>,
    pub selling_interest: Option<bool>,
    pub buying_interest: Option<bool>,
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl NormalizedSubmission {
    pub fn from_form(form: &PublicLeadForm) -> Self {
        let buying_raw = non_empty(form.interested_buying.as_ref()).or_else(|| non_empty(form.buying.as_ref()));
        Self {
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            email: form.email.trim().to_lowercase(),
            phone: form.phone.trim().to_string(),
            preferred_contact: non_empty(form.preferred_contact.as_ref()),
            suburb: non_empty(form.suburb.as_ref()),
            address: non_empty(form.address.as_ref()),
            timeframe: non_empty(form.timeframe.as_ref()),
            description: non_empty(form.description.as_ref()),
            selling_interest: non_empty(form.interested.as_ref()).map(|v| parse_interest_flag(&v)),
            buying_interest: buying_raw.map(|v| parse_interest_flag(&v)),
        }
    }

    /// Contact for a first-time submission, with form defaults applied.
    fn to_contact(&self) -> Contact {
        Contact {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            preferred_contact: self
                .preferred_contact
                .clone()
                .unwrap_or_else(default_preferred_contact),
            suburb: self.suburb.clone().unwrap_or_default(),
            address: self.address.clone().unwrap_or_default(),
            timeframe: self.timeframe.clone().unwrap_or_else(default_timeframe),
            description: self.description.clone().unwrap_or_default(),
            selling_interest: self.selling_interest.unwrap_or(false),
            buying_interest: self.buying_interest.unwrap_or(false),
            score: 0,
            category: String::new(),
        }
    }
}

/// Recomputes score/category on `contact` and mirrors the scoring details into custom fields.
pub fn apply_score(contact: &mut Contact, custom_fields: &mut Map<String, Value>) -> ScoreResult {
    let result = compute_score(&ScoringInput {
        selling_interest: contact.selling_interest,
        buying_interest: contact.buying_interest,
        timeframe: &contact.timeframe,
    });
    contact.score = result.total_score;
    contact.category = result.category.clone();

    custom_fields.insert("selling_interest".into(), json!(contact.selling_interest));
    custom_fields.insert("buying_interest".into(), json!(contact.buying_interest));
    custom_fields.insert("scoring_version".into(), json!(result.score_version));
    custom_fields.insert("scoring_factors".into(), json!(result.factors));
    result
}

fn track_text(changes: &mut Vec<FieldChange>, field: &str, slot: &mut String, incoming: Option<&str>) {
    let Some(incoming) = incoming.map(str::trim).filter(|v| !v.is_empty()) else {
        return;
    };
    if slot.as_str() != incoming {
        changes.push(FieldChange {
            field: field.to_string(),
            old: json!(slot.as_str()),
            new: json!(incoming),
        });
        *slot = incoming.to_string();
    }
}

fn track_flag(changes: &mut Vec<FieldChange>, field: &str, slot: &mut bool, incoming: Option<bool>) {
    if let Some(incoming) = incoming {
        if *slot != incoming {
            changes.push(FieldChange {
                field: field.to_string(),
                old: json!(*slot),
                new: json!(incoming),
            });
            *slot = incoming;
        }
    }
}

/// Folds a same-day resubmission into `lead` and records it on the timeline.
///
/// Non-empty incoming values override, empty ones keep the stored value.
/// Returns the trackable fields that changed.
pub fn apply_resubmission(
    lead: &mut Lead,
    submission: &NormalizedSubmission,
    now: DateTime<Utc>,
) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    let contact = &mut lead.contact;

    track_text(&mut changes, "first_name", &mut contact.first_name, Some(&submission.first_name));
    track_text(&mut changes, "last_name", &mut contact.last_name, Some(&submission.last_name));
    track_text(&mut changes, "phone", &mut contact.phone, Some(&submission.phone));
    track_text(
        &mut changes,
        "preferred_contact",
        &mut contact.preferred_contact,
        submission.preferred_contact.as_deref(),
    );
    track_text(&mut changes, "suburb", &mut contact.suburb, submission.suburb.as_deref());
    track_text(&mut changes, "address", &mut contact.address, submission.address.as_deref());
    track_text(&mut changes, "timeframe", &mut contact.timeframe, submission.timeframe.as_deref());
    track_text(
        &mut changes,
        "description",
        &mut contact.description,
        submission.description.as_deref(),
    );
    track_flag(
        &mut changes,
        "selling_interest",
        &mut contact.selling_interest,
        submission.selling_interest,
    );
    track_flag(
        &mut changes,
        "buying_interest",
        &mut contact.buying_interest,
        submission.buying_interest,
    );

    let scoring = apply_score(&mut lead.contact, &mut lead.metadata.custom_fields);
    let suburb = lead.contact.suburb.clone();
    lead.metadata.add_tag(&suburb);
    lead.metadata.updated_at = now;

    lead.timeline.push(TimelineEntry {
        kind: RESUBMISSION_KIND.to_string(),
        occurred_at: now,
        changes: changes.clone(),
        score: scoring.total_score,
        category: scoring.category,
        source: RESUBMISSION_SOURCE.to_string(),
    });

    changes
}

/// Merges an admin contact patch into `contact`.
pub fn apply_contact_patch(contact: &mut Contact, patch: &ContactPatch) {
    let text = |slot: &mut String, value: &Option<String>| {
        if let Some(v) = value {
            *slot = v.trim().to_string();
        }
    };
    text(&mut contact.first_name, &patch.first_name);
    text(&mut contact.last_name, &patch.last_name);
    text(&mut contact.phone, &patch.phone);
    text(&mut contact.preferred_contact, &patch.preferred_contact);
    text(&mut contact.suburb, &patch.suburb);
    text(&mut contact.address, &patch.address);
    text(&mut contact.timeframe, &patch.timeframe);
    text(&mut contact.description, &patch.description);
    if let Some(ref email) = patch.email {
        contact.email = email.trim().to_lowercase();
    }
    if let Some(selling) = patch.selling_interest {
        contact.selling_interest = selling;
    }
    if let Some(buying) = patch.buying_interest {
        contact.buying_interest = buying;
    }
}

fn searchable_text(lead: &Lead) -> String {
    let c = &lead.contact;
    [
        c.first_name.as_str(),
        c.last_name.as_str(),
        c.email.as_str(),
        c.phone.as_str(),
        c.address.as_str(),
        c.description.as_str(),
    ]
    .join(" ")
    .to_lowercase()
}

/// Runs a typed edit over a stored lead document.
///
/// The typed lead is written back over the original JSON, so keys this
/// service does not model survive the round trip.
fn rewrite_lead<F>(id: &str, data: Value, edit: F) -> Result<Value, AppError>
where
    F: FnOnce(&mut Lead),
{
    let mut lead = Lead::from_document(Document {
        id: id.to_string(),
        data: data.clone(),
    })?;
    edit(&mut lead);

    let mut merged = data;
    merge_json(&mut merged, lead.to_document_data()?);
    Ok(merged)
}

fn lead_not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Lead {} not found", id))
}

#[derive(Clone)]
pub struct LeadService {
    store: Arc<dyn DocumentStore>,
    dedupe: DedupeGate,
    notifier: Notifier,
}

impl LeadService {
    pub fn new(store: Arc<dyn DocumentStore>, notifier: Notifier) -> Self {
        Self {
            dedupe: DedupeGate::new(store.clone()),
            store,
            notifier,
        }
    }

    pub async fn create_from_public_form(
        &self,
        form: &PublicLeadForm,
        ctx: &RequestContext,
    ) -> Result<SubmissionOutcome, AppError> {
        self.create_from_public_form_at(form, ctx, Utc::now()).await
    }

    /// Public submission with an explicit submission time (drives the dedupe day).
    pub async fn create_from_public_form_at(
        &self,
        form: &PublicLeadForm,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> Result<SubmissionOutcome, AppError> {
        let submission = NormalizedSubmission::from_form(form);
        let key = dedupe_key(&submission.email, &submission.phone, now);

        if let Some(entry) = self.dedupe.lookup(&key).await? {
            tracing::info!(
                "Same-day resubmission detected, updating lead {}",
                entry.lead_id
            );
            return self.resubmit(entry.lead_id, submission, now).await;
        }

        let mut contact = submission.to_contact();
        let mut custom_fields = Map::new();
        apply_score(&mut contact, &mut custom_fields);

        let lead_id = self.store.generate_id();
        let mut metadata = LeadMetadata {
            created_at: now,
            updated_at: now,
            deleted_at: None,
            version: 1,
            tags: Vec::new(),
            custom_fields,
        };
        metadata.add_tag(&contact.suburb);

        let lead = Lead {
            lead_id: lead_id.clone(),
            contact,
            status: LeadStatus {
                current: INITIAL_STATUS.to_string(),
                history: vec![StatusHistoryEntry {
                    status: INITIAL_STATUS.to_string(),
                    changed_at: now,
                    changed_by: ctx.actor(),
                    notes: FORM_NOTES.to_string(),
                }],
            },
            metadata,
            timeline: Vec::new(),
        };

        self.store
            .set(
                LEADS_COLLECTION,
                &lead_id,
                lead.to_document_data()?,
                WriteMode::Replace,
            )
            .await
            .context("Failed to store new lead")?;
        // A failure here leaves the lead without its dedupe entry; a retry
        // creates a second lead rather than updating this one.
        self.dedupe
            .record(&key, &lead_id, now)
            .await
            .context("Failed to record dedupe entry")?;

        tracing::info!(
            "Created lead {} (score {}, {})",
            lead_id,
            lead.contact.score,
            lead.contact.category
        );

        self.notifier.dispatch(LeadNotice::Created, &lead).await;

        Ok(SubmissionOutcome {
            reused: false,
            lead_id,
            score: lead.contact.score,
            updated: None,
            changes: None,
            warning: None,
        })
    }

    async fn resubmit(
        &self,
        lead_id: String,
        submission: NormalizedSubmission,
        now: DateTime<Utc>,
    ) -> Result<SubmissionOutcome, AppError> {
        let tx_id = lead_id.clone();
        let tx_submission = submission.clone();
        let mutation: Mutation = Box::new(move |data: Value| {
            rewrite_lead(&tx_id, data, |lead| {
                apply_resubmission(lead, &tx_submission, now);
            })
        });

        let Some(doc) = self
            .store
            .transact(LEADS_COLLECTION, &lead_id, mutation)
            .await
            .context("Failed to update resubmitted lead")?
        else {
            tracing::warn!(
                "Dedupe entry points at missing lead {}, submission not stored",
                lead_id
            );
            let contact = submission.to_contact();
            let scoring = compute_score(&ScoringInput {
                selling_interest: contact.selling_interest,
                buying_interest: contact.buying_interest,
                timeframe: &contact.timeframe,
            });
            return Ok(SubmissionOutcome {
                reused: true,
                lead_id,
                score: scoring.total_score,
                updated: Some(false),
                changes: Some(Vec::new()),
                warning: Some("Existing lead could not be found; submission was not stored".into()),
            });
        };

        let lead = Lead::from_document(doc)?;
        let changes = lead
            .timeline
            .last()
            .map(|entry| entry.changes.clone())
            .unwrap_or_default();

        tracing::info!(
            "Lead {} updated by resubmission ({} change(s), score {})",
            lead.lead_id,
            changes.len(),
            lead.contact.score
        );

        let notice = if changes.is_empty() {
            LeadNotice::Duplicate
        } else {
            LeadNotice::Updated {
                changes: changes.clone(),
            }
        };
        self.notifier.dispatch(notice, &lead).await;

        Ok(SubmissionOutcome {
            reused: true,
            lead_id: lead.lead_id,
            score: lead.contact.score,
            updated: Some(true),
            changes: Some(changes),
            warning: None,
        })
    }

    /// Lists leads newest first.
    ///
    /// The free-text `q` filter runs over the fetched page only, so a search
    /// can return fewer than `limit` leads even when more matches exist.
    pub async fn list(&self, params: &ListLeadsParams) -> Result<Vec<Lead>, AppError> {
        let limit = params
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);
        let offset = params.offset.unwrap_or(0);

        let mut query = DocumentQuery::new();
        if let Some(status) = non_empty(params.status.as_ref()) {
            query = query.where_eq("status.current", status);
        }
        if let Some(suburb) = non_empty(params.suburb.as_ref()) {
            query = query.where_eq("contact.suburb", suburb);
        }
        if let Some(address) = non_empty(params.address.as_ref()) {
            query = query
                .where_gte("contact.address", address.clone())
                .where_lte("contact.address", format!("{}\u{f8ff}", address));
        }
        let query = query
            .order_by("metadata.created_at", SortDirection::Desc)
            .offset(offset)
            .limit(limit);

        let docs = self
            .store
            .query(LEADS_COLLECTION, &query)
            .await
            .context("Failed to list leads")?;

        let mut leads: Vec<Lead> = docs
            .into_iter()
            .filter_map(|doc| {
                let id = doc.id.clone();
                match Lead::from_document(doc) {
                    Ok(lead) => Some(lead),
                    Err(e) => {
                        tracing::warn!("Skipping unreadable lead {}: {}", id, e);
                        None
                    }
                }
            })
            .collect();

        if let Some(term) = non_empty(params.q.as_ref()) {
            let term = term.to_lowercase();
            leads.retain(|lead| searchable_text(lead).contains(&term));
        }

        tracing::debug!("Listed {} lead(s)", leads.len());
        Ok(leads)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Lead>, AppError> {
        self.store
            .get(LEADS_COLLECTION, id)
            .await?
            .map(Lead::from_document)
            .transpose()
    }

    /// Sets the current status and appends one history entry.
    pub async fn update_status(
        &self,
        id: &str,
        update: StatusUpdate,
        ctx: &RequestContext,
    ) -> Result<Lead, AppError> {
        let now = Utc::now();
        let tx_id = id.to_string();
        let changed_by = update.changed_by.clone().unwrap_or_else(|| ctx.actor());
        let mutation: Mutation = Box::new(move |data: Value| {
            rewrite_lead(&tx_id, data, |lead| {
                lead.status.history.push(StatusHistoryEntry {
                    status: update.status.clone(),
                    changed_at: now,
                    changed_by,
                    notes: update.notes.unwrap_or_default(),
                });
                lead.status.current = update.status;
                lead.metadata.updated_at = now;
            })
        });

        let doc = self
            .store
            .transact(LEADS_COLLECTION, id, mutation)
            .await?
            .ok_or_else(|| lead_not_found(id))?;
        let lead = Lead::from_document(doc)?;

        tracing::info!("Lead {} status set to '{}'", id, lead.status.current);
        Ok(lead)
    }

    /// Applies an admin patch in one transactional write.
    ///
    /// Any contact patch triggers a score recomputation from the merged
    /// contact. A status entry is appended only when `status.current` changes.
    pub async fn update(
        &self,
        id: &str,
        patch: LeadPatch,
        ctx: &RequestContext,
    ) -> Result<Lead, AppError> {
        let now = Utc::now();
        let tx_id = id.to_string();
        let actor = ctx.actor();
        let mutation: Mutation = Box::new(move |data: Value| {
            rewrite_lead(&tx_id, data, |lead| {
                if let Some(ref metadata) = patch.metadata {
                    if let Some(ref tags) = metadata.tags {
                        lead.metadata.tags.clear();
                        for tag in tags {
                            lead.metadata.add_tag(tag);
                        }
                    }
                    if let Some(ref custom) = metadata.custom_fields {
                        for (key, value) in custom {
                            lead.metadata.custom_fields.insert(key.clone(), value.clone());
                        }
                    }
                }

                if let Some(ref contact) = patch.contact {
                    apply_contact_patch(&mut lead.contact, contact);
                    apply_score(&mut lead.contact, &mut lead.metadata.custom_fields);
                }

                if let Some(ref status) = patch.status {
                    let next = status
                        .current
                        .as_deref()
                        .map(str::trim)
                        .filter(|s| !s.is_empty());
                    if let Some(next) = next {
                        if next != lead.status.current {
                            lead.status.history.push(StatusHistoryEntry {
                                status: next.to_string(),
                                changed_at: now,
                                changed_by: status.changed_by.clone().unwrap_or(actor),
                                notes: status.notes.clone().unwrap_or_default(),
                            });
                            lead.status.current = next.to_string();
                        }
                    }
                }

                lead.metadata.updated_at = now;
            })
        });

        let doc = self
            .store
            .transact(LEADS_COLLECTION, id, mutation)
            .await?
            .ok_or_else(|| lead_not_found(id))?;
        let lead = Lead::from_document(doc)?;

        tracing::info!(
            "Lead {} updated (score {}, {})",
            id,
            lead.contact.score,
            lead.contact.category
        );
        Ok(lead)
    }

    /// Marks the lead deleted; the document and all its fields remain.
    pub async fn soft_delete(&self, id: &str) -> Result<Lead, AppError> {
        let now = timestamp::format(&Utc::now());
        let mutation: Mutation = Box::new(move |mut data: Value| {
            merge_json(
                &mut data,
                json!({ "metadata": { "deleted_at": now, "updated_at": now } }),
            );
            Ok(data)
        });

        let doc = self
            .store
            .transact(LEADS_COLLECTION, id, mutation)
            .await?
            .ok_or_else(|| lead_not_found(id))?;

        tracing::info!("Lead {} soft-deleted", id);
        Lead::from_document(doc)
    }
}
