//! Admin notifications for captured leads.
//!
//! Three notices exist: a new lead, a same-day resubmission that changed
//! nothing (duplicate), and a resubmission that updated the stored lead.
//! Delivery failures are logged and swallowed; a lead write never fails
//! because an email could not be sent.

use std::sync::Arc;

use crate::config::NotificationSettings;
use crate::mailer::{Mailer, OutgoingEmail};
use crate::models::{FieldChange, Lead};

/// Which admin notice to send.
#[derive(Debug, Clone, PartialEq)]
pub enum LeadNotice {
    Created,
    Duplicate,
    Updated { changes: Vec<FieldChange> },
}

/// Human-readable and HTML renderings of a notice.
#[derive(Debug, Clone, PartialEq)]
pub struct NoticeContent {
    pub subject: String,
    pub text: String,
    pub html: String,
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn or_not_provided(value: &str) -> &str {
    if value.trim().is_empty() {
        "Not provided"
    } else {
        value
    }
}

fn render_change_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) if s.is_empty() => "(empty)".to_string(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "(empty)".to_string(),
        other => other.to_string(),
    }
}

/// Label/value rows describing the lead, shared by every notice.
fn detail_rows(lead: &Lead, brand: &str) -> Vec<(&'static str, String)> {
    let c = &lead.contact;
    vec![
        ("Name", format!("{} {}", c.first_name, c.last_name)),
        ("Email", c.email.clone()),
        ("Phone", c.phone.clone()),
        ("Suburb", or_not_provided(&c.suburb).to_string()),
        ("Address", or_not_provided(&c.address).to_string()),
        ("Timeframe", c.timeframe.clone()),
        ("Description", or_not_provided(&c.description).to_string()),
        ("Selling interest", c.selling_interest.to_string()),
        ("Buying interest", c.buying_interest.to_string()),
        ("Score", format!("{} ({})", c.score, c.category)),
        ("Brand", brand.to_string()),
    ]
}

/// Renders the notice for `lead`.
pub fn compose(notice: &LeadNotice, lead: &Lead, brand: &str) -> NoticeContent {
    let name = format!("{} {}", lead.contact.first_name, lead.contact.last_name);
    let id = &lead.lead_id;

    let (subject, intro, accent, heading, footer) = match notice {
        LeadNotice::Created => (
            format!("✨ New lead received: {} ({})", name, id),
            "A new lead was submitted.".to_string(),
            "#10b981",
            "✨ New Lead Received",
            format!("Lead ID: {}", id),
        ),
        LeadNotice::Duplicate => (
            format!("🔄 Duplicate lead submission: {} (Original: {})", name, id),
            "A duplicate submission from the same person today was detected. No field changed."
                .to_string(),
            "#f59e0b",
            "🔄 Duplicate Lead Submission",
            format!("No new lead was created. Original lead ID: {}", id),
        ),
        LeadNotice::Updated { changes } => (
            format!("📝 Lead updated by resubmission: {} ({})", name, id),
            format!(
                "The same person submitted the form again today; {} field(s) changed.",
                changes.len()
            ),
            "#3b82f6",
            "📝 Lead Updated",
            format!("No new lead was created. Updated lead ID: {}", id),
        ),
    };

    let rows = detail_rows(lead, brand);
    let changes: &[FieldChange] = match notice {
        LeadNotice::Updated { changes } => changes,
        _ => &[],
    };

    let mut text = format!("{}\n\nLead ID: {}\n", intro, id);
    for (label, value) in &rows {
        text.push_str(&format!("{}: {}\n", label, value));
    }
    if !changes.is_empty() {
        text.push_str("\nChanges:\n");
        for change in changes {
            text.push_str(&format!(
                "- {}: {} -> {}\n",
                change.field,
                render_change_value(&change.old),
                render_change_value(&change.new)
            ));
        }
    }
    text.push('\n');
    text.push_str(&footer);

    let mut html = format!(
        r#"<div style="border-left: 4px solid {accent}; padding-left: 16px; margin: 16px 0;"><h3 style="color: {accent}; margin: 0;">{heading}</h3><p style="margin: 8px 0; color: #6b7280;">{intro}</p></div>"#,
        accent = accent,
        heading = heading,
        intro = escape_html(&intro),
    );
    html.push_str(&format!(
        r#"<p><strong>Lead ID:</strong> <span style="font-family: monospace;">{}</span></p><ul>"#,
        escape_html(id)
    ));
    for (label, value) in &rows {
        html.push_str(&format!(
            "<li><strong>{}:</strong> {}</li>",
            label,
            escape_html(value)
        ));
    }
    html.push_str("</ul>");
    if !changes.is_empty() {
        html.push_str("<h4>Changes</h4><ul>");
        for change in changes {
            html.push_str(&format!(
                "<li><strong>{}:</strong> {} &rarr; {}</li>",
                escape_html(&change.field),
                escape_html(&render_change_value(&change.old)),
                escape_html(&render_change_value(&change.new))
            ));
        }
        html.push_str("</ul>");
    }
    html.push_str(&format!(
        r#"<p style="color: #6b7280; font-size: 14px;">{}</p>"#,
        escape_html(&footer)
    ));

    NoticeContent {
        subject,
        text,
        html,
    }
}

/// Sends admin notices, awaited or detached depending on deployment.
#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    settings: NotificationSettings,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, settings: NotificationSettings) -> Self {
        Self { mailer, settings }
    }

    pub fn settings(&self) -> &NotificationSettings {
        &self.settings
    }

    /// Builds the email for `notice`, or `None` when no admin address is configured.
    pub fn build_email(&self, notice: &LeadNotice, lead: &Lead) -> Option<OutgoingEmail> {
        let to = self.settings.admin_email.clone()?;
        let from = self.settings.from_address.clone().unwrap_or_else(|| to.clone());
        let reply_to = if lead.contact.email.is_empty() {
            to.clone()
        } else {
            lead.contact.email.clone()
        };
        let content = compose(notice, lead, &self.settings.brand_name);

        Some(OutgoingEmail {
            to,
            from,
            reply_to,
            subject: content.subject,
            text: content.text,
            html: content.html,
        })
    }

    /// Sends `notice` about `lead`. Never returns an error.
    ///
    /// With `await_delivery` the send completes before this returns; otherwise
    /// it runs on a detached task.
    pub async fn dispatch(&self, notice: LeadNotice, lead: &Lead) {
        let Some(email) = self.build_email(&notice, lead) else {
            tracing::warn!(
                "No admin email configured, skipping notification for lead {}",
                lead.lead_id
            );
            return;
        };

        tracing::info!(
            "Dispatching {:?} notification for lead {}",
            notice_kind(&notice),
            lead.lead_id
        );

        if self.settings.await_delivery {
            deliver(self.mailer.clone(), email).await;
        } else {
            tokio::spawn(deliver(self.mailer.clone(), email));
        }
    }
}

fn notice_kind(notice: &LeadNotice) -> &'static str {
    match notice {
        LeadNotice::Created => "new-lead",
        LeadNotice::Duplicate => "duplicate",
        LeadNotice::Updated { .. } => "updated",
    }
}

async fn deliver(mailer: Arc<dyn Mailer>, email: OutgoingEmail) {
    if let Err(e) = mailer.send(&email).await {
        tracing::warn!("Error sending notification email '{}': {}", email.subject, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Contact, LeadMetadata, LeadStatus};
    use chrono::Utc;
    use serde_json::json;

    fn lead() -> Lead {
        let now = Utc::now();
        Lead {
            lead_id: "L1".into(),
            contact: Contact {
                first_name: "Ana".into(),
                last_name: "<b>Lee</b>".into(),
                email: "ana@example.com".into(),
                phone: "0400 000 123".into(),
                preferred_contact: "both".into(),
                suburb: "Richmond".into(),
                address: String::new(),
                timeframe: "asap".into(),
                description: String::new(),
                selling_interest: true,
                buying_interest: false,
                score: 80,
                category: "hot".into(),
            },
            status: LeadStatus {
                current: "new".into(),
                history: vec![],
            },
            metadata: LeadMetadata {
                created_at: now,
                updated_at: now,
                deleted_at: None,
                version: 1,
                tags: vec![],
                custom_fields: Default::default(),
            },
            timeline: vec![],
        }
    }

    #[test]
    fn new_lead_notice_lists_details() {
        let content = compose(&LeadNotice::Created, &lead(), "Stone Real Estate");

        assert!(content.subject.contains("New lead received"));
        assert!(content.subject.contains("(L1)"));
        assert!(content.text.contains("Address: Not provided"));
        assert!(content.text.contains("Score: 80 (hot)"));
        assert!(content.text.contains("Brand: Stone Real Estate"));
    }

    #[test]
    fn html_escapes_submitted_values() {
        let content = compose(&LeadNotice::Created, &lead(), "Brand");
        assert!(content.html.contains("Ana &lt;b&gt;Lee&lt;/b&gt;"));
        assert!(!content.html.contains("<b>Lee</b>"));
    }

    #[test]
    fn updated_notice_lists_changes() {
        let notice = LeadNotice::Updated {
            changes: vec![FieldChange {
                field: "timeframe".into(),
                old: json!("not sure"),
                new: json!("asap"),
            }],
        };
        let content = compose(&notice, &lead(), "Brand");

        assert!(content.subject.contains("updated by resubmission"));
        assert!(content.text.contains("- timeframe: not sure -> asap"));
        assert!(content.html.contains("timeframe"));
    }

    #[test]
    fn duplicate_notice_references_original() {
        let content = compose(&LeadNotice::Duplicate, &lead(), "Brand");
        assert!(content.subject.contains("Original: L1"));
    }

    #[test]
    fn email_needs_admin_address() {
        let notifier = Notifier::new(
            Arc::new(crate::mailer::LogMailer),
            NotificationSettings::default(),
        );
        assert!(notifier.build_email(&LeadNotice::Created, &lead()).is_none());

        let notifier = Notifier::new(
            Arc::new(crate::mailer::LogMailer),
            NotificationSettings {
                admin_email: Some("admin@agency.test".into()),
                from_address: Some("noreply@agency.test".into()),
                ..NotificationSettings::default()
            },
        );
        let email = notifier.build_email(&LeadNotice::Created, &lead()).unwrap();
        assert_eq!(email.to, "admin@agency.test");
        assert_eq!(email.from, "noreply@agency.test");
        assert_eq!(email.reply_to, "ana@example.com");
    }
}
