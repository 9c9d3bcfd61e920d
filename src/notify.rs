//! Notifier (spec.md §4.8), grounded on `_send_validation_error_email`:
//! recipient set is the union of `created_by`/`modified_by` across
//! implicated entities, deduplicated; one consolidated message per
//! recipient, `messages = [{filenames, message}]` (spec.md §4.8's literal
//! contract shape).

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

use crate::entity::{Center, Entity};
use crate::error::PipelineResult;

/// One implicated file's validation outcome, paired with who to notify
/// about it. Built per invalid file rather than per submission unit so
/// the duplicate-filename pass (spec.md §4.6), which runs after
/// per-file validation, can contribute notifications too.
#[derive(Debug, Clone)]
pub struct ReportItem {
    pub filenames: Vec<String>,
    pub message: String,
    pub recipients: HashSet<String>,
}

impl ReportItem {
    pub fn for_entity(entity: &Entity, message: impl Into<String>) -> Self {
        ReportItem {
            filenames: vec![entity.name.clone()],
            message: message.into(),
            recipients: recipients(std::slice::from_ref(entity)),
        }
    }
}

/// One notification to deliver to a submitter about their center's run:
/// the `messages` contract of spec.md §4.8 already flattened into a
/// human-readable body, beginning with the recipient's name and
/// enumerating each `(filenames, message)` pair.
#[derive(Debug, Clone)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Builds and delivers submitter notifications. The wire delivery
/// mechanism (SMTP, platform messaging API) is an external collaborator
/// left to an implementation this crate does not provide, mirroring the
/// Gateway's concrete-wire-call boundary.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> PipelineResult<()>;
}

/// Recipients implicated by a submission unit: the union of
/// `created_by`/`modified_by` across its entities.
pub fn recipients(entities: &[Entity]) -> HashSet<String> {
    let mut set = HashSet::new();
    for entity in entities {
        set.insert(entity.created_by.clone());
        set.insert(entity.modified_by.clone());
    }
    set
}

/// Consolidate a center's invalid-file report items into one notification
/// per recipient (spec.md §4.7 step 6: "consolidate notifications per
/// recipient"). A recipient implicated by several files gets a single
/// message enumerating all of them, not one delivery per file.
pub fn consolidate(center: &Center, items: &[ReportItem]) -> Vec<Notification> {
    let subject = format!(
        "{} Validation Error Report: {}",
        chrono::Utc::now().format("%Y-%m-%d"),
        center.0
    );

    let mut by_recipient: HashMap<String, Vec<&ReportItem>> = HashMap::new();
    for item in items {
        for recipient in &item.recipients {
            by_recipient.entry(recipient.clone()).or_default().push(item);
        }
    }

    by_recipient
        .into_iter()
        .map(|(recipient, items)| {
            let mut body = format!("Hello {recipient},\n\nThe following file(s) failed validation:\n\n");
            for item in items {
                body.push_str(&format!("{}: {}\n", item.filenames.join(", "), item.message));
            }
            Notification {
                recipient,
                subject: subject.clone(),
                body,
            }
        })
        .collect()
}

/// Default `Notifier`: logs the notification instead of sending it,
/// matching how a default connector configuration degrades to a
/// local/no-op backend when no remote profile is configured.
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn deliver(&self, notification: &Notification) -> PipelineResult<()> {
        tracing::info!(
            recipient = %notification.recipient,
            subject = %notification.subject,
            "notification delivered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    fn entity(created_by: &str, modified_by: &str) -> Entity {
        Entity {
            id: "syn1".into(),
            name: "a.csv".into(),
            md5: "m".into(),
            size: 1,
            created_by: created_by.into(),
            modified_by: modified_by.into(),
            modified_on: Utc::now(),
            path: None,
            annotations: HashMap::new(),
        }
    }

    #[test]
    fn recipients_dedupe_across_entities() {
        let entities = vec![entity("alice", "bob"), entity("alice", "carol")];
        let set = recipients(&entities);
        assert_eq!(set.len(), 3);
        assert!(set.contains("alice") && set.contains("bob") && set.contains("carol"));
    }

    #[test]
    fn consolidate_groups_multiple_files_under_one_recipient() {
        let center = Center::from("CTR1");
        let alice_file_a = entity("alice", "alice");
        let mut alice_file_b = entity("alice", "alice");
        alice_file_b.name = "b.csv".into();

        let items = vec![
            ReportItem::for_entity(&alice_file_a, "bad header"),
            ReportItem::for_entity(&alice_file_b, "duplicate filename"),
        ];
        let notifications = consolidate(&center, &items);

        assert_eq!(notifications.len(), 1);
        let notification = &notifications[0];
        assert_eq!(notification.recipient, "alice");
        assert!(notification.body.contains("a.csv: bad header"));
        assert!(notification.body.contains("b.csv: duplicate filename"));
    }

    #[test]
    fn consolidate_sends_one_notification_per_distinct_owner() {
        let center = Center::from("CTR1");
        let items = vec![
            ReportItem::for_entity(&entity("alice", "alice"), "m1"),
            ReportItem::for_entity(&entity("bob", "bob"), "m2"),
        ];
        let notifications = consolidate(&center, &items);
        assert_eq!(notifications.len(), 2);
    }

    #[tokio::test]
    async fn logging_notifier_accepts_delivery() {
        let notifier = LoggingNotifier;
        let notification = Notification {
            recipient: "alice".into(),
            subject: "subject".into(),
            body: "body".into(),
        };
        notifier.deliver(&notification).await.unwrap();
    }
}
