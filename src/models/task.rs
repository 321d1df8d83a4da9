// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Task models for storage and API.

use crate::time_utils::due_sort_key;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A to-do item owned by exactly one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Task {
    /// Store-assigned document ID
    pub id: String,
    pub text: String,
    pub completed: bool,
    /// Owner's identity UID
    pub user_id: String,
    /// Creation time (ISO 8601)
    pub created_at: String,
    /// Deadline (ISO 8601), or None for no deadline
    pub due_date_time: Option<String>,
}

/// Task document as stored in the `tasks` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDocument {
    /// Filled in from the document name on reads; never written.
    #[serde(alias = "_firestore_id", default, skip_serializing)]
    pub id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    pub user_id: String,
    pub created_at: String,
    #[serde(default)]
    pub due_date_time: Option<String>,
}

impl TaskDocument {
    /// Convert a read document into a task. Returns None if the store did
    /// not report a document ID.
    pub fn into_task(self) -> Option<Task> {
        Some(Task {
            id: self.id?,
            text: self.text,
            completed: self.completed,
            user_id: self.user_id,
            created_at: self.created_at,
            due_date_time: self.due_date_time,
        })
    }
}

/// Fields supplied when creating a task. New tasks always start incomplete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub text: String,
    pub user_id: String,
    pub created_at: String,
    pub due_date_time: Option<String>,
}

impl From<&NewTask> for TaskDocument {
    fn from(task: &NewTask) -> Self {
        Self {
            id: None,
            text: task.text.clone(),
            completed: false,
            user_id: task.user_id.clone(),
            created_at: task.created_at.clone(),
            due_date_time: task.due_date_time.clone(),
        }
    }
}

/// Order tasks by ascending due time.
///
/// Tasks without a (parseable) due time come after all dated tasks. Ties
/// are broken by creation time, then ID, so the order is total.
pub fn compare_by_due(a: &Task, b: &Task) -> Ordering {
    let by_due = match (
        due_sort_key(a.due_date_time.as_deref()),
        due_sort_key(b.due_date_time.as_deref()),
    ) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };

    by_due
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort a snapshot in display order.
pub fn sort_by_due(tasks: &mut [Task]) {
    tasks.sort_by(compare_by_due);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, created_at: &str, due: Option<&str>) -> Task {
        Task {
            id: id.to_string(),
            text: format!("task {id}"),
            completed: false,
            user_id: "u1".to_string(),
            created_at: created_at.to_string(),
            due_date_time: due.map(str::to_string),
        }
    }

    #[test]
    fn dated_tasks_ascend_and_undated_go_last() {
        let mut tasks = vec![
            task("a", "2024-01-01T00:00:00.000Z", None),
            task("b", "2024-01-01T00:00:00.000Z", Some("2024-03-01T00:00:00.000Z")),
            task("c", "2024-01-01T00:00:00.000Z", Some("2024-02-01T00:00:00.000Z")),
            task("d", "2024-01-01T00:00:00.000Z", Some("bogus")),
        ];
        sort_by_due(&mut tasks);

        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a", "d"]);
    }

    #[test]
    fn ties_break_on_creation_time() {
        let due = Some("2024-02-01T00:00:00.000Z");
        let mut tasks = vec![
            task("late", "2024-01-02T00:00:00.000Z", due),
            task("early", "2024-01-01T00:00:00.000Z", due),
        ];
        sort_by_due(&mut tasks);
        assert_eq!(tasks[0].id, "early");
    }

    #[test]
    fn document_shape_matches_store_layout() {
        let doc = TaskDocument::from(&NewTask {
            text: "Buy milk".to_string(),
            user_id: "u1".to_string(),
            created_at: "2024-01-01T00:00:00.000Z".to_string(),
            due_date_time: None,
        });

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "text": "Buy milk",
                "completed": false,
                "userId": "u1",
                "createdAt": "2024-01-01T00:00:00.000Z",
                "dueDateTime": null,
            })
        );
    }

    #[test]
    fn document_without_id_is_skipped() {
        let doc: TaskDocument = serde_json::from_value(serde_json::json!({
            "text": "x",
            "completed": true,
            "userId": "u1",
            "createdAt": "2024-01-01T00:00:00.000Z",
        }))
        .unwrap();
        assert!(doc.clone().into_task().is_none());

        let with_id = TaskDocument {
            id: Some("t1".to_string()),
            ..doc
        };
        let task = with_id.into_task().unwrap();
        assert_eq!(task.id, "t1");
        assert!(task.completed);
        assert_eq!(task.due_date_time, None);
    }
}
