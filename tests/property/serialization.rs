//! Property-based decoding tests for the wire model.
//!
//! Uses proptest to verify:
//! 1. Random bytes never cause a panic in `decode_payload` or `decode_credential`.
//! 2. Any task survives the enveloped and the bare response shape identically.
//! 3. Numeric identifiers decode to their decimal string form.

use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use taskboard_proto::codec::{decode_credential, decode_payload};
use taskboard_proto::task::{ListId, Task, TaskId, TaskStatus};

/// Strategy for generating arbitrary statuses, including "absent".
fn arb_status() -> impl Strategy<Value = Option<TaskStatus>> {
    prop_oneof![
        Just(None),
        Just(Some(TaskStatus::Todo)),
        Just(Some(TaskStatus::InProgress)),
        Just(Some(TaskStatus::Done)),
    ]
}

/// Strategy for generating arbitrary due dates within a sane range.
fn arb_due_date() -> impl Strategy<Value = Option<NaiveDate>> {
    prop::option::of((2000i32..2100, 1u32..=12, 1u32..=28))
        .prop_map(|d| d.and_then(|(y, m, day)| NaiveDate::from_ymd_opt(y, m, day)))
}

/// Strategy for generating arbitrary tasks.
fn arb_task() -> impl Strategy<Value = Task> {
    (
        "[a-zA-Z0-9-]{1,36}",
        "[^\x00]{1,128}",
        arb_status(),
        arb_due_date(),
        prop::option::of("[a-z0-9]{1,8}"),
        0i64..4_000_000_000,
    )
        .prop_map(|(id, title, status, due_date, list, created)| Task {
            id: TaskId::new(id),
            title,
            description: None,
            status,
            due_date,
            list_id: list.map(ListId::new),
            moved_to_my_day: None,
            moved_date: None,
            created_at: Utc.timestamp_opt(created, 0).single().unwrap_or_default(),
            updated_at: None,
        })
}

proptest! {
    #[test]
    fn decode_payload_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = decode_payload::<Vec<Task>>(&bytes);
        let _ = decode_payload::<Task>(&bytes);
    }

    #[test]
    fn decode_credential_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = decode_credential(&bytes);
    }

    #[test]
    fn envelope_shape_is_transparent(task in arb_task()) {
        let bare = serde_json::to_vec(&task).unwrap();
        let wrapped = serde_json::to_vec(&serde_json::json!({ "data": &task })).unwrap();
        let from_bare: Task = decode_payload(&bare).unwrap();
        let from_wrapped: Task = decode_payload(&wrapped).unwrap();
        prop_assert_eq!(&from_bare, &task);
        prop_assert_eq!(from_bare, from_wrapped);
    }

    #[test]
    fn numeric_ids_decode_as_decimal(n in any::<u64>()) {
        let id: TaskId = serde_json::from_str(&n.to_string()).unwrap();
        prop_assert_eq!(id.as_str(), n.to_string());
    }
}
