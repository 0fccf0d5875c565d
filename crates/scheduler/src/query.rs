// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lowering of typed queries into storage payloads

use fledge_core::{Column, Direction, Filter, Query, Value};
use fledge_storage::{Payload, SortDirection};

/// Translate a query; a missing limit becomes `default_limit`
pub(crate) fn lower<C: Column>(query: &Query<C>, default_limit: usize) -> Payload {
    let mut payload = Payload::new();

    if let Some(Filter::Eq { column, value }) = &query.filter {
        payload = payload.where_eq(column.name(), to_json(value));
    }

    for key in &query.sort {
        let direction = match key.direction {
            Direction::Asc => SortDirection::Asc,
            Direction::Desc => SortDirection::Desc,
        };
        payload = payload.order_by(key.column.name(), direction);
    }

    if let Some(offset) = query.offset {
        payload = payload.offset(offset);
    }
    payload.limit(query.limit.unwrap_or(default_limit))
}

fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::from(*b),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Value::from(*f),
        Value::Text(s) => serde_json::Value::from(s.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fledge_core::{ScheduleColumn, ScheduleQuery, TaskColumn, TaskQuery, TaskState};
    use fledge_storage::{Condition, Op, Sort};

    #[test]
    fn empty_query_gets_default_limit() {
        let payload = lower(&TaskQuery::new(), 100);
        assert_eq!(payload, Payload::new().limit(100));
    }

    #[test]
    fn all_parts_are_lowered() {
        let query = TaskQuery::new()
            .filter_eq(TaskColumn::State, TaskState::Complete)
            .sort(TaskColumn::State, Direction::Desc)
            .sort(TaskColumn::ProcessName, Direction::Asc)
            .offset(3)
            .limit(7);
        let payload = lower(&query, 100);

        assert_eq!(
            payload.conditions,
            vec![Condition {
                column: "state".to_string(),
                op: Op::Eq,
                value: serde_json::json!(2),
            }]
        );
        assert_eq!(
            payload.sort,
            vec![
                Sort {
                    column: "state".to_string(),
                    direction: SortDirection::Desc
                },
                Sort {
                    column: "process_name".to_string(),
                    direction: SortDirection::Asc
                },
            ]
        );
        assert_eq!(payload.offset, Some(3));
        assert_eq!(payload.limit, Some(7));
    }

    #[test]
    fn schedule_columns_use_storage_names() {
        let query = ScheduleQuery::new().filter_eq(ScheduleColumn::Name, "purge");
        let payload = lower(&query, 10);
        assert_eq!(payload.conditions[0].column, "schedule_name");
        assert_eq!(payload.conditions[0].value, serde_json::json!("purge"));
    }
}
