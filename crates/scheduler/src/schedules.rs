// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of schedules

use crate::error::SchedulerError;
use crate::processes::ProcessRegistry;
use crate::store::{RowReader, Store};
use fledge_core::{IdGen, Schedule, ScheduleId, ScheduleKind, ScheduleType, ScheduleUpdate};
use fledge_storage::{Op, Payload, Row, SortDirection, StorageClient};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

pub(crate) const TABLE: &str = "schedules";

pub(crate) struct ScheduleRegistry<S, I> {
    store: Store<S>,
    processes: ProcessRegistry<S>,
    ids: I,
    /// Serializes the name check with the write it guards
    writes: Arc<Mutex<()>>,
}

impl<S: StorageClient, I: IdGen> ScheduleRegistry<S, I> {
    pub(crate) fn new(store: Store<S>, processes: ProcessRegistry<S>, ids: I) -> Self {
        Self {
            store,
            processes,
            ids,
            writes: Arc::new(Mutex::new(())),
        }
    }

    /// Validate and persist a new schedule, assigning its id
    pub(crate) async fn create(&self, schedule: Schedule) -> Result<Schedule, SchedulerError> {
        let _guard = self.writes.lock().await;
        self.check(&schedule, None).await?;
        let schedule = Schedule {
            id: Some(ScheduleId(self.ids.next())),
            ..schedule
        };
        self.store.insert(TABLE, encode(&schedule)).await?;
        tracing::info!(
            schedule = %schedule.name,
            schedule_id = %display_id(&schedule),
            kind = %schedule.schedule_type(),
            "created schedule"
        );
        Ok(schedule)
    }

    pub(crate) async fn update(
        &self,
        id: ScheduleId,
        update: &ScheduleUpdate,
    ) -> Result<Schedule, SchedulerError> {
        let _guard = self.writes.lock().await;
        let current = self.get(id).await?;
        let updated = update.apply(&current);
        self.check(&updated, Some(id)).await?;
        self.write(id, &updated).await?;
        tracing::info!(schedule = %updated.name, schedule_id = %id, "updated schedule");
        Ok(updated)
    }

    pub(crate) async fn enable(&self, id: ScheduleId) -> Result<(bool, String), SchedulerError> {
        self.set_enabled(id, true).await
    }

    pub(crate) async fn disable(&self, id: ScheduleId) -> Result<(bool, String), SchedulerError> {
        self.set_enabled(id, false).await
    }

    async fn set_enabled(
        &self,
        id: ScheduleId,
        enabled: bool,
    ) -> Result<(bool, String), SchedulerError> {
        let schedule = self.get(id).await?;
        let verb = if enabled { "enabled" } else { "disabled" };
        if schedule.enabled == enabled {
            return Ok((true, format!("Schedule {} already {}", schedule.name, verb)));
        }
        let mut values = Row::new();
        values.insert("enabled".into(), Value::from(enabled));
        self.store.update(TABLE, values, &by_id(id)).await?;
        tracing::info!(schedule = %schedule.name, schedule_id = %id, "schedule {}", verb);
        Ok((true, format!("Schedule {} successfully {}", schedule.name, verb)))
    }

    pub(crate) async fn delete(&self, id: ScheduleId) -> Result<(bool, String), SchedulerError> {
        let schedule = self.get(id).await?;
        self.store.delete(TABLE, &by_id(id)).await?;
        tracing::info!(schedule = %schedule.name, schedule_id = %id, "deleted schedule");
        Ok((true, format!("Schedule {} successfully deleted", schedule.name)))
    }

    pub(crate) async fn find(&self, id: ScheduleId) -> Result<Option<Schedule>, SchedulerError> {
        let rows = self.store.query(TABLE, &by_id(id).limit(1)).await?;
        rows.first().map(decode).transpose()
    }

    pub(crate) async fn get(&self, id: ScheduleId) -> Result<Schedule, SchedulerError> {
        self.find(id)
            .await?
            .ok_or_else(|| SchedulerError::ScheduleNotFound(id.to_string()))
    }

    pub(crate) async fn find_by_name(&self, name: &str) -> Result<Option<Schedule>, SchedulerError> {
        let rows = self
            .store
            .query(TABLE, &Payload::new().where_eq("schedule_name", name).limit(1))
            .await?;
        rows.first().map(decode).transpose()
    }

    /// All schedules ordered by id
    pub(crate) async fn get_all(&self) -> Result<Vec<Schedule>, SchedulerError> {
        self.query(&Payload::new().order_by("id", SortDirection::Asc))
            .await
    }

    pub(crate) async fn query(&self, payload: &Payload) -> Result<Vec<Schedule>, SchedulerError> {
        let rows = self.store.query(TABLE, payload).await?;
        rows.iter().map(decode).collect()
    }

    /// Validation shared by create and update; `own_id` excludes the
    /// schedule itself from the name uniqueness check
    async fn check(&self, schedule: &Schedule, own_id: Option<ScheduleId>) -> Result<(), SchedulerError> {
        schedule.validate()?;
        if self.processes.get(&schedule.process_name).await?.is_none() {
            return Err(SchedulerError::UnknownProcess(
                schedule.process_name.clone(),
            ));
        }
        let mut same_name = Payload::new().where_eq("schedule_name", schedule.name.as_str());
        if let Some(id) = own_id {
            same_name = same_name.and_where("id", Op::Ne, id.to_string());
        }
        if !self.store.query(TABLE, &same_name.limit(1)).await?.is_empty() {
            return Err(SchedulerError::DuplicateScheduleName(
                schedule.name.clone(),
            ));
        }
        Ok(())
    }

    async fn write(&self, id: ScheduleId, schedule: &Schedule) -> Result<(), SchedulerError> {
        let mut values = encode(schedule);
        values.remove("id");
        let updated = self.store.update(TABLE, values, &by_id(id)).await?;
        if updated == 0 {
            return Err(SchedulerError::ScheduleNotFound(id.to_string()));
        }
        Ok(())
    }
}

fn by_id(id: ScheduleId) -> Payload {
    Payload::new().where_eq("id", id.to_string())
}

fn display_id(schedule: &Schedule) -> String {
    schedule.id.map(|id| id.to_string()).unwrap_or_default()
}

fn encode(schedule: &Schedule) -> Row {
    let (time, day, interval) = match &schedule.kind {
        ScheduleKind::Timed { time, day } => (
            Value::from(time.seconds()),
            day.map(|d| Value::from(d.number())).unwrap_or(Value::Null),
            Value::Null,
        ),
        ScheduleKind::Interval { repeat } => (Value::Null, Value::Null, Value::from(repeat.as_secs_f64())),
        ScheduleKind::Startup | ScheduleKind::Manual => (Value::Null, Value::Null, Value::Null),
    };

    let mut row = Row::new();
    row.insert("id".into(), Value::from(display_id(schedule)));
    row.insert("schedule_name".into(), Value::from(schedule.name.clone()));
    row.insert("process_name".into(), Value::from(schedule.process_name.clone()));
    row.insert("schedule_type".into(), Value::from(schedule.schedule_type().code()));
    row.insert("schedule_time".into(), time);
    row.insert("schedule_day".into(), day);
    row.insert("schedule_interval".into(), interval);
    row.insert("exclusive".into(), Value::from(schedule.exclusive));
    row.insert("enabled".into(), Value::from(schedule.enabled));
    row
}

fn decode(row: &Row) -> Result<Schedule, SchedulerError> {
    let reader = RowReader::new(TABLE, row);
    let id: ScheduleId = reader
        .str("id")?
        .parse()
        .map_err(|e: fledge_core::InvalidId| reader.corrupt(e.to_string()))?;
    let schedule_type =
        ScheduleType::try_from(reader.int("schedule_type")?).map_err(|e| reader.corrupt(e.to_string()))?;
    let kind = ScheduleKind::from_parts(
        schedule_type,
        reader.opt_int("schedule_time")?,
        reader.opt_int("schedule_day")?,
        reader.opt_float("schedule_interval")?,
    )
    .map_err(|e| reader.corrupt(format!("schedule {}: {}", id, e)))?;

    Ok(Schedule {
        id: Some(id),
        name: reader.str("schedule_name")?.to_string(),
        process_name: reader.str("process_name")?.to_string(),
        kind,
        enabled: reader.bool("enabled")?,
        exclusive: reader.bool("exclusive")?,
    })
}

#[cfg(test)]
#[path = "schedules_tests.rs"]
mod tests;
