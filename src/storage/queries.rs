use super::models::*;
use super::schema::{contents, instances, location_history, name_history, scan_metadata};
use super::sqlite::Database;
use crate::error::Result;
use crate::model::{
    ContentId, ContentRecord, IdentityKey, InstanceId, InstanceRecord, LocationHistoryEntry,
    NameHistoryEntry, ScanMetadata,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use tracing::debug;

pub const SQLITE_MAX_PARAMETERS: usize = 32766;
const HISTORY_FIELD_COUNT: usize = 4;

impl Database {
    // ── Bulk load ────────────────────────────────────────────────

    pub fn load_contents(&mut self) -> Result<Vec<ContentRow>> {
        let rows = contents::table
            .order(contents::id)
            .select(ContentRow::as_select())
            .load(self.connection())?;
        Ok(rows)
    }

    pub fn load_instances(&mut self) -> Result<Vec<InstanceRow>> {
        let rows = instances::table
            .order(instances::id)
            .select(InstanceRow::as_select())
            .load(self.connection())?;
        Ok(rows)
    }

    /// All location history, grouped by instance and ordered oldest first.
    pub fn load_location_history(&mut self) -> Result<Vec<LocationHistoryRow>> {
        let rows = location_history::table
            .order((
                location_history::instance_id,
                location_history::change_noticed_time,
                location_history::id,
            ))
            .select(LocationHistoryRow::as_select())
            .load(self.connection())?;
        Ok(rows)
    }

    /// All name history, grouped by instance and ordered oldest first.
    pub fn load_name_history(&mut self) -> Result<Vec<NameHistoryRow>> {
        let rows = name_history::table
            .order((
                name_history::instance_id,
                name_history::change_noticed_time,
                name_history::id,
            ))
            .select(NameHistoryRow::as_select())
            .load(self.connection())?;
        Ok(rows)
    }

    // ── Flush ────────────────────────────────────────────────────

    /// Write one batch in a single transaction. Content and instance rows are
    /// upserted; history rows are append-only inserts.
    pub fn write_batch(&mut self, batch: &CommitBatch) -> Result<usize> {
        let written = self
            .connection()
            .transaction::<_, diesel::result::Error, _>(|conn| {
                for row in &batch.contents {
                    diesel::insert_into(contents::table)
                        .values(row)
                        .on_conflict(contents::id)
                        .do_update()
                        .set(row)
                        .execute(conn)?;
                }

                for row in &batch.instances {
                    diesel::insert_into(instances::table)
                        .values(row)
                        .on_conflict(instances::id)
                        .do_update()
                        .set(row)
                        .execute(conn)?;
                }

                let chunk_size = SQLITE_MAX_PARAMETERS / HISTORY_FIELD_COUNT;
                let mut history_rows = 0;
                for chunk in batch.locations.chunks(chunk_size) {
                    history_rows += diesel::insert_into(location_history::table)
                        .values(chunk)
                        .execute(conn)?;
                }
                for chunk in batch.names.chunks(chunk_size) {
                    history_rows += diesel::insert_into(name_history::table)
                        .values(chunk)
                        .execute(conn)?;
                }

                Ok(batch.contents.len() + batch.instances.len() + history_rows)
            })?;
        debug!(
            "Wrote batch: {} contents, {} instances, {} locations, {} names",
            batch.contents.len(),
            batch.instances.len(),
            batch.locations.len(),
            batch.names.len()
        );
        Ok(written)
    }

    // ── Scan metadata ────────────────────────────────────────────

    pub fn scan_metadata(&mut self) -> Result<ScanMetadata> {
        let row = scan_metadata::table
            .find(1)
            .select(ScanMetadataRow::as_select())
            .first(self.connection())
            .optional()?;
        Ok(row.map(ScanMetadata::from).unwrap_or_default())
    }

    pub fn record_scan_start(&mut self, started_at: DateTime<Utc>) -> Result<()> {
        let started_at = Some(to_naive(started_at));
        diesel::insert_into(scan_metadata::table)
            .values((
                scan_metadata::id.eq(1),
                scan_metadata::last_scan_start_time.eq(started_at),
                scan_metadata::last_scan_completed.eq(false),
            ))
            .on_conflict(scan_metadata::id)
            .do_update()
            .set((
                scan_metadata::last_scan_start_time.eq(started_at),
                scan_metadata::last_scan_completed.eq(false),
            ))
            .execute(self.connection())?;
        Ok(())
    }

    pub fn record_scan_completed(&mut self) -> Result<()> {
        diesel::insert_into(scan_metadata::table)
            .values((
                scan_metadata::id.eq(1),
                scan_metadata::last_scan_completed.eq(true),
            ))
            .on_conflict(scan_metadata::id)
            .do_update()
            .set(scan_metadata::last_scan_completed.eq(true))
            .execute(self.connection())?;
        Ok(())
    }

    // ── Lookups ──────────────────────────────────────────────────

    pub fn counts(&mut self) -> Result<StoreCounts> {
        let conn = self.connection();
        Ok(StoreCounts {
            contents: contents::table.count().get_result(conn)?,
            instances: instances::table.count().get_result(conn)?,
            location_entries: location_history::table.count().get_result(conn)?,
            name_entries: name_history::table.count().get_result(conn)?,
        })
    }

    pub fn content_by_id(&mut self, id: ContentId) -> Result<Option<ContentRecord>> {
        let row = contents::table
            .find(id)
            .select(ContentRow::as_select())
            .first(self.connection())
            .optional()?;
        Ok(row.map(ContentRecord::from))
    }

    pub fn content_by_hash(&mut self, hash: &str) -> Result<Option<ContentRecord>> {
        let row = contents::table
            .filter(contents::hash.eq(hash))
            .select(ContentRow::as_select())
            .first(self.connection())
            .optional()?;
        Ok(row.map(ContentRecord::from))
    }

    pub fn instance_history(
        &mut self,
        instance_id: InstanceId,
    ) -> Result<(Vec<LocationHistoryEntry>, Vec<NameHistoryEntry>)> {
        let locations = location_history::table
            .filter(location_history::instance_id.eq(instance_id))
            .order((location_history::change_noticed_time, location_history::id))
            .select(LocationHistoryRow::as_select())
            .load(self.connection())?;
        let names = name_history::table
            .filter(name_history::instance_id.eq(instance_id))
            .order((name_history::change_noticed_time, name_history::id))
            .select(NameHistoryRow::as_select())
            .load(self.connection())?;
        Ok((
            locations.into_iter().map(LocationHistoryEntry::from).collect(),
            names.into_iter().map(NameHistoryEntry::from).collect(),
        ))
    }

    pub fn find_instance(&mut self, key: &IdentityKey) -> Result<Option<InstanceRecord>> {
        let row = instances::table
            .filter(instances::volume_serial.eq(key.volume_serial as i64))
            .filter(instances::file_id.eq(key.file_id as i64))
            .select(InstanceRow::as_select())
            .first(self.connection())
            .optional()?;
        match row {
            Some(row) => {
                let (locations, names) = self.instance_history(row.id)?;
                Ok(Some(row.into_record(locations, names)))
            }
            None => Ok(None),
        }
    }

    /// Every instance currently holding `content_id`, oldest first.
    pub fn instances_with_content(&mut self, content_id: ContentId) -> Result<Vec<InstanceRecord>> {
        let rows = instances::table
            .filter(instances::content_id.eq(content_id))
            .order(instances::id)
            .select(InstanceRow::as_select())
            .load(self.connection())?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let (locations, names) = self.instance_history(row.id)?;
            records.push(row.into_record(locations, names));
        }
        Ok(records)
    }
}
