use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::database::{
    models::{
        Entry, EntryFilter, EntryWithUser, Hours, NewEntry, PriorDay, ReconciliationPlan,
    },
    utils::placeholders,
};

const ENTRY_COLUMNS: &str = r#"
    id,
    user_id,
    total_hours,
    start_date,
    end_date,
    details,
    add_date,
    modify_date
"#;

const ENTRY_WITH_USER_SELECT: &str = r#"
    SELECT
        e.id,
        e.user_id,
        e.total_hours,
        e.start_date,
        e.end_date,
        e.details,
        e.add_date,
        e.modify_date,
        u.username,
        u.email,
        u.first_name,
        u.last_name
    FROM
        entries e
        INNER JOIN users u ON u.id = e.user_id
"#;

#[derive(Clone)]
pub struct EntryRepository {
    pool: SqlitePool,
}

impl EntryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: &NewEntry) -> Result<Entry> {
        let now = Utc::now();
        let entry = sqlx::query_as::<_, Entry>(&format!(
            r#"
            INSERT INTO
                entries (
                    user_id,
                    total_hours,
                    start_date,
                    end_date,
                    details,
                    add_date,
                    modify_date
                )
            VALUES
                (?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        ))
        .bind(input.user_id)
        .bind(input.total_hours)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(&input.details)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(entry)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Entry>> {
        let entry = sqlx::query_as::<_, Entry>(&format!(
            "SELECT {} FROM entries WHERE id = ?",
            ENTRY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Drop the user's entries that never got hours, optionally sparing one.
    pub async fn delete_unfinished(&self, user_id: i64, keep: Option<i64>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM entries
            WHERE user_id = ?
              AND total_hours IS NULL
              AND (? IS NULL OR id != ?)
            "#,
        )
        .bind(user_id)
        .bind(keep)
        .bind(keep)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn hours_for_entry(&self, entry_id: i64) -> Result<Vec<Hours>> {
        let hours = sqlx::query_as::<_, Hours>(
            r#"
            SELECT id, entry_id, hours, date, birthday
            FROM hours
            WHERE entry_id = ?
            ORDER BY date, id
            "#,
        )
        .bind(entry_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(hours)
    }

    /// Hours rows of many entries, grouped by entry id.
    pub async fn hours_for_entries(&self, entry_ids: &[i64]) -> Result<HashMap<i64, Vec<Hours>>> {
        let mut grouped: HashMap<i64, Vec<Hours>> = HashMap::new();
        if entry_ids.is_empty() {
            return Ok(grouped);
        }

        let sql = format!(
            r#"
            SELECT id, entry_id, hours, date, birthday
            FROM hours
            WHERE entry_id IN ({})
            ORDER BY date, id
            "#,
            placeholders(entry_ids.len())
        );
        let mut query = sqlx::query_as::<_, Hours>(&sql);
        for id in entry_ids {
            query = query.bind(id);
        }

        for row in query.fetch_all(&self.pool).await? {
            grouped.entry(row.entry_id).or_default().push(row);
        }

        Ok(grouped)
    }

    /// Net recorded hours per date for one user, across all their entries.
    /// Dates without any Hours rows are absent from the map.
    pub async fn prior_days(
        &self,
        user_id: i64,
        dates: &[NaiveDate],
    ) -> Result<HashMap<NaiveDate, PriorDay>> {
        let mut prior = HashMap::new();
        if dates.is_empty() {
            return Ok(prior);
        }

        let sql = format!(
            r#"
            SELECT h.date, SUM(h.hours)
            FROM hours h
                INNER JOIN entries e ON e.id = h.entry_id
            WHERE e.user_id = ? AND h.date IN ({})
            GROUP BY h.date
            "#,
            placeholders(dates.len())
        );
        let mut query = sqlx::query_as::<_, (NaiveDate, i64)>(&sql).bind(user_id);
        for date in dates {
            query = query.bind(date);
        }
        let sums = query.fetch_all(&self.pool).await?;

        for (date, net) in sums {
            // Details of the latest entry that put positive hours on this date
            let details = sqlx::query_scalar::<_, String>(
                r#"
                SELECT e.details
                FROM hours h
                    INNER JOIN entries e ON e.id = h.entry_id
                WHERE e.user_id = ? AND h.date = ? AND h.hours > 0
                ORDER BY e.add_date DESC, e.id DESC
                LIMIT 1
                "#,
            )
            .bind(user_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?
            .unwrap_or_default();

            prior.insert(
                date,
                PriorDay {
                    net_hours: i32::try_from(net)?,
                    details,
                },
            );
        }

        Ok(prior)
    }

    /// Whether another finished entry of the user spans `date`.
    pub async fn date_covered_by_other_finished(
        &self,
        user_id: i64,
        date: NaiveDate,
        exclude_entry_id: i64,
    ) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM entries
            WHERE user_id = ?
              AND id != ?
              AND total_hours IS NOT NULL
              AND start_date <= ?
              AND end_date >= ?
            "#,
        )
        .bind(user_id)
        .bind(exclude_entry_id)
        .bind(date)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Write compensations, allocations and the new total in one transaction.
    pub async fn apply_reconciliation(
        &self,
        entry: &Entry,
        plan: &ReconciliationPlan,
    ) -> Result<Entry> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        for compensation in &plan.compensations {
            let reverse_id = sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO
                    entries (
                        user_id,
                        total_hours,
                        start_date,
                        end_date,
                        details,
                        add_date,
                        modify_date
                    )
                VALUES
                    (?, ?, ?, ?, ?, ?, ?)
                RETURNING id
                "#,
            )
            .bind(entry.user_id)
            .bind(compensation.hours)
            .bind(compensation.date)
            .bind(compensation.date)
            .bind(&compensation.details)
            .bind(now)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query("INSERT INTO hours (entry_id, hours, date, birthday) VALUES (?, ?, ?, 0)")
                .bind(reverse_id)
                .bind(compensation.hours)
                .bind(compensation.date)
                .execute(&mut *tx)
                .await?;
        }

        for allocation in &plan.allocations {
            sqlx::query("INSERT INTO hours (entry_id, hours, date, birthday) VALUES (?, ?, ?, ?)")
                .bind(entry.id)
                .bind(allocation.hours)
                .bind(allocation.date)
                .bind(allocation.birthday)
                .execute(&mut *tx)
                .await?;
        }

        let updated = sqlx::query_as::<_, Entry>(&format!(
            r#"
            UPDATE entries
            SET
                total_hours = ?,
                modify_date = ?
            WHERE
                id = ?
            RETURNING {}
            "#,
            ENTRY_COLUMNS
        ))
        .bind(plan.total_hours)
        .bind(now)
        .bind(entry.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(updated)
    }

    /// Non-negative finished entries of `user_ids` overlapping `[start, end]`.
    pub async fn overlapping(
        &self,
        user_ids: &[i64],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<EntryWithUser>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(ENTRY_WITH_USER_SELECT);
        builder.push(" WHERE e.total_hours IS NOT NULL AND e.total_hours >= 0");
        push_user_filter(&mut builder, user_ids);
        builder.push(" AND e.end_date >= ").push_bind(start);
        builder.push(" AND e.start_date <= ").push_bind(end);
        builder.push(" ORDER BY e.start_date, e.id");

        Ok(builder
            .build_query_as::<EntryWithUser>()
            .fetch_all(&self.pool)
            .await?)
    }

    /// Non-negative finished entries of `user_ids` that end on or after `day`.
    pub async fn ending_on_or_after(
        &self,
        user_ids: &[i64],
        day: NaiveDate,
    ) -> Result<Vec<EntryWithUser>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(ENTRY_WITH_USER_SELECT);
        builder.push(" WHERE e.total_hours IS NOT NULL AND e.total_hours >= 0");
        push_user_filter(&mut builder, user_ids);
        builder.push(" AND e.end_date >= ").push_bind(day);
        builder.push(" ORDER BY e.start_date, e.id");

        Ok(builder
            .build_query_as::<EntryWithUser>()
            .fetch_all(&self.pool)
            .await?)
    }

    /// Finished entries matching the list filters, oldest filed first.
    pub async fn filtered(&self, filter: &EntryFilter) -> Result<Vec<EntryWithUser>> {
        let mut builder = QueryBuilder::<Sqlite>::new(ENTRY_WITH_USER_SELECT);
        builder.push(" WHERE e.total_hours IS NOT NULL");

        if let Some(date_from) = filter.date_from {
            builder.push(" AND e.end_date >= ").push_bind(date_from);
        }
        if let Some(date_to) = filter.date_to {
            builder.push(" AND e.start_date <= ").push_bind(date_to);
        }
        if let Some(filed_from) = filter.date_filed_from {
            builder.push(" AND date(e.add_date) >= ").push_bind(filed_from);
        }
        if let Some(filed_to) = filter.date_filed_to {
            builder.push(" AND date(e.add_date) <= ").push_bind(filed_to);
        }
        if let Some(user_ids) = &filter.user_ids {
            if user_ids.is_empty() {
                return Ok(Vec::new());
            }
            push_user_filter(&mut builder, user_ids);
        }
        builder.push(" ORDER BY e.add_date, e.id");

        Ok(builder
            .build_query_as::<EntryWithUser>()
            .fetch_all(&self.pool)
            .await?)
    }

    /// Earliest start, latest end and earliest filing across all entries.
    pub async fn bounds(
        &self,
    ) -> Result<(Option<NaiveDate>, Option<NaiveDate>, Option<DateTime<Utc>>)> {
        let first_date = sqlx::query_scalar::<_, NaiveDate>(
            "SELECT start_date FROM entries ORDER BY start_date LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        let last_date = sqlx::query_scalar::<_, NaiveDate>(
            "SELECT end_date FROM entries ORDER BY end_date DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        let first_filed = sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT add_date FROM entries ORDER BY add_date LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok((first_date, last_date, first_filed))
    }

    /// Sum of `total_hours` for entries inside `[year_start, next_year_start)`.
    pub async fn taken_hours(
        &self,
        user_id: i64,
        year_start: NaiveDate,
        next_year_start: NaiveDate,
    ) -> Result<i64> {
        let total = sqlx::query_scalar::<_, Option<i64>>(
            r#"
            SELECT SUM(total_hours)
            FROM entries
            WHERE user_id = ?
              AND start_date >= ?
              AND end_date < ?
            "#,
        )
        .bind(user_id)
        .bind(year_start)
        .bind(next_year_start)
        .fetch_one(&self.pool)
        .await?;

        Ok(total.unwrap_or(0))
    }

    /// Everyone's non-negative entries spanning `day`, by owner name.
    pub async fn spanning(&self, day: NaiveDate) -> Result<Vec<EntryWithUser>> {
        let mut builder = QueryBuilder::<Sqlite>::new(ENTRY_WITH_USER_SELECT);
        builder.push(" WHERE e.total_hours >= 0");
        builder.push(" AND e.start_date <= ").push_bind(day);
        builder.push(" AND e.end_date >= ").push_bind(day);
        builder.push(" ORDER BY u.first_name, u.last_name, u.username, e.id");

        Ok(builder
            .build_query_as::<EntryWithUser>()
            .fetch_all(&self.pool)
            .await?)
    }

    /// Everyone's non-negative entries starting strictly between the dates.
    pub async fn starting_between(
        &self,
        after: NaiveDate,
        before: NaiveDate,
    ) -> Result<Vec<EntryWithUser>> {
        let mut builder = QueryBuilder::<Sqlite>::new(ENTRY_WITH_USER_SELECT);
        builder.push(" WHERE e.total_hours >= 0");
        builder.push(" AND e.start_date > ").push_bind(after);
        builder.push(" AND e.start_date < ").push_bind(before);
        builder.push(" ORDER BY u.first_name, u.last_name, u.username, e.id");

        Ok(builder
            .build_query_as::<EntryWithUser>()
            .fetch_all(&self.pool)
            .await?)
    }

    /// Start dates shared by more than one of the user's entries, most
    /// crowded first.
    pub async fn repeated_start_dates(
        &self,
        user_id: i64,
        since: Option<NaiveDate>,
    ) -> Result<Vec<(NaiveDate, i64)>> {
        let rows = sqlx::query_as::<_, (NaiveDate, i64)>(
            r#"
            SELECT start_date, COUNT(*) AS n
            FROM entries
            WHERE user_id = ?
              AND (? IS NULL OR start_date >= ?)
            GROUP BY start_date
            HAVING COUNT(*) > 1
            ORDER BY n DESC, start_date
            "#,
        )
        .bind(user_id)
        .bind(since)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn starting_on(&self, user_id: i64, day: NaiveDate) -> Result<Vec<Entry>> {
        let entries = sqlx::query_as::<_, Entry>(&format!(
            "SELECT {} FROM entries WHERE user_id = ? AND start_date = ? ORDER BY id",
            ENTRY_COLUMNS
        ))
        .bind(user_id)
        .bind(day)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

fn push_user_filter(builder: &mut QueryBuilder<'_, Sqlite>, user_ids: &[i64]) {
    builder.push(" AND e.user_id IN (");
    let mut separated = builder.separated(", ");
    for id in user_ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}
