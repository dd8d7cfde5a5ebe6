//! [`SqliteStore`], the SQLite implementation of the `beacon-core` store
//! traits.

use std::{collections::HashMap, path::Path};

use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use beacon_core::{
  membership::{CouponIncrement, Membership},
  scope::ScopeKey,
  store::{MembershipStore, SubjectStore, TenantDirectory},
  subject::Subject,
};

use crate::{
  Error, Result,
  encode::{
    MEMBERSHIP_COLUMNS, RawMembership, RawSubject, SUBJECT_COLUMNS, encode_date, encode_dt,
    encode_preferences, encode_uuid,
  },
  schema::SCHEMA,
};

/// Upper bound on bound parameters in a single `IN (...)` list.
const IN_CHUNK: usize = 500;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A subject, membership and tenant store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Seeding ───────────────────────────────────────────────────────────────

  /// Insert or replace a subject record.
  pub async fn insert_subject(&self, subject: &Subject) -> Result<()> {
    let id_str      = encode_uuid(subject.subject_id);
    let at_str      = encode_dt(subject.created_at);
    let email       = subject.email.clone();
    let phone       = subject.phone.clone();
    let first_name  = subject.first_name.clone();
    let last_name   = subject.last_name.clone();
    let birthday    = subject.birthday.map(encode_date);
    let preferences = encode_preferences(&subject.preferences)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO subjects (
             subject_id, created_at, email, phone,
             first_name, last_name, birthday, preferences
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            id_str, at_str, email, phone, first_name, last_name, birthday, preferences,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert a membership or overwrite every counter of an existing one.
  pub async fn upsert_membership(&self, m: &Membership) -> Result<()> {
    let subject_id  = encode_uuid(m.subject_id);
    let business_id = m.business_id.clone();
    let brand_id    = m.brand_id.clone();
    let counters    = (m.valid_stamps, m.total_stamps, m.token_balance, m.valid_coupons, m.total_coupons);
    let last_at     = m.last_activity_at.map(encode_dt);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO memberships (
             subject_id, business_id, brand_id, valid_stamps, total_stamps,
             token_balance, valid_coupons, total_coupons, last_activity_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
           ON CONFLICT (subject_id, business_id) DO UPDATE SET
             brand_id         = excluded.brand_id,
             valid_stamps     = excluded.valid_stamps,
             total_stamps     = excluded.total_stamps,
             token_balance    = excluded.token_balance,
             valid_coupons    = excluded.valid_coupons,
             total_coupons    = excluded.total_coupons,
             last_activity_at = excluded.last_activity_at",
          rusqlite::params![
            subject_id,
            business_id,
            brand_id,
            counters.0,
            counters.1,
            counters.2,
            counters.3,
            counters.4,
            last_at,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Record that `brand_id` belongs to `business_id`.
  pub async fn map_brand(&self, brand_id: &str, business_id: &str) -> Result<()> {
    let brand_id    = brand_id.to_owned();
    let business_id = business_id.to_owned();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO brands (brand_id, business_id) VALUES (?1, ?2)
           ON CONFLICT (brand_id) DO UPDATE SET business_id = excluded.business_id",
          rusqlite::params![brand_id, business_id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Helpers ───────────────────────────────────────────────────────────────

  /// Memberships of `subject_ids` in `scope`, at most one per subject.
  async fn query_memberships(
    &self,
    scope:       &ScopeKey,
    subject_ids: &[Uuid],
  ) -> Result<Vec<Membership>> {
    if subject_ids.is_empty() {
      return Ok(Vec::new());
    }

    let column   = scope_column(scope);
    let scope_id = scope.id().to_owned();
    let ids: Vec<String> = subject_ids.iter().copied().map(encode_uuid).collect();

    let raws: Vec<RawMembership> = self
      .conn
      .call(move |conn| {
        let mut rows = Vec::new();
        for chunk in ids.chunks(IN_CHUNK) {
          let placeholders = vec!["?"; chunk.len()].join(", ");
          let sql = format!(
            "SELECT {MEMBERSHIP_COLUMNS}
             FROM memberships
             WHERE {column} = ? AND subject_id IN ({placeholders})"
          );
          let params = std::iter::once(&scope_id).chain(chunk.iter());
          let mut stmt = conn.prepare(&sql)?;
          let batch = stmt
            .query_map(rusqlite::params_from_iter(params), RawMembership::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          rows.extend(batch);
        }
        Ok(rows)
      })
      .await?;

    let memberships = raws
      .into_iter()
      .map(RawMembership::into_membership)
      .collect::<Result<Vec<_>>>()?;
    Ok(most_recent_per_subject(memberships))
  }
}

fn scope_column(scope: &ScopeKey) -> &'static str {
  match scope {
    ScopeKey::Business(_) => "business_id",
    ScopeKey::Brand(_) => "brand_id",
  }
}

/// Collapse brand-scoped results to one membership per subject: the one with
/// the latest activity, ties broken by business id.
fn most_recent_per_subject(memberships: Vec<Membership>) -> Vec<Membership> {
  let mut by_subject: HashMap<Uuid, Membership> = HashMap::new();
  for m in memberships {
    let keep_current = by_subject.get(&m.subject_id).is_some_and(|current| {
      (current.last_activity_at, &current.business_id) >= (m.last_activity_at, &m.business_id)
    });
    if !keep_current {
      by_subject.insert(m.subject_id, m);
    }
  }
  by_subject.into_values().collect()
}

// ─── SubjectStore impl ───────────────────────────────────────────────────────

impl SubjectStore for SqliteStore {
  type Error = Error;

  async fn list_candidates<'a>(
    &'a self,
    scope: Option<&'a ScopeKey>,
    limit: usize,
  ) -> Result<Vec<Subject>> {
    let filter    = scope.map(|k| (scope_column(k), k.id().to_owned()));
    let limit_val = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawSubject> = self
      .conn
      .call(move |conn| {
        let rows = if let Some((column, scope_id)) = filter {
          let sql = format!(
            "SELECT {SUBJECT_COLUMNS}
             FROM subjects s
             WHERE EXISTS (
               SELECT 1 FROM memberships m
               WHERE m.subject_id = s.subject_id AND m.{column} = ?1
             )
             ORDER BY s.created_at DESC, s.subject_id
             LIMIT ?2"
          );
          let mut stmt = conn.prepare(&sql)?;
          stmt
            .query_map(rusqlite::params![scope_id, limit_val], RawSubject::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let sql = format!(
            "SELECT {SUBJECT_COLUMNS}
             FROM subjects s
             ORDER BY s.created_at DESC, s.subject_id
             LIMIT ?1"
          );
          let mut stmt = conn.prepare(&sql)?;
          stmt
            .query_map(rusqlite::params![limit_val], RawSubject::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubject::into_subject).collect()
  }
}

// ─── MembershipStore impl ────────────────────────────────────────────────────

impl MembershipStore for SqliteStore {
  type Error = Error;

  async fn memberships_for<'a>(
    &'a self,
    scope:       &'a ScopeKey,
    subject_ids: &'a [Uuid],
  ) -> Result<Vec<Membership>> {
    self.query_memberships(scope, subject_ids).await
  }

  async fn get_membership<'a>(
    &'a self,
    scope:      &'a ScopeKey,
    subject_id: Uuid,
  ) -> Result<Option<Membership>> {
    Ok(self.query_memberships(scope, &[subject_id]).await?.pop())
  }

  async fn increment_coupons<'a>(
    &'a self,
    business_id: &'a str,
    subject_id:  Uuid,
    increment:   CouponIncrement,
  ) -> Result<Membership> {
    let subject_str  = encode_uuid(subject_id);
    let business_str = business_id.to_owned();

    // A single relative UPSERT: concurrent increments cannot lose updates.
    let raw: Option<RawMembership> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let exists = tx
          .query_row(
            "SELECT 1 FROM subjects WHERE subject_id = ?1",
            rusqlite::params![subject_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !exists {
          return Ok(None);
        }

        let sql = format!(
          "INSERT INTO memberships (subject_id, business_id, brand_id, valid_coupons, total_coupons)
           VALUES (?1, ?2, (SELECT brand_id FROM brands WHERE business_id = ?2 ORDER BY brand_id LIMIT 1), ?3, ?4)
           ON CONFLICT (subject_id, business_id) DO UPDATE SET
             valid_coupons = valid_coupons + excluded.valid_coupons,
             total_coupons = total_coupons + excluded.total_coupons
           RETURNING {MEMBERSHIP_COLUMNS}"
        );
        let raw = tx.query_row(
          &sql,
          rusqlite::params![
            subject_str,
            business_str,
            increment.valid_delta,
            increment.total_delta,
          ],
          RawMembership::from_row,
        )?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    raw
      .ok_or(Error::SubjectNotFound(subject_id))?
      .into_membership()
  }
}

// ─── TenantDirectory impl ────────────────────────────────────────────────────

impl TenantDirectory for SqliteStore {
  type Error = Error;

  async fn resolve_business_for_brand<'a>(
    &'a self,
    brand_id: &'a str,
  ) -> Result<Option<String>> {
    let brand_id = brand_id.to_owned();

    let business: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT business_id FROM brands WHERE brand_id = ?1",
            rusqlite::params![brand_id],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;

    Ok(business)
  }
}
