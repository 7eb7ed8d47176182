//! # ef-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational
//! model and the `ef-core` domain models. JSON-shaped columns (options,
//! rows, columns, answer values, settings) are serialized with serde at
//! this boundary and schema-validated on the way back out.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use ef_core::error::AppError;
use ef_core::fields::FieldType;
use ef_core::models::{Form, FormField, FormResponse, FormStatus, ResponseAnswer};
use ef_core::traits::{FormFilter, FormRepo, FormStatistics};
use ef_core::value::StoredValue;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

pub struct SqliteFormRepo {
    pool: SqlitePool,
}

// Helpers for UUID conversion
fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

fn blob_to_uuid(blob: &[u8]) -> Uuid {
    Uuid::from_slice(blob).unwrap_or_default()
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS forms (
        id BLOB PRIMARY KEY,
        user_id BLOB NOT NULL,
        title TEXT NOT NULL,
        description TEXT,
        slug TEXT NOT NULL UNIQUE,
        settings TEXT NOT NULL DEFAULT '{}',
        status TEXT NOT NULL DEFAULT 'draft',
        is_public INTEGER NOT NULL DEFAULT 1,
        accept_responses INTEGER NOT NULL DEFAULT 1,
        show_progress_bar INTEGER NOT NULL DEFAULT 0,
        shuffle_questions INTEGER NOT NULL DEFAULT 0,
        limit_responses INTEGER NOT NULL DEFAULT 0,
        max_responses INTEGER,
        require_login INTEGER NOT NULL DEFAULT 0,
        custom_thank_you_message TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_forms_user_status ON forms (user_id, status)",
    "CREATE TABLE IF NOT EXISTS form_fields (
        id BLOB PRIMARY KEY,
        form_id BLOB NOT NULL REFERENCES forms(id) ON DELETE CASCADE,
        type TEXT NOT NULL,
        label TEXT NOT NULL,
        placeholder TEXT,
        help_text TEXT,
        options TEXT,
        rows TEXT,
        columns TEXT,
        validation_rules TEXT NOT NULL DEFAULT 'null',
        is_required INTEGER NOT NULL DEFAULT 0,
        \"order\" INTEGER NOT NULL DEFAULT 0,
        conditional_logic TEXT NOT NULL DEFAULT 'null',
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_fields_form_order ON form_fields (form_id, \"order\")",
    "CREATE TABLE IF NOT EXISTS form_responses (
        id BLOB PRIMARY KEY,
        form_id BLOB NOT NULL REFERENCES forms(id) ON DELETE CASCADE,
        user_id BLOB,
        ip_address TEXT NOT NULL,
        user_agent TEXT NOT NULL,
        submitted_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_responses_form ON form_responses (form_id, submitted_at)",
    "CREATE TABLE IF NOT EXISTS response_answers (
        id BLOB PRIMARY KEY,
        response_id BLOB NOT NULL REFERENCES form_responses(id) ON DELETE CASCADE,
        field_id BLOB NOT NULL REFERENCES form_fields(id) ON DELETE CASCADE,
        value TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_answers_response_field ON response_answers (response_id, field_id)",
];

impl SqliteFormRepo {
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        let repo = Self { pool };
        repo.init_schema().await?;
        Ok(repo)
    }

    /// A single-connection in-memory database for tests. One connection,
    /// because every SQLite `:memory:` connection is its own database.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let repo = Self { pool };
        repo.init_schema().await?;
        Ok(repo)
    }

    async fn init_schema(&self) -> anyhow::Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn json_to_string(value: &serde_json::Value) -> anyhow::Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn string_list_to_json(list: &Option<Vec<String>>) -> anyhow::Result<Option<String>> {
    list.as_ref().map(|l| Ok(serde_json::to_string(l)?)).transpose()
}

/// Deserializes a stored string-list column, refusing malformed data
/// instead of silently accepting it.
fn string_list_from_json(
    column: &str,
    raw: Option<String>,
) -> anyhow::Result<Option<Vec<String>>> {
    raw.map(|s| {
        serde_json::from_str::<Vec<String>>(&s).map_err(|e| {
            anyhow::Error::new(AppError::InvalidFieldConfiguration(format!(
                "stored {column} is not a list of strings: {e}"
            )))
        })
    })
    .transpose()
}

fn row_to_form(row: &SqliteRow) -> anyhow::Result<Form> {
    let status: String = row.try_get("status")?;
    let settings: String = row.try_get("settings")?;
    Ok(Form {
        id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("id")?),
        user_id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("user_id")?),
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        slug: row.try_get("slug")?,
        settings: serde_json::from_str(&settings).unwrap_or_default(),
        status: FormStatus::parse(&status)?,
        is_public: row.try_get("is_public")?,
        accept_responses: row.try_get("accept_responses")?,
        show_progress_bar: row.try_get("show_progress_bar")?,
        shuffle_questions: row.try_get("shuffle_questions")?,
        limit_responses: row.try_get("limit_responses")?,
        max_responses: row.try_get("max_responses")?,
        require_login: row.try_get("require_login")?,
        custom_thank_you_message: row.try_get("custom_thank_you_message")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_field(row: &SqliteRow) -> anyhow::Result<FormField> {
    let field_type: String = row.try_get("type")?;
    let validation_rules: String = row.try_get("validation_rules")?;
    let conditional_logic: String = row.try_get("conditional_logic")?;
    Ok(FormField {
        id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("id")?),
        form_id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("form_id")?),
        field_type: FieldType::from_str(&field_type)?,
        label: row.try_get("label")?,
        placeholder: row.try_get("placeholder")?,
        help_text: row.try_get("help_text")?,
        options: string_list_from_json("options", row.try_get("options")?)?,
        rows: string_list_from_json("rows", row.try_get("rows")?)?,
        columns: string_list_from_json("columns", row.try_get("columns")?)?,
        validation_rules: serde_json::from_str(&validation_rules).unwrap_or_default(),
        is_required: row.try_get("is_required")?,
        order: row.try_get("order")?,
        conditional_logic: serde_json::from_str(&conditional_logic).unwrap_or_default(),
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_response(row: &SqliteRow) -> anyhow::Result<FormResponse> {
    let user_id: Option<Vec<u8>> = row.try_get("user_id")?;
    Ok(FormResponse {
        id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("id")?),
        form_id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("form_id")?),
        user_id: user_id.map(|b| blob_to_uuid(&b)),
        ip_address: row.try_get("ip_address")?,
        user_agent: row.try_get("user_agent")?,
        submitted_at: row.try_get("submitted_at")?,
    })
}

fn row_to_answer(row: &SqliteRow) -> anyhow::Result<ResponseAnswer> {
    let value: String = row.try_get("value")?;
    let value: StoredValue = serde_json::from_str(&value).map_err(|e| {
        anyhow::Error::new(AppError::InvalidFieldConfiguration(format!(
            "stored answer value has an unexpected shape: {e}"
        )))
    })?;
    Ok(ResponseAnswer {
        id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("id")?),
        response_id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("response_id")?),
        field_id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("field_id")?),
        value,
    })
}

async fn insert_field<'e, E>(executor: E, field: &FormField) -> anyhow::Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        "INSERT INTO form_fields (id, form_id, type, label, placeholder, help_text, options, rows, columns, validation_rules, is_required, \"order\", conditional_logic, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(uuid_to_blob(field.id))
    .bind(uuid_to_blob(field.form_id))
    .bind(field.field_type.as_str())
    .bind(&field.label)
    .bind(&field.placeholder)
    .bind(&field.help_text)
    .bind(string_list_to_json(&field.options)?)
    .bind(string_list_to_json(&field.rows)?)
    .bind(string_list_to_json(&field.columns)?)
    .bind(json_to_string(&field.validation_rules)?)
    .bind(field.is_required)
    .bind(field.order)
    .bind(json_to_string(&field.conditional_logic)?)
    .bind(field.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

async fn insert_form<'e, E>(executor: E, form: &Form) -> anyhow::Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        "INSERT INTO forms (id, user_id, title, description, slug, settings, status, is_public, accept_responses, show_progress_bar, shuffle_questions, limit_responses, max_responses, require_login, custom_thank_you_message, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(uuid_to_blob(form.id))
    .bind(uuid_to_blob(form.user_id))
    .bind(&form.title)
    .bind(&form.description)
    .bind(&form.slug)
    .bind(json_to_string(&form.settings)?)
    .bind(form.status.as_str())
    .bind(form.is_public)
    .bind(form.accept_responses)
    .bind(form.show_progress_bar)
    .bind(form.shuffle_questions)
    .bind(form.limit_responses)
    .bind(form.max_responses)
    .bind(form.require_login)
    .bind(&form.custom_thank_you_message)
    .bind(form.created_at)
    .bind(form.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl FormRepo for SqliteFormRepo {
    async fn create_form(&self, form: Form) -> anyhow::Result<()> {
        insert_form(&self.pool, &form).await
    }

    /// Atomic form+fields insert used by duplication.
    ///
    /// # Developer Note
    /// A transaction ensures we never leave a "shell form" behind if a
    /// field insert fails halfway through the copy.
    async fn create_form_with_fields(
        &self,
        form: Form,
        fields: Vec<FormField>,
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        insert_form(&mut *tx, &form).await?;
        for field in &fields {
            insert_field(&mut *tx, field).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_form(&self, id: Uuid) -> anyhow::Result<Option<Form>> {
        let row = sqlx::query("SELECT * FROM forms WHERE id = ?")
            .bind(uuid_to_blob(id))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_form).transpose()
    }

    async fn get_form_by_slug(&self, slug: &str) -> anyhow::Result<Option<Form>> {
        let row = sqlx::query("SELECT * FROM forms WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_form).transpose()
    }

    async fn list_forms(&self, owner: Uuid, filter: FormFilter) -> anyhow::Result<Vec<Form>> {
        let mut sql = String::from("SELECT * FROM forms WHERE user_id = ?");
        if filter.status.is_some() {
            sql.push_str(" AND status = ?");
        }
        if filter.search.is_some() {
            sql.push_str(" AND (title LIKE ? OR description LIKE ?)");
        }
        sql.push_str(" ORDER BY created_at DESC");

        let mut query = sqlx::query(&sql).bind(uuid_to_blob(owner));
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(search) = &filter.search {
            let pattern = format!("%{search}%");
            query = query.bind(pattern.clone()).bind(pattern);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_form).collect()
    }

    async fn update_form(&self, form: Form) -> anyhow::Result<()> {
        // The slug is immutable after creation, so it is not part of the
        // update set.
        sqlx::query(
            "UPDATE forms SET title = ?, description = ?, settings = ?, status = ?, is_public = ?, accept_responses = ?, show_progress_bar = ?, shuffle_questions = ?, limit_responses = ?, max_responses = ?, require_login = ?, custom_thank_you_message = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&form.title)
        .bind(&form.description)
        .bind(json_to_string(&form.settings)?)
        .bind(form.status.as_str())
        .bind(form.is_public)
        .bind(form.accept_responses)
        .bind(form.show_progress_bar)
        .bind(form.shuffle_questions)
        .bind(form.limit_responses)
        .bind(form.max_responses)
        .bind(form.require_login)
        .bind(&form.custom_thank_you_message)
        .bind(Utc::now())
        .bind(uuid_to_blob(form.id))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_form(&self, id: Uuid) -> anyhow::Result<()> {
        // Fields, responses, and answers go with it via ON DELETE CASCADE.
        sqlx::query("DELETE FROM forms WHERE id = ?")
            .bind(uuid_to_blob(id))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn statistics(
        &self,
        form_id: Uuid,
        now: DateTime<Utc>,
    ) -> anyhow::Result<FormStatistics> {
        let today = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        let week = now
            .date_naive()
            .week(Weekday::Mon)
            .first_day()
            .and_time(NaiveTime::MIN)
            .and_utc();
        let month = now
            .date_naive()
            .with_day(1)
            .unwrap_or(now.date_naive())
            .and_time(NaiveTime::MIN)
            .and_utc();

        let total = self.count_responses(form_id).await?;
        let mut since_counts = Vec::with_capacity(3);
        for since in [today, week, month] {
            let row = sqlx::query(
                "SELECT COUNT(*) AS cnt FROM form_responses WHERE form_id = ? AND submitted_at >= ?",
            )
            .bind(uuid_to_blob(form_id))
            .bind(since)
            .fetch_one(&self.pool)
            .await?;
            since_counts.push(row.try_get::<i64, _>("cnt")?);
        }

        Ok(FormStatistics {
            total_responses: total,
            responses_today: since_counts[0],
            responses_this_week: since_counts[1],
            responses_this_month: since_counts[2],
        })
    }

    async fn create_field(&self, field: FormField) -> anyhow::Result<()> {
        insert_field(&self.pool, &field).await
    }

    async fn get_field(&self, id: Uuid) -> anyhow::Result<Option<FormField>> {
        let row = sqlx::query("SELECT * FROM form_fields WHERE id = ?")
            .bind(uuid_to_blob(id))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_field).transpose()
    }

    async fn list_fields(&self, form_id: Uuid) -> anyhow::Result<Vec<FormField>> {
        let rows = sqlx::query(
            "SELECT * FROM form_fields WHERE form_id = ? ORDER BY \"order\" ASC, id ASC",
        )
        .bind(uuid_to_blob(form_id))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_field).collect()
    }

    async fn update_field(&self, field: FormField) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE form_fields SET type = ?, label = ?, placeholder = ?, help_text = ?, options = ?, rows = ?, columns = ?, validation_rules = ?, is_required = ?, \"order\" = ?, conditional_logic = ? WHERE id = ? AND form_id = ?",
        )
        .bind(field.field_type.as_str())
        .bind(&field.label)
        .bind(&field.placeholder)
        .bind(&field.help_text)
        .bind(string_list_to_json(&field.options)?)
        .bind(string_list_to_json(&field.rows)?)
        .bind(string_list_to_json(&field.columns)?)
        .bind(json_to_string(&field.validation_rules)?)
        .bind(field.is_required)
        .bind(field.order)
        .bind(json_to_string(&field.conditional_logic)?)
        .bind(uuid_to_blob(field.id))
        .bind(uuid_to_blob(field.form_id))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_field(&self, id: Uuid) -> anyhow::Result<()> {
        // Answers for the field cascade away with it.
        sqlx::query("DELETE FROM form_fields WHERE id = ?")
            .bind(uuid_to_blob(id))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Bulk order reassignment, all-or-nothing.
    async fn reorder_fields(&self, form_id: Uuid, orders: Vec<(Uuid, i32)>) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        for (field_id, order) in orders {
            let result = sqlx::query(
                "UPDATE form_fields SET \"order\" = ? WHERE id = ? AND form_id = ?",
            )
            .bind(order)
            .bind(uuid_to_blob(field_id))
            .bind(uuid_to_blob(form_id))
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() != 1 {
                // Rolls back the whole batch on drop.
                return Err(AppError::OwnershipViolation { field_id, form_id }.into());
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn count_responses(&self, form_id: Uuid) -> anyhow::Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM form_responses WHERE form_id = ?")
            .bind(uuid_to_blob(form_id))
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("cnt")?)
    }

    /// Atomic persistence of one response plus its answers.
    ///
    /// # Developer Note
    /// The response limit is re-checked inside the transaction: the
    /// engine's earlier `can_accept_responses` gate reads a count that
    /// may be stale by the time we insert, and SQLite's single writer
    /// makes this re-check the authoritative one.
    async fn create_response(
        &self,
        form: &Form,
        response: FormResponse,
        answers: Vec<ResponseAnswer>,
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        if form.limit_responses {
            let row = sqlx::query("SELECT COUNT(*) AS cnt FROM form_responses WHERE form_id = ?")
                .bind(uuid_to_blob(form.id))
                .fetch_one(&mut *tx)
                .await?;
            let count: i64 = row.try_get("cnt")?;
            if !form.can_accept_responses(count) {
                return Err(AppError::FormClosed.into());
            }
        }

        sqlx::query(
            "INSERT INTO form_responses (id, form_id, user_id, ip_address, user_agent, submitted_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(response.id))
        .bind(uuid_to_blob(response.form_id))
        .bind(response.user_id.map(uuid_to_blob))
        .bind(&response.ip_address)
        .bind(&response.user_agent)
        .bind(response.submitted_at)
        .execute(&mut *tx)
        .await?;

        for answer in &answers {
            sqlx::query(
                "INSERT INTO response_answers (id, response_id, field_id, value) VALUES (?, ?, ?, ?)",
            )
            .bind(uuid_to_blob(answer.id))
            .bind(uuid_to_blob(answer.response_id))
            .bind(uuid_to_blob(answer.field_id))
            .bind(serde_json::to_string(&answer.value)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_response(
        &self,
        id: Uuid,
    ) -> anyhow::Result<Option<(FormResponse, Vec<ResponseAnswer>)>> {
        let row = sqlx::query("SELECT * FROM form_responses WHERE id = ?")
            .bind(uuid_to_blob(id))
            .fetch_optional(&self.pool)
            .await?;
        let response = match row {
            Some(row) => row_to_response(&row)?,
            None => return Ok(None),
        };
        let answers = sqlx::query("SELECT * FROM response_answers WHERE response_id = ?")
            .bind(uuid_to_blob(id))
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(row_to_answer)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Some((response, answers)))
    }

    async fn list_responses(
        &self,
        form_id: Uuid,
    ) -> anyhow::Result<Vec<(FormResponse, Vec<ResponseAnswer>)>> {
        let rows = sqlx::query(
            "SELECT * FROM form_responses WHERE form_id = ? ORDER BY submitted_at DESC",
        )
        .bind(uuid_to_blob(form_id))
        .fetch_all(&self.pool)
        .await?;

        let mut result = Vec::with_capacity(rows.len());
        for row in &rows {
            let response = row_to_response(row)?;
            let answers = sqlx::query("SELECT * FROM response_answers WHERE response_id = ?")
                .bind(uuid_to_blob(response.id))
                .fetch_all(&self.pool)
                .await?
                .iter()
                .map(row_to_answer)
                .collect::<anyhow::Result<Vec<_>>>()?;
            result.push((response, answers));
        }
        Ok(result)
    }

    async fn delete_response(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM form_responses WHERE id = ?")
            .bind(uuid_to_blob(id))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ef_core::models::FieldDraft;

    fn draft(field_type: FieldType, label: &str, order: i32) -> FieldDraft {
        let options = match field_type {
            FieldType::Dropdown | FieldType::Radio | FieldType::Checkbox => {
                Some(vec!["A".to_string(), "B".to_string()])
            }
            _ => None,
        };
        FieldDraft {
            field_type,
            label: label.to_string(),
            placeholder: None,
            help_text: None,
            options,
            rows: None,
            columns: None,
            validation_rules: serde_json::Value::Null,
            is_required: false,
            order,
            conditional_logic: serde_json::Value::Null,
        }
    }

    async fn seeded_form(repo: &SqliteFormRepo) -> Form {
        let mut form = Form::new(
            Uuid::now_v7(),
            "Test Form".to_string(),
            None,
            serde_json::json!({}),
        )
        .unwrap();
        form.status = FormStatus::Published;
        repo.create_form(form.clone()).await.unwrap();
        form
    }

    #[tokio::test]
    async fn create_and_fetch_form_by_slug() {
        let repo = SqliteFormRepo::in_memory().await.unwrap();
        let form = seeded_form(&repo).await;

        let fetched = repo.get_form_by_slug(&form.slug).await.unwrap().unwrap();
        assert_eq!(fetched.id, form.id);
        assert_eq!(fetched.status, FormStatus::Published);
        assert_eq!(fetched.title, "Test Form");
    }

    #[tokio::test]
    async fn fields_come_back_in_display_order() {
        let repo = SqliteFormRepo::in_memory().await.unwrap();
        let form = seeded_form(&repo).await;

        let second = FormField::new(form.id, draft(FieldType::ShortText, "b", 2)).unwrap();
        let first = FormField::new(form.id, draft(FieldType::Email, "a", 1)).unwrap();
        repo.create_field(second.clone()).await.unwrap();
        repo.create_field(first.clone()).await.unwrap();

        let fields = repo.list_fields(form.id).await.unwrap();
        assert_eq!(
            fields.iter().map(|f| f.id).collect::<Vec<_>>(),
            vec![first.id, second.id]
        );
        assert_eq!(fields[0].field_type, FieldType::Email);
    }

    #[tokio::test]
    async fn response_persistence_is_atomic() {
        let repo = SqliteFormRepo::in_memory().await.unwrap();
        let form = seeded_form(&repo).await;
        let field = FormField::new(form.id, draft(FieldType::ShortText, "name", 0)).unwrap();
        repo.create_field(field.clone()).await.unwrap();

        let response = FormResponse::new(form.id, None, "ip".into(), "ua".into());
        let good = ResponseAnswer::new(response.id, field.id, StoredValue::Scalar("ok".into()));
        // Second answer points at a field that does not exist, so the
        // foreign key rejects it after the response row is written.
        let bad = ResponseAnswer::new(response.id, Uuid::now_v7(), StoredValue::Scalar("x".into()));

        let err = repo
            .create_response(&form, response.clone(), vec![good, bad])
            .await;
        assert!(err.is_err());

        // Nothing from the failed submission is observable.
        assert_eq!(repo.count_responses(form.id).await.unwrap(), 0);
        assert!(repo.get_response(response.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn response_limit_is_rechecked_in_the_transaction() {
        let repo = SqliteFormRepo::in_memory().await.unwrap();
        let mut form = Form::new(Uuid::now_v7(), "Limited".to_string(), None, serde_json::json!({})).unwrap();
        form.status = FormStatus::Published;
        form.limit_responses = true;
        form.max_responses = Some(1);
        repo.create_form(form.clone()).await.unwrap();

        let first = FormResponse::new(form.id, None, "ip".into(), "ua".into());
        repo.create_response(&form, first, vec![]).await.unwrap();

        let second = FormResponse::new(form.id, None, "ip".into(), "ua".into());
        let err = repo.create_response(&form, second, vec![]).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<AppError>(), Some(AppError::FormClosed)));
        assert_eq!(repo.count_responses(form.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reorder_is_all_or_nothing_and_form_scoped() {
        let repo = SqliteFormRepo::in_memory().await.unwrap();
        let form = seeded_form(&repo).await;
        let other_form = seeded_form(&repo).await;

        let mine = FormField::new(form.id, draft(FieldType::ShortText, "mine", 0)).unwrap();
        let theirs = FormField::new(other_form.id, draft(FieldType::ShortText, "theirs", 0)).unwrap();
        repo.create_field(mine.clone()).await.unwrap();
        repo.create_field(theirs.clone()).await.unwrap();

        let err = repo
            .reorder_fields(form.id, vec![(mine.id, 5), (theirs.id, 6)])
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AppError>(),
            Some(AppError::OwnershipViolation { .. })
        ));

        // The batch rolled back, so the first field kept its old order.
        let fields = repo.list_fields(form.id).await.unwrap();
        assert_eq!(fields[0].order, 0);

        repo.reorder_fields(form.id, vec![(mine.id, 5)]).await.unwrap();
        let fields = repo.list_fields(form.id).await.unwrap();
        assert_eq!(fields[0].order, 5);
    }

    #[tokio::test]
    async fn duplicate_copies_fields_but_not_responses() {
        let repo = SqliteFormRepo::in_memory().await.unwrap();
        let form = seeded_form(&repo).await;
        for i in 0..3 {
            let f = FormField::new(form.id, draft(FieldType::ShortText, &format!("q{i}"), i)).unwrap();
            repo.create_field(f).await.unwrap();
        }
        for _ in 0..5 {
            let r = FormResponse::new(form.id, None, "ip".into(), "ua".into());
            repo.create_response(&form, r, vec![]).await.unwrap();
        }

        let fields = repo.list_fields(form.id).await.unwrap();
        let copy = form.duplicate();
        let copied_fields: Vec<FormField> =
            fields.iter().map(|f| f.duplicate_for(copy.id)).collect();
        repo.create_form_with_fields(copy.clone(), copied_fields).await.unwrap();

        let new_fields = repo.list_fields(copy.id).await.unwrap();
        assert_eq!(new_fields.len(), 3);
        assert!(new_fields.iter().all(|f| fields.iter().all(|o| o.id != f.id)));
        assert_eq!(repo.count_responses(copy.id).await.unwrap(), 0);
        assert_eq!(repo.count_responses(form.id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn grid_answers_round_trip_through_storage() {
        use ef_core::value::{GridMap, GridSelection};

        let repo = SqliteFormRepo::in_memory().await.unwrap();
        let form = seeded_form(&repo).await;
        let field = FormField::new(
            form.id,
            FieldDraft {
                rows: Some(vec!["Row 1".to_string(), "Row 2".to_string()]),
                columns: Some(vec!["A".to_string(), "B".to_string()]),
                ..draft(FieldType::CheckboxGrid, "grid", 0)
            },
        )
        .unwrap();
        repo.create_field(field.clone()).await.unwrap();

        let grid = StoredValue::Grid(GridMap::from([
            ("Row 1".to_string(), GridSelection::Many(vec!["A".into(), "B".into()])),
            ("Row 2".to_string(), GridSelection::Many(vec!["A".into()])),
        ]));
        let response = FormResponse::new(form.id, None, "ip".into(), "ua".into());
        let answer = ResponseAnswer::new(response.id, field.id, grid.clone());
        repo.create_response(&form, response.clone(), vec![answer]).await.unwrap();

        let (_, answers) = repo.get_response(response.id).await.unwrap().unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].value, grid);
    }

    #[tokio::test]
    async fn deleting_a_field_cascades_to_its_answers() {
        let repo = SqliteFormRepo::in_memory().await.unwrap();
        let form = seeded_form(&repo).await;
        let field = FormField::new(form.id, draft(FieldType::ShortText, "q", 0)).unwrap();
        repo.create_field(field.clone()).await.unwrap();

        let response = FormResponse::new(form.id, None, "ip".into(), "ua".into());
        let answer = ResponseAnswer::new(response.id, field.id, StoredValue::Scalar("v".into()));
        repo.create_response(&form, response.clone(), vec![answer]).await.unwrap();

        repo.delete_field(field.id).await.unwrap();
        let (_, answers) = repo.get_response(response.id).await.unwrap().unwrap();
        assert!(answers.is_empty());
    }

    #[tokio::test]
    async fn list_forms_filters_by_status_and_search() {
        let repo = SqliteFormRepo::in_memory().await.unwrap();
        let owner = Uuid::now_v7();
        let mut survey = Form::new(owner, "Customer Survey".to_string(), None, serde_json::json!({})).unwrap();
        survey.status = FormStatus::Published;
        let rsvp = Form::new(owner, "Party RSVP".to_string(), None, serde_json::json!({})).unwrap();
        repo.create_form(survey.clone()).await.unwrap();
        repo.create_form(rsvp.clone()).await.unwrap();

        let published = repo
            .list_forms(owner, FormFilter { status: Some(FormStatus::Published), search: None })
            .await
            .unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].id, survey.id);

        let found = repo
            .list_forms(owner, FormFilter { status: None, search: Some("survey".to_string()) })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, survey.id);

        let stranger = repo.list_forms(Uuid::now_v7(), FormFilter::default()).await.unwrap();
        assert!(stranger.is_empty());
    }
}
