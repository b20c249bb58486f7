//! SQLite implementation of the LearnerResultRepository.

use async_trait::async_trait;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeMap;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{LearnerResult, ProjectId, Step, StepBudget, TestNo};
use crate::domain::ports::LearnerResultRepository;

use super::{parse_datetime, parse_json, parse_optional_json};

const RESULT_COLUMNS: &str = "project_id, test_no, user_id, config, alphabet, created_at";
const STEP_COLUMNS: &str = "test_no, step_no, hypothesis, counter_example, statistics, error_text, algorithm_information, eq_oracle, step_budget";

/// Stores results and steps in two tables; JSON columns hold nested values.
#[derive(Clone)]
pub struct SqliteLearnerResultRepository {
    pool: SqlitePool,
}

impl SqliteLearnerResultRepository {
    /// Repository over an already migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_steps(
        &self,
        project_id: ProjectId,
        test_no: Option<TestNo>,
    ) -> DomainResult<BTreeMap<TestNo, Vec<Step>>> {
        let filter = if test_no.is_some() { " AND test_no = ?" } else { "" };
        let sql = format!(
            "SELECT {STEP_COLUMNS} FROM learner_result_steps WHERE project_id = ?{filter} ORDER BY test_no, step_no"
        );
        let mut query = sqlx::query_as::<_, StepRow>(&sql).bind(project_id);
        if let Some(test_no) = test_no {
            query = query.bind(test_no);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut steps: BTreeMap<TestNo, Vec<Step>> = BTreeMap::new();
        for row in rows {
            let test_no = row.test_no;
            steps.entry(test_no).or_default().push(row.try_into()?);
        }
        Ok(steps)
    }

    async fn assemble(&self, row: ResultRow) -> DomainResult<LearnerResult> {
        let mut steps = self.load_steps(row.project_id, Some(row.test_no)).await?;
        let test_no = row.test_no;
        row.into_result(steps.remove(&test_no).unwrap_or_default())
    }
}

#[async_trait]
impl LearnerResultRepository for SqliteLearnerResultRepository {
    async fn create_result(&self, result: &LearnerResult) -> DomainResult<LearnerResult> {
        let config_json = serde_json::to_string(&result.config)?;
        let alphabet_json = serde_json::to_string(&result.alphabet)?;

        let mut tx = self.pool.begin().await?;
        let (test_no,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(test_no), 0) + 1 FROM learner_results WHERE project_id = ?",
        )
        .bind(result.project_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(&format!(
            "INSERT INTO learner_results ({RESULT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)"
        ))
        .bind(result.project_id)
        .bind(test_no)
        .bind(result.user_id)
        .bind(&config_json)
        .bind(&alphabet_json)
        .bind(result.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for step in &result.steps {
            upsert_step_row(&mut *tx, result.project_id, test_no, step).await?;
        }
        tx.commit().await?;

        let mut stored = result.clone();
        stored.test_no = test_no;
        stored.refresh_summary();
        Ok(stored)
    }

    async fn save_step(
        &self,
        project_id: ProjectId,
        test_no: TestNo,
        step: &Step,
    ) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM learner_results WHERE project_id = ? AND test_no = ?")
                .bind(project_id)
                .bind(test_no)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(DomainError::ResultNotFound {
                project_id,
                test_no,
            });
        }

        let (last,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(step_no), 0) FROM learner_result_steps WHERE project_id = ? AND test_no = ?",
        )
        .bind(project_id)
        .bind(test_no)
        .fetch_one(&mut *tx)
        .await?;
        if i64::from(step.step_no) > last + 1 {
            return Err(DomainError::ValidationFailed(format!(
                "step {} would leave a gap after step {last}",
                step.step_no
            )));
        }

        upsert_step_row(&mut *tx, project_id, test_no, step).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_latest(&self, project_id: ProjectId) -> DomainResult<Option<LearnerResult>> {
        let row: Option<ResultRow> = sqlx::query_as(&format!(
            "SELECT {RESULT_COLUMNS} FROM learner_results WHERE project_id = ? ORDER BY test_no DESC LIMIT 1"
        ))
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => self.assemble(row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn get(
        &self,
        project_id: ProjectId,
        test_no: TestNo,
    ) -> DomainResult<Option<LearnerResult>> {
        let row: Option<ResultRow> = sqlx::query_as(&format!(
            "SELECT {RESULT_COLUMNS} FROM learner_results WHERE project_id = ? AND test_no = ?"
        ))
        .bind(project_id)
        .bind(test_no)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => self.assemble(row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn list(&self, project_id: ProjectId) -> DomainResult<Vec<LearnerResult>> {
        let rows: Vec<ResultRow> = sqlx::query_as(&format!(
            "SELECT {RESULT_COLUMNS} FROM learner_results WHERE project_id = ? ORDER BY test_no"
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        let mut steps = self.load_steps(project_id, None).await?;
        rows.into_iter()
            .map(|row| {
                let test_no = row.test_no;
                row.into_result(steps.remove(&test_no).unwrap_or_default())
            })
            .collect()
    }

    async fn delete(&self, project_id: ProjectId, test_nos: &[TestNo]) -> DomainResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for test_no in test_nos {
            let result =
                sqlx::query("DELETE FROM learner_results WHERE project_id = ? AND test_no = ?")
                    .bind(project_id)
                    .bind(test_no)
                    .execute(&mut *tx)
                    .await?;
            removed += result.rows_affected();
        }
        tx.commit().await?;
        Ok(removed)
    }
}

async fn upsert_step_row(
    conn: &mut SqliteConnection,
    project_id: ProjectId,
    test_no: TestNo,
    step: &Step,
) -> DomainResult<()> {
    let hypothesis_json = step.hypothesis.as_ref().map(serde_json::to_string).transpose()?;
    let counter_example_json = step
        .counter_example
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let statistics_json = serde_json::to_string(&step.statistics)?;
    let eq_oracle_json = serde_json::to_string(&step.eq_oracle)?;

    sqlx::query(
        r#"INSERT INTO learner_result_steps (project_id, test_no, step_no, hypothesis, counter_example, statistics, error_text, algorithm_information, eq_oracle, step_budget)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
           ON CONFLICT (project_id, test_no, step_no) DO UPDATE SET
               hypothesis = excluded.hypothesis,
               counter_example = excluded.counter_example,
               statistics = excluded.statistics,
               error_text = excluded.error_text,
               algorithm_information = excluded.algorithm_information,
               eq_oracle = excluded.eq_oracle,
               step_budget = excluded.step_budget"#,
    )
    .bind(project_id)
    .bind(test_no)
    .bind(i64::from(step.step_no))
    .bind(&hypothesis_json)
    .bind(&counter_example_json)
    .bind(&statistics_json)
    .bind(&step.error_text)
    .bind(&step.algorithm_information)
    .bind(&eq_oracle_json)
    .bind(step.step_budget.value())
    .execute(conn)
    .await?;

    Ok(())
}

#[derive(sqlx::FromRow)]
struct ResultRow {
    project_id: i64,
    test_no: i64,
    user_id: i64,
    config: String,
    alphabet: String,
    created_at: String,
}

impl ResultRow {
    fn into_result(self, steps: Vec<Step>) -> DomainResult<LearnerResult> {
        let mut result = LearnerResult {
            project_id: self.project_id,
            test_no: self.test_no,
            user_id: self.user_id,
            config: parse_json(&self.config)?,
            alphabet: parse_json(&self.alphabet)?,
            steps,
            hypothesis: None,
            statistics: Default::default(),
            created_at: parse_datetime(&self.created_at)?,
        };
        result.refresh_summary();
        Ok(result)
    }
}

#[derive(sqlx::FromRow)]
struct StepRow {
    test_no: i64,
    step_no: i64,
    hypothesis: Option<String>,
    counter_example: Option<String>,
    statistics: String,
    error_text: Option<String>,
    algorithm_information: String,
    eq_oracle: String,
    step_budget: i64,
}

impl TryFrom<StepRow> for Step {
    type Error = DomainError;

    fn try_from(row: StepRow) -> Result<Self, Self::Error> {
        let step_no = u32::try_from(row.step_no).map_err(|_| {
            DomainError::SerializationError(format!("Invalid step number: {}", row.step_no))
        })?;

        Ok(Step {
            step_no,
            hypothesis: parse_optional_json(row.hypothesis)?,
            counter_example: parse_optional_json(row.counter_example)?,
            statistics: parse_json(&row.statistics)?,
            error_text: row.error_text,
            algorithm_information: row.algorithm_information,
            eq_oracle: parse_json(&row.eq_oracle)?,
            step_budget: StepBudget::new(row.step_budget)
                .map_err(|e| DomainError::SerializationError(e.to_string()))?,
        })
    }
}
