use crate::models::CanonicalRecord;
use anyhow::{Context, Result};
use chrono::Utc;
use duckdb::{Connection, params};
use std::path::Path;
use tracing::info;

// ── Sink ──────────────────────────────────────────────────────────────────────

/// Ordered, append-only destination for emitted records.
pub trait RecordSink {
    fn append(&mut self, records: &[CanonicalRecord]) -> Result<()>;
}

// ── Schema ────────────────────────────────────────────────────────────────────

const DDL: &str = r#"
CREATE SEQUENCE IF NOT EXISTS scrape_run_seq START 1;

CREATE TABLE IF NOT EXISTS jobs (
    run_id            BIGINT    NOT NULL,
    job_id            VARCHAR,
    title             VARCHAR,
    company           VARCHAR,
    experience        VARCHAR,
    location          VARCHAR,
    -- JSON array, NULL when no skills listed
    skills            VARCHAR,
    salary            VARCHAR,
    job_type          VARCHAR,
    date_posted       VARCHAR,
    description_html  VARCHAR,
    description_text  VARCHAR,
    url               VARCHAR   NOT NULL,
    source            VARCHAR   NOT NULL,
    scraped_at        TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS scrape_runs (
    id                INTEGER PRIMARY KEY,
    started_at        TIMESTAMP NOT NULL,
    finished_at       TIMESTAMP,
    status            VARCHAR NOT NULL DEFAULT 'running',
    records_emitted   INTEGER DEFAULT 0,
    api_records       INTEGER DEFAULT 0,
    fallback_records  INTEGER DEFAULT 0,
    api_stop_reason   VARCHAR,
    error_msg         VARCHAR
);

CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER PRIMARY KEY,
    applied_at  TIMESTAMP NOT NULL
);
"#;

const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_jobs_run    ON jobs (run_id);
CREATE INDEX IF NOT EXISTS idx_jobs_source ON jobs (source);
"#;

/// Summary written to `scrape_runs` when a run ends.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub records_emitted: usize,
    pub api_records: usize,
    pub fallback_records: usize,
    pub api_stop_reason: Option<String>,
    pub error: Option<String>,
}

// ── Repository ────────────────────────────────────────────────────────────────

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {:?}", parent))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open DuckDB at {:?}", path))?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    pub fn run_migrations(&self) -> Result<()> {
        info!("Running migrations…");
        self.conn.execute_batch(DDL).context("DDL failed")?;
        self.conn.execute_batch(INDEXES).context("Index creation failed")?;
        self.conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, ?)",
            params![Utc::now().naive_utc()],
        )?;
        info!("Migrations done.");
        Ok(())
    }

    // ── Jobs ──────────────────────────────────────────────────────────────────

    pub fn append_jobs(&self, run_id: i64, records: &[CanonicalRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().naive_utc();
        let tx = self.conn.unchecked_transaction()?;
        let sql = r#"
            INSERT INTO jobs
                (run_id, job_id, title, company, experience, location, skills, salary,
                 job_type, date_posted, description_html, description_text, url, source, scraped_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;

        for rec in records {
            let skills = rec
                .skills
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .context("serialise skills")?;
            tx.execute(sql, params![
                run_id,
                rec.job_id, rec.title, rec.company, rec.experience, rec.location,
                skills, rec.salary, rec.job_type, rec.date_posted,
                rec.description_html, rec.description_text,
                rec.url, rec.source.as_str(), now,
            ]).with_context(|| format!("insert job {}", rec.url))?;
        }

        tx.commit()?;
        Ok(records.len())
    }

    /// All stored jobs, oldest run first, in insertion order within a run.
    pub fn list_jobs(&self) -> Result<Vec<CanonicalRecord>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT job_id, title, company, experience, location, skills, salary, job_type,
                      date_posted, description_html, description_text, url, source
               FROM jobs ORDER BY run_id, rowid"#,
        )?;

        let rows = stmt.query_map([], |r| {
            Ok((
                (
                    r.get::<_, Option<String>>(0)?,
                    r.get::<_, Option<String>>(1)?,
                    r.get::<_, Option<String>>(2)?,
                    r.get::<_, Option<String>>(3)?,
                    r.get::<_, Option<String>>(4)?,
                    r.get::<_, Option<String>>(5)?,
                ),
                (
                    r.get::<_, Option<String>>(6)?,
                    r.get::<_, Option<String>>(7)?,
                    r.get::<_, Option<String>>(8)?,
                    r.get::<_, Option<String>>(9)?,
                    r.get::<_, Option<String>>(10)?,
                    r.get::<_, String>(11)?,
                    r.get::<_, String>(12)?,
                ),
            ))
        })?;

        let mut jobs = Vec::new();
        for row in rows {
            let (
                (job_id, title, company, experience, location, skills),
                (salary, job_type, date_posted, description_html, description_text, url, source),
            ) = row?;

            let skills = skills
                .as_deref()
                .map(serde_json::from_str::<Vec<String>>)
                .transpose()
                .with_context(|| format!("bad skills column for {}", url))?;

            jobs.push(CanonicalRecord {
                title,
                company,
                experience,
                location,
                skills,
                salary,
                job_type,
                date_posted,
                description_html,
                description_text,
                source: source.parse()?,
                url,
                job_id,
            });
        }
        Ok(jobs)
    }

    pub fn job_count(&self) -> Result<i64> {
        let mut s = self.conn.prepare("SELECT COUNT(*) FROM jobs")?;
        Ok(s.query_row([], |r| r.get(0))?)
    }

    pub fn count_by_source(&self) -> Result<Vec<(String, i64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT source, COUNT(*) FROM jobs GROUP BY source ORDER BY source")?;
        let counts = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(counts)
    }

    // ── Scrape run log ────────────────────────────────────────────────────────

    pub fn begin_scrape_run(&self) -> Result<i64> {
        let id: i64 = self
            .conn
            .query_row("SELECT nextval('scrape_run_seq')", [], |r| r.get(0))?;
        self.conn.execute(
            "INSERT INTO scrape_runs (id, started_at, status) VALUES (?, ?, 'running')",
            params![id, Utc::now().naive_utc()],
        )?;
        Ok(id)
    }

    pub fn finish_scrape_run(&self, run_id: i64, summary: &RunSummary) -> Result<()> {
        self.conn.execute(
            r#"UPDATE scrape_runs SET
               finished_at = ?, status = ?,
               records_emitted = ?, api_records = ?, fallback_records = ?,
               api_stop_reason = ?, error_msg = ?
               WHERE id = ?"#,
            params![
                Utc::now().naive_utc(),
                if summary.error.is_none() { "success" } else { "error" },
                summary.records_emitted as i64,
                summary.api_records as i64,
                summary.fallback_records as i64,
                summary.api_stop_reason,
                summary.error,
                run_id,
            ],
        )?;
        Ok(())
    }

    pub fn run_count(&self) -> Result<i64> {
        let mut s = self.conn.prepare("SELECT COUNT(*) FROM scrape_runs")?;
        Ok(s.query_row([], |r| r.get(0))?)
    }
}

/// Sink appending to the `jobs` table under one scrape run.
pub struct RunSink<'a> {
    repo: &'a Repository,
    run_id: i64,
}

impl<'a> RunSink<'a> {
    pub fn new(repo: &'a Repository, run_id: i64) -> Self {
        Self { repo, run_id }
    }
}

impl RecordSink for RunSink<'_> {
    fn append(&mut self, records: &[CanonicalRecord]) -> Result<()> {
        self.repo.append_jobs(self.run_id, records)?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
