use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub tracing: TracingConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    pub jobs: JobsConfig,
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub reminders: RemindersConfig,
    #[serde(default)]
    pub scheduled_messages: ScheduledMessagesConfig,
    #[serde(default)]
    pub spotlight: SpotlightConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TracingConfig {
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default = "default_jwt_expiration_days")]
    pub expiration_days: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    #[serde(default)]
    pub cleanup: CleanupConfig,
    pub workers: WorkersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Seconds between cleanup passes
    #[serde(default = "default_cleanup_interval")]
    pub interval_seconds: u64,
    /// How long completed jobs are kept, in seconds
    #[serde(default = "default_completed_retention")]
    pub completed_retention_seconds: u64,
    /// How long failed jobs are kept, in seconds
    #[serde(default = "default_failed_retention")]
    pub failed_retention_seconds: u64,
    #[serde(default = "default_cleanup_batch_size")]
    pub batch_size: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_cleanup_interval(),
            completed_retention_seconds: default_completed_retention(),
            failed_retention_seconds: default_failed_retention(),
            batch_size: default_cleanup_batch_size(),
        }
    }
}

/// Named worker pools, each serving a list of job names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkersConfig {
    #[serde(flatten)]
    pub pools: HashMap<String, WorkerPoolConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    pub jobs: Vec<String>,
    pub count: u32,
    /// Per-run timeout in seconds
    #[serde(default = "default_job_timeout")]
    pub job_timeout: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: i32,
    #[serde(default = "default_base_retry_delay")]
    pub base_retry_delay_seconds: u64,
    #[serde(default = "default_retry_multiplier")]
    pub retry_backoff_multiplier: u64,
}

/// Cron expressions for the recurring jobs. Five-field expressions are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_document_expiry_cron")]
    pub document_expiry: String,
    #[serde(default = "default_scheduled_messages_cron")]
    pub scheduled_messages: String,
    #[serde(default = "default_spotlight_rotation_cron")]
    pub spotlight_rotation: String,
    #[serde(default = "default_consultation_reminders_cron")]
    pub consultation_reminders: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            document_expiry: default_document_expiry_cron(),
            scheduled_messages: default_scheduled_messages_cron(),
            spotlight_rotation: default_spotlight_rotation_cron(),
            consultation_reminders: default_consultation_reminders_cron(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemindersConfig {
    /// Days-until-expiry values that trigger a document reminder
    #[serde(default = "default_document_thresholds")]
    pub document_thresholds_days: Vec<i64>,
    #[serde(default = "default_document_lookahead")]
    pub document_lookahead_days: i64,
    #[serde(default = "default_dedup_window")]
    pub dedup_window_hours: i64,
    /// Minutes ahead of a consultation at which reminders fire
    #[serde(default = "default_consultation_leads")]
    pub consultation_leads_minutes: Vec<i64>,
    #[serde(default = "default_consultation_tolerance")]
    pub consultation_tolerance_minutes: i64,
    /// The band for a lead opens this many minutes past the lead
    #[serde(default = "default_consultation_band_offset")]
    pub consultation_band_offset_minutes: i64,
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            document_thresholds_days: default_document_thresholds(),
            document_lookahead_days: default_document_lookahead(),
            dedup_window_hours: default_dedup_window(),
            consultation_leads_minutes: default_consultation_leads(),
            consultation_tolerance_minutes: default_consultation_tolerance(),
            consultation_band_offset_minutes: default_consultation_band_offset(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledMessagesConfig {
    #[serde(default = "default_dispatch_batch_size")]
    pub batch_size: u64,
    /// Failed deliveries before a scheduled message is given up on
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
}

impl Default for ScheduledMessagesConfig {
    fn default() -> Self {
        Self {
            batch_size: default_dispatch_batch_size(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotlightConfig {
    #[serde(default = "default_spotlight_slots")]
    pub slots: u32,
    #[serde(default = "default_spotlight_lookback")]
    pub lookback_days: i64,
    #[serde(default = "default_candidate_pool")]
    pub candidate_pool: u64,
    #[serde(default)]
    pub copywriter: CopywriterConfig,
}

impl Default for SpotlightConfig {
    fn default() -> Self {
        Self {
            slots: default_spotlight_slots(),
            lookback_days: default_spotlight_lookback(),
            candidate_pool: default_candidate_pool(),
            copywriter: CopywriterConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CopywriterConfig {
    /// Built-in sentence template, no outbound calls
    #[default]
    Template,
    /// OpenAI-compatible chat completions endpoint
    OpenAi {
        api_key: String,
        #[serde(default = "default_copywriter_model")]
        model: String,
        #[serde(default = "default_copywriter_base_url")]
        base_url: String,
        #[serde(default = "default_copywriter_timeout")]
        timeout_seconds: u64,
    },
}

const fn default_jwt_expiration_days() -> u64 {
    7
}

const fn default_cleanup_interval() -> u64 {
    3600
}

const fn default_completed_retention() -> u64 {
    86_400
}

const fn default_failed_retention() -> u64 {
    604_800
}

const fn default_cleanup_batch_size() -> u64 {
    1000
}

const fn default_job_timeout() -> u32 {
    300
}

const fn default_max_retries() -> i32 {
    3
}

const fn default_base_retry_delay() -> u64 {
    30
}

const fn default_retry_multiplier() -> u64 {
    4
}

fn default_document_expiry_cron() -> String {
    "0 9 * * *".to_string()
}

fn default_scheduled_messages_cron() -> String {
    "* * * * *".to_string()
}

fn default_spotlight_rotation_cron() -> String {
    "10 0 * * *".to_string()
}

fn default_consultation_reminders_cron() -> String {
    "*/15 * * * *".to_string()
}

fn default_document_thresholds() -> Vec<i64> {
    vec![30, 7, 1]
}

const fn default_document_lookahead() -> i64 {
    30
}

const fn default_dedup_window() -> i64 {
    24
}

fn default_consultation_leads() -> Vec<i64> {
    vec![60, 1440]
}

const fn default_consultation_tolerance() -> i64 {
    15
}

const fn default_consultation_band_offset() -> i64 {
    5
}

const fn default_dispatch_batch_size() -> u64 {
    100
}

const fn default_max_attempts() -> i32 {
    5
}

const fn default_spotlight_slots() -> u32 {
    3
}

const fn default_spotlight_lookback() -> i64 {
    7
}

const fn default_candidate_pool() -> u64 {
    20
}

fn default_copywriter_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_copywriter_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

const fn default_copywriter_timeout() -> u64 {
    20
}
