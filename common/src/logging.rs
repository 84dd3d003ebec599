//! ロギング初期化
//!
//! 標準出力とアプリごとの日次JSONLファイルへ `tracing` イベントを出力する。

use crate::config::get_env_with_fallback_parse;
use chrono::{Local, NaiveDate};
use std::{
    env,
    fs::{self, OpenOptions},
    io::{self, Error, ErrorKind},
    path::PathBuf,
    sync::OnceLock,
};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_SUBDIR: &str = "logs";
const DEFAULT_DATA_DIR: &str = ".ollama-gate";
const DEFAULT_RETENTION_DAYS: u32 = 7;
const DATE_FORMAT: &str = "%Y-%m-%d";

const LOG_DIR_ENV: &str = "OLLAMA_GATE_LOG_DIR";
const LOG_LEVEL_ENV: &str = "OLLAMA_GATE_LOG_LEVEL";
const LOG_RETENTION_DAYS_ENV: &str = "OLLAMA_GATE_LOG_RETENTION_DAYS";
const DATA_DIR_ENV: &str = "OLLAMA_GATE_DATA_DIR";

static FILE_GUARD: OnceLock<Result<WorkerGuard, io::Error>> = OnceLock::new();

/// ログファイルの置き場所と保持期間
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// ファイル名の接頭辞（例: `"ollama-gate-node"`）
    pub app: String,
    pub dir: PathBuf,
    pub retention_days: u32,
}

impl LogSettings {
    /// 環境変数から組み立てる
    ///
    /// ディレクトリは `OLLAMA_GATE_LOG_DIR`、`$OLLAMA_GATE_DATA_DIR/logs`、
    /// `~/.ollama-gate/logs` の順に決まる。
    pub fn from_env(app: &str) -> io::Result<Self> {
        Ok(Self {
            app: app.to_string(),
            dir: resolve_dir()?,
            retention_days: get_env_with_fallback_parse(
                LOG_RETENTION_DAYS_ENV,
                "LOG_RETENTION_DAYS",
                DEFAULT_RETENTION_DAYS,
            ),
        })
    }

    fn prefix(&self) -> String {
        format!("{}.jsonl.", self.app)
    }

    /// 指定日のログファイルパス（`<app>.jsonl.YYYY-MM-DD`）
    pub fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}{}", self.prefix(), date.format(DATE_FORMAT)))
    }

    /// 保持期間より古い自アプリのログを削除し、削除数を返す
    ///
    /// 日付として読めないファイルには触れない。
    pub fn prune(&self, today: NaiveDate) -> io::Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }

        let cutoff = today - chrono::Duration::days(i64::from(self.retention_days));
        let prefix = self.prefix();
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let date = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix(&prefix))
                .and_then(|d| NaiveDate::parse_from_str(d, DATE_FORMAT).ok());
            if matches!(date, Some(date) if date < cutoff) && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn resolve_dir() -> io::Result<PathBuf> {
    if let Ok(dir) = env::var(LOG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(dir) = env::var(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir).join(LOG_SUBDIR));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map_err(|_| Error::new(ErrorKind::NotFound, "Failed to resolve home directory"))?;
    Ok(PathBuf::from(home).join(DEFAULT_DATA_DIR).join(LOG_SUBDIR))
}

/// ログ出力を初期化する
///
/// 2回目以降の呼び出しは最初の結果を返す。
pub fn init(app: &str) -> io::Result<()> {
    let result = FILE_GUARD.get_or_init(|| {
        LogSettings::from_env(app).and_then(|settings| install(&settings))
    });
    match result {
        Ok(_) => Ok(()),
        Err(err) => Err(io::Error::new(err.kind(), err.to_string())),
    }
}

fn install(settings: &LogSettings) -> io::Result<WorkerGuard> {
    fs::create_dir_all(&settings.dir)?;
    let today = Local::now().date_naive();
    let pruned = settings.prune(today)?;

    let log_path = settings.file_for(today);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;
    let (file_writer, guard) = non_blocking(file);

    // OLLAMA_GATE_LOG_LEVEL > RUST_LOG > info
    let env_filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_current_span(false)
        .with_span_list(false)
        .with_target(true)
        .with_file(false)
        .with_line_number(false);

    let stdout_layer = fmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(Error::other)?;

    tracing::info!(
        category = "system",
        app = %settings.app,
        path = %log_path.display(),
        pruned,
        "Logging initialized"
    );
    Ok(guard)
}
