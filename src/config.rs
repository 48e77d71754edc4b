//! CLI arguments, lock configuration document and defaults.

use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Deserialize;
use shadow_rs::formatcp;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

use crate::build;
use crate::endpoints::Endpoints;
use crate::error::LockError;
use crate::session::{DEFAULT_POLL_INTERVAL, LockTiming};
use crate::transport::{Credentials, DEFAULT_SESSION_COOKIE, LockTransport, Method};

const VERSION_INFO: &str = formatcp!(
    r#"{}\ncommit_hash: {}\nbuild_time: {}\nbuild_env: {},{}"#,
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    build::BUILD_TIME,
    build::RUST_VERSION,
    build::RUST_CHANNEL
);

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = DEFAULT_POLL_INTERVAL.as_secs();
pub const DEFAULT_TIME_UNTIL_EXPIRATION_SECS: f64 = 600.0;
pub const DEFAULT_TIME_UNTIL_WARNING_SECS: f64 = 540.0;
/// 锁时间参数的上限：一天。
pub const MAX_LOCK_TIMING_SECS: f64 = 86_400.0;
const CONFIG_ASSIGNMENT: &str = "DJANGO_LOCKING.config";

/// CLI arguments and environment configuration for the lock client.
#[derive(Parser, Debug)]
#[command(name = "edit-lock", version = VERSION_INFO, about = "Content edit-lock client")]
pub struct Args {
    #[command(flatten)]
    pub connection: ConnectionArgs,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Hold the edit lock for one object until interrupted, then release it.
    Watch(WatchArgs),
    /// Remove another user's lock after confirmation.
    ForceUnlock(ForceUnlockArgs),
}

#[derive(ClapArgs, Debug)]
pub struct ConnectionArgs {
    #[arg(
        short = 'u',
        long,
        global = true,
        env = "EDIT_LOCK_BASE_URL",
        help = "Base URL that relative lock URLs are resolved against"
    )]
    pub base_url: Option<String>,
    #[arg(
        short = 'c',
        long,
        global = true,
        env = "EDIT_LOCK_CONFIG",
        help = "Lock configuration file (JSON or the server's variables script)"
    )]
    pub config: Option<String>,
    #[arg(
        long,
        global = true,
        env = "EDIT_LOCK_CONFIG_URL",
        conflicts_with = "config",
        help = "URL serving the lock configuration"
    )]
    pub config_url: Option<String>,
    #[arg(
        long,
        global = true,
        env = "EDIT_LOCK_SESSION",
        help = "Admin session cookie value"
    )]
    pub session_cookie: Option<String>,
    #[arg(
        long,
        global = true,
        env = "EDIT_LOCK_COOKIE_NAME",
        default_value = DEFAULT_SESSION_COOKIE,
        help = "Admin session cookie name"
    )]
    pub cookie_name: String,
    #[arg(
        long,
        global = true,
        env = "EDIT_LOCK_CSRF_TOKEN",
        help = "CSRF token sent with POST requests"
    )]
    pub csrf_token: Option<String>,
    #[arg(
        short = 'y',
        long,
        global = true,
        help = "Answer yes to confirmation prompts"
    )]
    pub yes: bool,
}

impl ConnectionArgs {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            cookie_name: self.cookie_name.clone(),
            session: self.session_cookie.clone(),
            csrf_token: self.csrf_token.clone(),
        }
    }
}

#[derive(ClapArgs, Debug)]
pub struct WatchArgs {
    #[arg(long, env = "EDIT_LOCK_LOCK_URL", help = "Lock acquire/renew URL")]
    pub lock_url: Option<String>,
    #[arg(long, env = "EDIT_LOCK_STATUS_URL", help = "Lock status URL")]
    pub status_url: Option<String>,
    #[arg(long, env = "EDIT_LOCK_CLEAR_URL", help = "Own lock release URL")]
    pub clear_url: Option<String>,
    #[arg(long, env = "EDIT_LOCK_REMOVE_URL", help = "Lock removal URL template")]
    pub remove_url: Option<String>,
    #[arg(
        short = 'i',
        long,
        env = "EDIT_LOCK_POLL_INTERVAL_SECS",
        default_value_t = DEFAULT_POLL_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds between lock renewals"
    )]
    pub poll_interval_secs: u64,
    #[arg(
        long = "field",
        value_name = "NAME[:disabled]",
        help = "Form field to manage (repeatable)"
    )]
    pub fields: Vec<String>,
}

impl WatchArgs {
    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            lock: self.lock_url.clone(),
            lock_status: self.status_url.clone(),
            lock_clear: self.clear_url.clone(),
            lock_remove: self.remove_url.clone(),
        }
    }
}

#[derive(ClapArgs, Debug)]
pub struct ForceUnlockArgs {
    #[arg(long, help = "Object id carried by the lock badge")]
    pub lock_id: String,
    #[arg(long, help = "User currently holding the lock")]
    pub locked_by: String,
    #[arg(
        long,
        env = "EDIT_LOCK_REMOVE_URL",
        help = "Lock removal URL template ending in /0/lock_remove/"
    )]
    pub remove_url: Option<String>,
}

/// 服务端下发的锁配置（URL 与时间参数，单位秒）。
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LockConfig {
    #[serde(default)]
    pub urls: Endpoints,
    #[serde(default = "default_expiration")]
    pub time_until_expiration: f64,
    #[serde(default = "default_warning")]
    pub time_until_warning: f64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            urls: Endpoints::default(),
            time_until_expiration: DEFAULT_TIME_UNTIL_EXPIRATION_SECS,
            time_until_warning: DEFAULT_TIME_UNTIL_WARNING_SECS,
        }
    }
}

fn default_expiration() -> f64 {
    DEFAULT_TIME_UNTIL_EXPIRATION_SECS
}

fn default_warning() -> f64 {
    DEFAULT_TIME_UNTIL_WARNING_SECS
}

impl LockConfig {
    /// 解析纯 JSON，或 `DJANGO_LOCKING.config = {...}` 形式的变量脚本。
    pub fn parse(text: &str) -> Result<Self, LockError> {
        let trimmed = text.trim();
        let json = if trimmed.starts_with('{') {
            trimmed
        } else {
            let start = trimmed
                .find(CONFIG_ASSIGNMENT)
                .map(|index| &trimmed[index + CONFIG_ASSIGNMENT.len()..])
                .ok_or_else(|| LockError::Config("no lock configuration found".into()))?;
            start
                .trim_start()
                .strip_prefix('=')
                .ok_or_else(|| LockError::Config("malformed configuration assignment".into()))?
                .trim()
                .trim_end_matches(';')
                .trim_end()
        };
        serde_json::from_str(json)
            .map_err(|err| LockError::Config(format!("invalid lock configuration: {err}")))
    }

    pub async fn load(path: &Path) -> Result<Self, LockError> {
        let text = fs::read_to_string(path)
            .await
            .map_err(|err| LockError::Config(format!("{}: {err}", path.display())))?;
        Self::parse(&text)
    }

    /// 从服务端的配置脚本地址获取配置。
    pub async fn fetch(transport: &dyn LockTransport, url: &str) -> Result<Self, LockError> {
        let response = transport.fetch(Method::Get, url).await?;
        if let Some(err) = LockError::from_status(response.status) {
            return Err(LockError::Config(format!("{url}: {err}")));
        }
        Self::parse(&String::from_utf8_lossy(&response.body))
    }

    pub fn timing(&self, poll_interval: Duration) -> Result<LockTiming, LockError> {
        Ok(LockTiming {
            poll_interval,
            time_until_expiration: seconds(self.time_until_expiration, "time_until_expiration")?,
            time_until_warning: seconds(self.time_until_warning, "time_until_warning")?,
        })
    }
}

fn seconds(value: f64, key: &str) -> Result<Duration, LockError> {
    if value > MAX_LOCK_TIMING_SECS {
        return Err(LockError::Config(format!(
            "{key} must not exceed {MAX_LOCK_TIMING_SECS} seconds"
        )));
    }
    Duration::try_from_secs_f64(value)
        .map_err(|_| LockError::Config(format!("{key} must be a non-negative number of seconds")))
}

#[cfg(test)]
mod tests {
    use super::{Args, Command, LockConfig, MAX_LOCK_TIMING_SECS};
    use crate::endpoints::LockAction;
    use crate::error::LockError;
    use crate::test_support::ScriptedTransport;
    use clap::Parser;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    const SCRIPT: &str = r#"var DJANGO_LOCKING = (typeof window.DJANGO_LOCKING != 'undefined')
                   ? DJANGO_LOCKING : {};
DJANGO_LOCKING.config = {
    "urls": {
        "lock": "/admin/news/story/3/lock/",
        "lock_remove": "/admin/news/story/3/lock_remove/",
        "lock_clear": "/admin/news/story/3/lock_clear/",
        "lock_status": "/admin/news/story/3/lock_status/"
    },
    "time_until_expiration": 600,
    "time_until_warning": 540
};"#;

    #[test]
    fn parses_variables_script() {
        let config = LockConfig::parse(SCRIPT).expect("parse script");
        assert_eq!(config.urls.get(LockAction::Lock), Some("/admin/news/story/3/lock/"));
        assert_eq!(
            config.urls.get(LockAction::LockStatus),
            Some("/admin/news/story/3/lock_status/")
        );
        let timing = config.timing(Duration::from_secs(30)).expect("timing");
        assert_eq!(timing.time_until_expiration, Duration::from_secs(600));
        assert_eq!(timing.time_until_warning, Duration::from_secs(540));
    }

    #[test]
    fn parses_plain_json_with_defaults() {
        let config = LockConfig::parse(r#"{"urls": {"lock": "/a/1/lock/"}}"#).expect("parse json");
        assert_eq!(config.time_until_expiration, 600.0);
        assert_eq!(config.time_until_warning, 540.0);
        assert_eq!(config.urls.get(LockAction::LockClear), None);
    }

    #[test]
    fn rejects_unrecognised_documents() {
        assert!(LockConfig::parse("alert('hi');").is_err());
        assert!(LockConfig::parse("DJANGO_LOCKING.config {}").is_err());
        assert!(LockConfig::parse("{\"urls\": 3}").is_err());
        let negative = LockConfig {
            time_until_warning: -1.0,
            ..LockConfig::default()
        };
        assert!(negative.timing(Duration::from_secs(30)).is_err());
    }

    #[test]
    fn rejects_timing_beyond_one_day() {
        let config = LockConfig::parse(
            r#"{"urls": {"lock": "/a/1/lock/"}, "time_until_expiration": 1e19, "time_until_warning": 1e18}"#,
        )
        .expect("parse json");
        assert!(matches!(
            config.timing(Duration::from_secs(30)),
            Err(LockError::Config(_))
        ));

        let day = LockConfig {
            time_until_expiration: MAX_LOCK_TIMING_SECS,
            time_until_warning: MAX_LOCK_TIMING_SECS - 60.0,
            ..LockConfig::default()
        };
        let timing = day.timing(Duration::from_secs(30)).expect("one day is accepted");
        assert_eq!(timing.time_until_expiration, Duration::from_secs(86_400));
        assert_eq!(timing.warning_minutes(), 1);
    }

    #[tokio::test]
    async fn loads_from_file() {
        let mut file = NamedTempFile::new().expect("tempfile");
        file.write_all(SCRIPT.as_bytes()).expect("write config");
        let config = LockConfig::load(file.path()).await.expect("load");
        assert_eq!(config.urls.get(LockAction::LockClear), Some("/admin/news/story/3/lock_clear/"));
        assert!(LockConfig::load(&file.path().join("missing")).await.is_err());
    }

    #[tokio::test]
    async fn fetches_from_server() {
        let transport = ScriptedTransport::new();
        transport.respond("/locking/variables.js", 200, SCRIPT);
        transport.respond("/locking/missing.js", 404, "");
        let config = LockConfig::fetch(&transport, "/locking/variables.js")
            .await
            .expect("fetch");
        assert_eq!(config.urls.get(LockAction::LockRemove), Some("/admin/news/story/3/lock_remove/"));
        assert!(LockConfig::fetch(&transport, "/locking/missing.js").await.is_err());
    }

    #[test]
    fn cli_parses_watch_command() {
        let args = Args::try_parse_from([
            "edit-lock",
            "watch",
            "--lock-url",
            "/admin/news/story/3/lock/",
            "--field",
            "title",
            "--field",
            "slug:disabled",
            "--session-cookie",
            "abc",
        ])
        .expect("parse args");
        assert_eq!(args.connection.credentials().session.as_deref(), Some("abc"));
        match args.command {
            Command::Watch(watch) => {
                assert_eq!(watch.poll_interval_secs, 30);
                assert_eq!(watch.fields, vec!["title", "slug:disabled"]);
                assert_eq!(
                    watch.endpoints().get(LockAction::Lock),
                    Some("/admin/news/story/3/lock/")
                );
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_rejects_zero_interval() {
        assert!(
            Args::try_parse_from(["edit-lock", "watch", "--poll-interval-secs", "0"]).is_err()
        );
    }
}
