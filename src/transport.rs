//! HTTP 传输层：锁接口请求、会话 Cookie 与 CSRF 头。

use chrono::Utc;
use cookie::Cookie;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;

use crate::error::LockError;

pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub const DEFAULT_SESSION_COOKIE: &str = "sessionid";
pub const CSRF_COOKIE_NAME: &str = "csrftoken";
pub const CSRF_HEADER_NAME: &str = "X-CSRFToken";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// 原始 HTTP 响应：状态码与响应体。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// 锁接口的请求通道，网络失败返回 `LockError::Network`。
pub trait LockTransport: Send + Sync {
    fn fetch<'a>(
        &'a self,
        method: Method,
        url: &'a str,
    ) -> TransportFuture<'a, Result<RawResponse, LockError>>;
}

/// 访问后台所需的认证信息。
#[derive(Clone, Debug, Default)]
pub struct Credentials {
    pub cookie_name: String,
    pub session: Option<String>,
    pub csrf_token: Option<String>,
}

impl Credentials {
    fn cookie_header(&self) -> Option<String> {
        let mut pairs = Vec::new();
        if let Some(session) = self.session.as_deref().filter(|value| !value.is_empty()) {
            let name = if self.cookie_name.is_empty() {
                DEFAULT_SESSION_COOKIE
            } else {
                self.cookie_name.as_str()
            };
            pairs.push(Cookie::new(name, session).stripped().to_string());
        }
        if let Some(token) = self.csrf_token.as_deref().filter(|value| !value.is_empty()) {
            pairs.push(Cookie::new(CSRF_COOKIE_NAME, token).stripped().to_string());
        }
        if pairs.is_empty() {
            return None;
        }
        Some(pairs.join("; "))
    }
}

/// 基于 reqwest 的传输实现。
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Option<reqwest::Url>,
    csrf_token: Option<String>,
}

impl HttpTransport {
    /// 构建传输层；请求超时与轮询间隔一致。
    pub fn new(
        base_url: Option<&str>,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Self, LockError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-requested-with",
            HeaderValue::from_static("XMLHttpRequest"),
        );
        if let Some(cookies) = credentials.cookie_header() {
            let value = HeaderValue::from_str(&cookies)
                .map_err(|err| LockError::Config(format!("invalid cookie value: {err}")))?;
            headers.insert(COOKIE, value);
        }

        let base_url = base_url
            .map(reqwest::Url::parse)
            .transpose()
            .map_err(|err| LockError::Config(format!("invalid base url: {err}")))?;
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| LockError::Config(err.to_string()))?;

        Ok(Self {
            client,
            base_url,
            csrf_token: credentials.csrf_token.clone(),
        })
    }

    /// 解析接口地址（相对地址基于 base_url），并附加防缓存参数。
    pub fn resolve(&self, url: &str) -> Result<reqwest::Url, LockError> {
        let mut resolved = match &self.base_url {
            Some(base) => base.join(url),
            None => reqwest::Url::parse(url),
        }
        .map_err(|err| LockError::Config(format!("invalid url {url}: {err}")))?;
        resolved
            .query_pairs_mut()
            .append_pair("_", &Utc::now().timestamp_millis().to_string());
        Ok(resolved)
    }

    async fn send(&self, method: Method, url: &str) -> Result<RawResponse, LockError> {
        let url = self.resolve(url)?;
        let request = match method {
            Method::Get => self.client.get(url),
            Method::Post => {
                let mut request = self.client.post(url);
                if let Some(token) = self.csrf_token.as_deref() {
                    request = request.header(CSRF_HEADER_NAME, token);
                }
                request
            }
        };
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        debug!(?method, status, bytes = body.len(), "lock endpoint responded");
        Ok(RawResponse { status, body })
    }
}

impl LockTransport for HttpTransport {
    fn fetch<'a>(
        &'a self,
        method: Method,
        url: &'a str,
    ) -> TransportFuture<'a, Result<RawResponse, LockError>> {
        Box::pin(self.send(method, url))
    }
}
