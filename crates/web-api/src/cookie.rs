//! 会话凭证的 Cookie 传输
//!
//! Cookie 作用于整个站点、页面脚本不可读，过期时间与会话一致。
//! 删除时重新下发同名 Cookie，过期时间设为过去。

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use domain::{Session, Timestamp};
use time::OffsetDateTime;

#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub secure: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            name: "session_token".into(),
            secure: false,
        }
    }
}

impl CookieSettings {
    pub fn from_config(config: &config::SessionConfig) -> Self {
        Self {
            name: config.cookie_name.clone(),
            secure: config.secure_cookies,
        }
    }

    pub fn token<'a>(&self, jar: &'a CookieJar) -> Option<&'a str> {
        jar.get(&self.name)
            .map(|cookie| cookie.value())
            .filter(|value| !value.is_empty())
    }

    pub fn issue(&self, jar: CookieJar, session: &Session) -> CookieJar {
        jar.add(self.build(
            session.token.to_string(),
            to_offset(session.expires_at),
        ))
    }

    pub fn expire(&self, jar: CookieJar) -> CookieJar {
        jar.add(self.build(String::new(), OffsetDateTime::UNIX_EPOCH))
    }

    fn build(&self, value: String, expires: OffsetDateTime) -> Cookie<'static> {
        Cookie::build((self.name.clone(), value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .expires(expires)
            .build()
    }
}

fn to_offset(at: Timestamp) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(at.timestamp()).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}
