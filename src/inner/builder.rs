use crate::{Session, SessionStore};
use cookie::SameSite;
use rand::Rng;
use rand::distr::Alphanumeric;
use sha256::Sha256Digest;
use time::Duration;

/// How new session ids are produced.
#[derive(Debug, Clone)]
pub enum RandKey {
    Random(usize),
    UuidV4,
    UuidV7,
    RandomSha256(usize),
}

impl RandKey {
    pub fn generate(&self) -> String {
        match self {
            RandKey::Random(len) => random_alphanumeric(*len),
            RandKey::UuidV4 => uuid::Uuid::new_v4().to_string(),
            RandKey::UuidV7 => uuid::Uuid::now_v7().to_string(),
            RandKey::RandomSha256(len) => random_alphanumeric(*len).digest(),
        }
    }
}

fn random_alphanumeric(len: usize) -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Attributes of the session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieParams {
    pub path: String,
    pub domain: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
    pub max_age: Option<Duration>,
}

impl Default for CookieParams {
    fn default() -> Self {
        CookieParams {
            path: "/".to_string(),
            domain: "".to_string(),
            secure: true,
            http_only: true,
            same_site: Some(SameSite::Lax),
            max_age: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionBuilder {
    pub(crate) key: String,
    pub(crate) cookie: CookieParams,
    pub(crate) rand_key: RandKey,
    pub(crate) max_lifetime: Duration,
    pub(crate) gc_probability: u32,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        SessionBuilder {
            key: "session_key".to_string(),
            cookie: CookieParams::default(),
            rand_key: RandKey::UuidV7,
            max_lifetime: Duration::minutes(24),
            gc_probability: 1,
        }
    }
}

impl SessionBuilder {
    pub fn new() -> Self {
        SessionBuilder::default()
    }
    /// Defaults overridden by `SESSION_NAME`, `SESSION_COOKIE_PATH`,
    /// `SESSION_COOKIE_DOMAIN`, `SESSION_COOKIE_SECURE`, `SESSION_COOKIE_HTTPONLY`
    /// and `SESSION_MAX_LIFETIME` (seconds). Unparsable values are ignored.
    pub fn from_env() -> Self {
        let mut this = SessionBuilder::default();
        if let Ok(name) = std::env::var("SESSION_NAME") {
            this.key = name;
        }
        if let Ok(path) = std::env::var("SESSION_COOKIE_PATH") {
            this.cookie.path = path;
        }
        if let Ok(domain) = std::env::var("SESSION_COOKIE_DOMAIN") {
            this.cookie.domain = domain;
        }
        if let Some(secure) = env_parse::<bool>("SESSION_COOKIE_SECURE") {
            this.cookie.secure = secure;
        }
        if let Some(http_only) = env_parse::<bool>("SESSION_COOKIE_HTTPONLY") {
            this.cookie.http_only = http_only;
        }
        if let Some(seconds) = env_parse::<i64>("SESSION_MAX_LIFETIME") {
            this.max_lifetime = Duration::seconds(seconds);
        }
        this
    }
    pub fn key(mut self, key: &str) -> Self {
        self.key = key.to_string();
        self
    }
    pub fn path(mut self, path: &str) -> Self {
        self.cookie.path = path.to_string();
        self
    }
    pub fn domain(mut self, domain: &str) -> Self {
        self.cookie.domain = domain.to_string();
        self
    }
    pub fn secure(mut self, secure: bool) -> Self {
        self.cookie.secure = secure;
        self
    }
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.cookie.http_only = http_only;
        self
    }
    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.cookie.same_site = Some(same_site);
        self
    }
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.cookie.max_age = Some(max_age);
        self
    }
    /// Age after which stored sessions are eligible for garbage collection.
    pub fn max_lifetime(mut self, max_lifetime: Duration) -> Self {
        self.max_lifetime = max_lifetime;
        self
    }
    /// Percentage of `start()` calls that also run garbage collection.
    pub fn gc_probability(mut self, percent: u32) -> Self {
        assert!(percent <= 100, "gc probability is a percentage");
        self.gc_probability = percent;
        self
    }
    pub fn rand_key(mut self, rand_key: RandKey) -> Self {
        match rand_key {
            RandKey::Random(len) | RandKey::RandomSha256(len) => {
                assert!(len >= 32, "len must be at least 32");
                assert!(len < 1024, "len must be less than 1024");
            }
            RandKey::UuidV4 | RandKey::UuidV7 => {}
        }
        self.rand_key = rand_key;
        self
    }
    pub fn name(&self) -> &str {
        &self.key
    }
    pub fn cookie_params(&self) -> &CookieParams {
        &self.cookie
    }
    /// Wraps `store` in a session facade configured by this builder.
    pub fn build<S: SessionStore>(self, store: S) -> Session<S> {
        Session::new(store, self)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
