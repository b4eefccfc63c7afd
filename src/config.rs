use std::{env, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use url::Url;

use crate::error::Error;

pub const DEFAULT_MENU_URL: &str = "https://sejong.korea.ac.kr/dietMa/koreaSejong/artclView.do";

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub menu_url: Url,
    /// Directory holding `student_menu.json` and `staff_menu.json`.
    pub data_dir: PathBuf,
    pub fetch_timeout: Duration,
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> crate::Result<Self> {
        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = lookup("PORT").unwrap_or_else(|| "8080".to_string());
        let addr = SocketAddr::from_str(&format!("{host}:{port}"))
            .map_err(|e| Error::Config(format!("invalid HOST/PORT `{host}:{port}`: {e}")))?;

        let menu_url = lookup("MENU_URL").unwrap_or_else(|| DEFAULT_MENU_URL.to_string());
        let menu_url = Url::parse(&menu_url)
            .map_err(|e| Error::Config(format!("invalid MENU_URL `{menu_url}`: {e}")))?;

        let data_dir = lookup("MENU_DATA_DIR")
            .map_or_else(|| PathBuf::from("menu_data"), PathBuf::from);

        let fetch_timeout = match lookup("FETCH_TIMEOUT_SECS") {
            Some(secs) => secs
                .parse()
                .map(Duration::from_secs)
                .map_err(|e| Error::Config(format!("invalid FETCH_TIMEOUT_SECS `{secs}`: {e}")))?,
            None => Duration::from_secs(10),
        };

        Ok(Self {
            addr,
            menu_url,
            data_dir,
            fetch_timeout,
        })
    }
}
