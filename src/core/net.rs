// src/core/net.rs
//! Portal HTTP session: ASP.NET form login, then one query post per date.
//! Only transport lives here; the result page is handed back untouched.

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use tracing::{debug, info};

use crate::config::consts::{HTTP_TIMEOUT_SECS, LOGIN_LANDING, LOGIN_PATH, QUERY_PATH, USER_AGENT};
use crate::config::PortalCredentials;
use crate::core::html::input_value;
use crate::error::FetchError;

const LOGIN_FIELDS: [&str; 3] = ["__VIEWSTATE", "Account", "Pwd"];

pub struct PortalSession {
    client: Client,
    creds: PortalCredentials,
    logged_in: bool,
}

impl PortalSession {
    pub fn new(creds: PortalCredentials) -> Result<Self, FetchError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Transient(format!("http client init: {e}")))?;
        Ok(Self { client, creds, logged_in: false })
    }

    /// Drop the session so the next query logs in again.
    pub fn reset(&mut self) {
        self.logged_in = false;
    }

    pub fn login(&mut self) -> Result<(), FetchError> {
        let (account, password, auth) = match (
            self.creds.account.as_deref(),
            self.creds.password.as_deref(),
            self.creds.auth_password.as_deref(),
        ) {
            (Some(a), Some(p), Some(x)) => (a.to_string(), p.to_string(), x.to_string()),
            _ => return Err(FetchError::LoginRejected(s!("portal credentials not configured"))),
        };

        let url = self.url(LOGIN_PATH);
        info!("Logging in to portal...");
        let page = self.get(&url)?;

        let mut form = vec![
            ("__VIEWSTATE", hidden(&page, "__VIEWSTATE")?),
            ("__EVENTVALIDATION", hidden(&page, "__EVENTVALIDATION")?),
            ("Account", account),
            ("Pwd", password),
            ("AuthPwd", auth),
            ("btnLogin", s!("身份驗證")),
        ];
        if let Some(generator) = input_value(&page, "__VIEWSTATEGENERATOR") {
            form.push(("__VIEWSTATEGENERATOR", generator));
        }

        let resp = self.send(self.client.post(&url).form(&form))?;
        if !resp.url().as_str().contains(LOGIN_LANDING) {
            return Err(FetchError::LoginRejected(format!(
                "landed on {} instead of {LOGIN_LANDING}",
                resp.url()
            )));
        }
        self.logged_in = true;
        info!("Portal login ok");
        Ok(())
    }

    /// Fetch the summary sales page for one day.
    pub fn query_day(&mut self, date: NaiveDate) -> Result<String, FetchError> {
        if !self.logged_in {
            self.login()?;
        }
        let url = self.url(QUERY_PATH);
        let page = self.get(&url)?;
        self.check_session(&page)?;
        let date_str = date.format("%Y/%m/%d").to_string();

        let form = vec![
            ("__VIEWSTATE", hidden(&page, "__VIEWSTATE")?),
            ("__VIEWSTATEGENERATOR", hidden(&page, "__VIEWSTATEGENERATOR")?),
            ("__EVENTVALIDATION", hidden(&page, "__EVENTVALIDATION")?),
            ("__EVENTTARGET", s!()),
            ("__EVENTARGUMENT", s!()),
            ("__LASTFOCUS", s!()),
            ("ddlType", s!("1")),
            ("EcrDate1", date_str.clone()),
            ("EcrDate2", date_str),
            ("chkSum", s!("on")),
            ("GroupType", s!("RBtnPos")),
            ("btnSearch", s!("查詢")),
        ];
        debug!(%date, "posting sales query");
        let resp = self.send(self.client.post(&url).form(&form))?;
        let body = resp.text().map_err(|e| FetchError::Transient(e.to_string()))?;
        self.check_session(&body)?;
        Ok(body)
    }

    // An expired session is answered with the login form, status 200.
    fn check_session(&mut self, page: &str) -> Result<(), FetchError> {
        if is_login_page(page) {
            self.logged_in = false;
            return Err(FetchError::Transient(s!("portal session expired; login page returned")));
        }
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.creds.base_url.trim_end_matches('/'), path)
    }

    fn get(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.send(self.client.get(url))?;
        resp.text().map_err(|e| FetchError::Transient(e.to_string()))
    }

    fn send(&self, req: reqwest::blocking::RequestBuilder) -> Result<Response, FetchError> {
        let resp = req.send().map_err(|e| FetchError::Transient(e.to_string()))?;
        check_status(resp)
    }
}

fn check_status(resp: Response) -> Result<Response, FetchError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return Err(FetchError::Transient(format!("HTTP {} from {}", status.as_u16(), resp.url())));
    }
    Err(FetchError::Status { status: status.as_u16(), url: resp.url().to_string() })
}

/// The portal's login form: ASP.NET state plus the account and password inputs.
pub fn is_login_page(page: &str) -> bool {
    LOGIN_FIELDS.iter().all(|name| input_value(page, name).is_some())
}

// A form page without its state fields is usually an error page served with 200.
fn hidden(page: &str, name: &str) -> Result<String, FetchError> {
    input_value(page, name)
        .ok_or_else(|| FetchError::Transient(format!("form field {name} missing from portal page")))
}
