use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::draw::DrawRecord;

pub const DEFAULT_API_URL: &str = "https://www.dhlottery.co.kr/common.do";
pub const DEFAULT_TIMEOUT_SECS: u64 = 12;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 6;

/// Round 1 was drawn on this Saturday; one round per week since.
const FIRST_DRAW_DATE: (i32, u32, u32) = (2002, 12, 7);

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent("dhlotto-sync/0.1")
        .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
        .build()
        .expect("failed to build HTTP client")
});

/// Supplies draw records, or signals unavailability with `None`. Network,
/// parse, and validation failures all map to `None`: "not yet drawn" is an
/// expected condition, never an error. A `Some` result always satisfies the
/// `DrawRecord` invariants.
#[async_trait]
pub trait DrawSource: Send + Sync {
    async fn fetch_latest(&self) -> Option<DrawRecord>;
    async fn fetch_by_round(&self, round: u32) -> Option<DrawRecord>;
}

pub struct HttpDrawSource {
    api_url: String,
    timeout: Duration,
}

impl HttpDrawSource {
    pub fn new(api_url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            api_url: api_url.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    async fn request_round(&self, round: u32) -> Result<DrawRecord> {
        let url = format!("{}?method=getLottoNumber&drwNo={round}", self.api_url);
        let response = HTTP_CLIENT
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("failed GET request: {url}"))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("failed reading response body: {url}"))?;
        if !status.is_success() {
            let preview: String = body.chars().take(180).collect();
            return Err(anyhow!("GET {url} returned {status}: {preview}"));
        }
        let payload: LottoApiResponse =
            serde_json::from_str(&body).with_context(|| format!("invalid JSON response: {url}"))?;
        payload
            .into_record()
            .ok_or_else(|| anyhow!("round {round} not available upstream"))
    }
}

#[async_trait]
impl DrawSource for HttpDrawSource {
    /// Probes the round the draw calendar says should exist by now, stepping
    /// back one round on a miss (the current week's draw may not have
    /// happened yet).
    async fn fetch_latest(&self) -> Option<DrawRecord> {
        let expected = expected_round(Utc::now().date_naive());
        for round in [Some(expected), expected.checked_sub(1)]
            .into_iter()
            .flatten()
            .filter(|r| *r > 0)
        {
            if let Some(record) = self.fetch_by_round(round).await {
                return Some(record);
            }
        }
        None
    }

    async fn fetch_by_round(&self, round: u32) -> Option<DrawRecord> {
        match self.request_round(round).await {
            Ok(record) => {
                debug!("fetched round {}: {:?}", record.round, record.numbers);
                Some(record)
            }
            Err(err) => {
                warn!("round {round} unavailable: {err:#}");
                None
            }
        }
    }
}

/// Raw shape of the dhlottery getLottoNumber endpoint. All draw fields are
/// optional because a `returnValue` of "fail" omits them.
#[derive(Debug, Deserialize)]
struct LottoApiResponse {
    #[serde(rename = "returnValue")]
    return_value: String,
    #[serde(rename = "drwNo")]
    drw_no: Option<u32>,
    #[serde(rename = "drwtNo1")]
    drwt_no1: Option<u8>,
    #[serde(rename = "drwtNo2")]
    drwt_no2: Option<u8>,
    #[serde(rename = "drwtNo3")]
    drwt_no3: Option<u8>,
    #[serde(rename = "drwtNo4")]
    drwt_no4: Option<u8>,
    #[serde(rename = "drwtNo5")]
    drwt_no5: Option<u8>,
    #[serde(rename = "drwtNo6")]
    drwt_no6: Option<u8>,
    #[serde(rename = "bnusNo")]
    bnus_no: Option<u8>,
    #[serde(rename = "firstWinamnt")]
    first_winamnt: Option<u64>,
    #[serde(rename = "firstPrzwnerCo")]
    first_przwner_co: Option<u64>,
    #[serde(rename = "drwNoDate")]
    drw_no_date: Option<String>,
}

impl LottoApiResponse {
    fn into_record(self) -> Option<DrawRecord> {
        if self.return_value != "success" {
            return None;
        }
        let mut numbers = vec![
            self.drwt_no1?,
            self.drwt_no2?,
            self.drwt_no3?,
            self.drwt_no4?,
            self.drwt_no5?,
            self.drwt_no6?,
        ];
        numbers.sort_unstable();
        let record = DrawRecord {
            round: self.drw_no?,
            numbers,
            bonus_number: self.bnus_no?,
            first_prize: self.first_winamnt?,
            first_winners: self.first_przwner_co?,
            draw_date: format_draw_date(&self.drw_no_date?),
        };
        match record.validate() {
            Ok(()) => Some(record),
            Err(err) => {
                warn!("round {} failed validation: {err}", record.round);
                None
            }
        }
    }
}

/// Converts the upstream ISO date to the display locale, e.g. "2025-04-26"
/// to "2025년 04월 26일". Unparseable input passes through unchanged.
pub fn format_draw_date(raw: &str) -> String {
    match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        Ok(date) => format!(
            "{:04}년 {:02}월 {:02}일",
            date.year(),
            date.month(),
            date.day()
        ),
        Err(_) => raw.to_string(),
    }
}

/// Round the weekly draw calendar says should exist on `today`.
pub fn expected_round(today: NaiveDate) -> u32 {
    let first = NaiveDate::from_ymd_opt(FIRST_DRAW_DATE.0, FIRST_DRAW_DATE.1, FIRST_DRAW_DATE.2)
        .expect("valid first draw date");
    let days = (today - first).num_days();
    if days < 0 {
        return 1;
    }
    (days / 7) as u32 + 1
}
