//! TMB iTransit client.
//!
//! Fetches upcoming bus arrivals for a stop from the Barcelona TMB API and
//! converts them to the shared `TransitSnapshot` format.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::{Arrival, Error, TransitSnapshot, TransitSource};
use serde::Deserialize;
use tracing::debug;

const STOPS_URL: &str = "https://api.tmb.cat/v1/itransit/bus/parades";
/// Arrivals further in the past than this are ghosts left over in the feed.
const GHOST_CUTOFF_SECS: i64 = -30;

/// TMB iTransit API client.
#[derive(Debug, Clone)]
pub struct TmbClient {
    client: reqwest::Client,
    app_id: String,
    app_key: String,
}

/// Response from `/itransit/bus/parades/{stop}`.
#[derive(Debug, Deserialize)]
pub struct StopResponse {
    /// Server time in epoch milliseconds.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub parades: Vec<Parada>,
}

#[derive(Debug, Deserialize)]
pub struct Parada {
    #[serde(default)]
    pub nom_parada: Option<String>,
    #[serde(default)]
    pub linies_trajectes: Vec<LiniaTrajecte>,
}

#[derive(Debug, Deserialize)]
pub struct LiniaTrajecte {
    #[serde(default)]
    pub nom_linia: String,
    #[serde(default)]
    pub desti_trajecte: String,
    #[serde(default)]
    pub propers_busos: Vec<ProperBus>,
}

#[derive(Debug, Deserialize)]
pub struct ProperBus {
    /// Estimated arrival in epoch milliseconds.
    pub temps_arribada: i64,
}

impl TmbClient {
    pub fn new(app_id: String, app_key: String, timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent("deskboard/0.1")
            .pool_max_idle_per_host(2)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("failed to build TMB HTTP client: {e}")))?;

        Ok(Self {
            client,
            app_id,
            app_key,
        })
    }

    /// Fetch the raw stop payload.
    pub async fn fetch_stop_response(&self, stop_id: &str) -> Result<StopResponse, Error> {
        let url = format!("{STOPS_URL}/{stop_id}");
        debug!("Fetching TMB arrivals for stop {}", stop_id);

        let resp = self
            .client
            .get(&url)
            .query(&[("app_id", self.app_id.as_str()), ("app_key", self.app_key.as_str())])
            .send()
            .await
            .map_err(|e| Error::Transit(format!("HTTP error for stop {stop_id}: {e}")))?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Transit(format!(
                "TMB returned {} for stop {}: {}",
                status,
                stop_id,
                body.chars().take(500).collect::<String>()
            )));
        }

        resp.json()
            .await
            .map_err(|e| Error::Transit(format!("JSON parse error for stop {stop_id}: {e}")))
    }
}

#[async_trait]
impl TransitSource for TmbClient {
    async fn fetch_stop(&self, stop_id: &str) -> Result<TransitSnapshot, Error> {
        let payload = self.fetch_stop_response(stop_id).await?;
        Ok(build_snapshot(stop_id, payload))
    }
}

/// An empty `parades` list is a valid "no buses" answer, not a failure.
fn build_snapshot(stop_id: &str, payload: StopResponse) -> TransitSnapshot {
    let mut stop_name = String::new();
    let mut arrivals = Vec::new();

    if let Some(parada) = payload.parades.first() {
        if let Some(name) = parada.nom_parada.as_deref() {
            stop_name = sanitize(name);
        }

        for linia in &parada.linies_trajectes {
            let destination = sanitize(&linia.desti_trajecte);
            for bus in &linia.propers_busos {
                let diff_secs = (bus.temps_arribada - payload.timestamp) / 1000;
                if diff_secs < GHOST_CUTOFF_SECS {
                    continue;
                }
                let eta_secs = diff_secs.max(0) as u32;
                arrivals.push(Arrival {
                    line: linia.nom_linia.clone(),
                    destination: destination.clone(),
                    eta_secs,
                    eta_text: eta_label(eta_secs),
                });
            }
        }
    }

    arrivals.sort_by_key(|a| a.eta_secs);

    debug!("Stop {}: {} upcoming arrivals", stop_id, arrivals.len());

    TransitSnapshot {
        stop_code: stop_id.to_string(),
        stop_name,
        arrivals,
        captured_at: Utc::now(),
    }
}

fn eta_label(eta_secs: u32) -> String {
    if eta_secs < 60 {
        "Prop".to_string()
    } else {
        format!("{} min", eta_secs / 60)
    }
}

/// Fold Catalan/Spanish accents to ASCII for the display font.
fn sanitize(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            'á' | 'à' => 'a',
            'Á' | 'À' => 'A',
            'é' | 'è' => 'e',
            'É' | 'È' => 'E',
            'í' | 'ï' => 'i',
            'Í' | 'Ï' => 'I',
            'ó' | 'ò' => 'o',
            'Ó' | 'Ò' => 'O',
            'ú' | 'ù' | 'ü' => 'u',
            'Ú' | 'Ü' => 'U',
            'ñ' => 'n',
            'Ñ' => 'N',
            'ç' => 'c',
            'Ç' => 'C',
            '·' => '.',
            other => other,
        })
        .collect()
}
