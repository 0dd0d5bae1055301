use crate::error::{ConfigError, WeatherError};
use crate::models::WeatherSnapshot;
use crate::traits::WeatherProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr};
use std::time::Duration;
use url::Url;

pub const DEFAULT_WTTR_URL: &str = "https://wttr.in";

/// wttr.in resolves the place name itself and reports numbers as strings.
pub struct WttrWeather {
    base_url: String,
    client: Client,
}

impl WttrWeather {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: base_url.into(),
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    fn request_url(&self, location: &str) -> Result<Url, WeatherError> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|()| WeatherError::BackendResponse {
                backend: "wttr.in".to_string(),
                details: format!("{} cannot be used as a base url", self.base_url),
            })?
            .pop_if_empty()
            .push(location);
        url.query_pairs_mut().append_pair("format", "j1");
        Ok(url)
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct WttrCondition {
    #[serde(rename = "temp_C")]
    #[serde_as(as = "DisplayFromStr")]
    temp_c: f64,
    #[serde_as(as = "DisplayFromStr")]
    humidity: f64,
    #[serde(rename = "weatherDesc", default)]
    weather_desc: Vec<WttrValue>,
    #[serde(rename = "precipMM")]
    #[serde_as(as = "Option<DisplayFromStr>")]
    precip_mm: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WttrValue {
    value: String,
}

#[derive(Debug, Deserialize)]
struct WttrResponse {
    #[serde(default)]
    current_condition: Vec<WttrCondition>,
}

fn to_snapshot(response: WttrResponse, location: &str) -> Result<WeatherSnapshot, WeatherError> {
    let current = response
        .current_condition
        .into_iter()
        .next()
        .ok_or_else(|| WeatherError::UnknownLocation(location.to_string()))?;

    let description = current
        .weather_desc
        .into_iter()
        .map(|desc| desc.value.trim().to_string())
        .find(|desc| !desc.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    Ok(WeatherSnapshot {
        temperature_c: current.temp_c,
        humidity_pct: current.humidity,
        description,
        rainfall_mm: current.precip_mm.unwrap_or(0.0),
    })
}

#[async_trait]
impl WeatherProvider for WttrWeather {
    fn name(&self) -> &str {
        "wttr.in"
    }

    async fn current_weather(&self, location: &str) -> Result<WeatherSnapshot, WeatherError> {
        let response = self.client.get(self.request_url(location)?).send().await?;

        if !response.status().is_success() {
            return Err(WeatherError::BackendResponse {
                backend: "wttr.in".to_string(),
                details: response.status().to_string(),
            });
        }

        let body = response.text().await?;
        let parsed: WttrResponse =
            serde_json::from_str(&body).map_err(|error| WeatherError::BackendResponse {
                backend: "wttr.in".to_string(),
                details: error.to_string(),
            })?;
        to_snapshot(parsed, location)
    }
}
