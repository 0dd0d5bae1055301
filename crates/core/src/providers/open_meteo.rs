use crate::error::{ConfigError, WeatherError};
use crate::models::WeatherSnapshot;
use crate::traits::WeatherProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Open-Meteo needs coordinates, so a place name is geocoded first.
pub struct OpenMeteoWeather {
    geocoding_url: String,
    forecast_url: String,
    client: Client,
}

impl OpenMeteoWeather {
    pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
        Self::with_endpoints(DEFAULT_GEOCODING_URL, DEFAULT_FORECAST_URL, timeout)
    }

    pub fn with_endpoints(
        geocoding_url: impl Into<String>,
        forecast_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            geocoding_url: geocoding_url.into(),
            forecast_url: forecast_url.into(),
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, WeatherError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(WeatherError::BackendResponse {
                backend: "open-meteo".to_string(),
                details: response.status().to_string(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|error| WeatherError::BackendResponse {
            backend: "open-meteo".to_string(),
            details: error.to_string(),
        })
    }

    async fn resolve(&self, location: &str) -> Result<GeoPlace, WeatherError> {
        let url = Url::parse_with_params(
            &self.geocoding_url,
            &[("name", location), ("count", "1"), ("format", "json")],
        )?;
        let parsed: GeocodingResponse = self.get_json(url).await?;
        parsed
            .results
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::UnknownLocation(location.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeoPlace>,
}

#[derive(Debug, Deserialize)]
struct GeoPlace {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentConditions,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    temperature_2m: f64,
    relative_humidity_2m: f64,
    #[serde(default)]
    precipitation: f64,
    #[serde(default)]
    weather_code: Option<u16>,
}

impl From<CurrentConditions> for WeatherSnapshot {
    fn from(value: CurrentConditions) -> Self {
        Self {
            temperature_c: value.temperature_2m,
            humidity_pct: value.relative_humidity_2m,
            description: value
                .weather_code
                .map(describe_weather_code)
                .unwrap_or("Unknown")
                .to_string(),
            rainfall_mm: value.precipitation,
        }
    }
}

/// WMO weather interpretation codes.
pub fn describe_weather_code(code: u16) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 | 48 => "Fog",
        51 | 53 | 55 => "Drizzle",
        56 | 57 => "Freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 | 67 => "Freezing rain",
        71 | 73 | 75 | 77 => "Snow",
        80..=82 => "Rain showers",
        85 | 86 => "Snow showers",
        95 => "Thunderstorm",
        96 | 99 => "Thunderstorm with hail",
        _ => "Unknown",
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoWeather {
    fn name(&self) -> &str {
        "open-meteo"
    }

    async fn current_weather(&self, location: &str) -> Result<WeatherSnapshot, WeatherError> {
        let place = self.resolve(location).await?;
        debug!(
            location,
            resolved = %place.name,
            latitude = place.latitude,
            longitude = place.longitude,
            "resolved weather location"
        );

        let url = Url::parse_with_params(
            &self.forecast_url,
            &[
                ("latitude", place.latitude.to_string()),
                ("longitude", place.longitude.to_string()),
                (
                    "current",
                    "temperature_2m,relative_humidity_2m,precipitation,weather_code".to_string(),
                ),
            ],
        )?;
        let forecast: ForecastResponse = self.get_json(url).await?;
        Ok(forecast.current.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_conditions_are_normalized() {
        let body = r#"{
            "latitude": 28.625,
            "longitude": 77.25,
            "current": {
                "time": "2024-07-01T09:00",
                "temperature_2m": 33.4,
                "relative_humidity_2m": 71,
                "precipitation": 0.6,
                "weather_code": 61
            }
        }"#;
        let parsed: ForecastResponse = serde_json::from_str(body).unwrap();
        let snapshot: WeatherSnapshot = parsed.current.into();

        assert_eq!(
            snapshot,
            WeatherSnapshot {
                temperature_c: 33.4,
                humidity_pct: 71.0,
                description: "Slight rain".to_string(),
                rainfall_mm: 0.6,
            }
        );
    }

    #[test]
    fn geocoding_without_results_is_empty() {
        let parsed: GeocodingResponse = serde_json::from_str(r#"{"generationtime_ms": 0.5}"#).unwrap();
        assert!(parsed.results.is_empty());
    }

    #[test]
    fn geocoding_picks_coordinates() {
        let body = r#"{"results":[{"id":1273294,"name":"Delhi","latitude":28.65195,"longitude":77.23149}]}"#;
        let parsed: GeocodingResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results[0].name, "Delhi");
        assert!((parsed.results[0].latitude - 28.65195).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_codes_have_a_description() {
        assert_eq!(describe_weather_code(3), "Overcast");
        assert_eq!(describe_weather_code(81), "Rain showers");
        assert_eq!(describe_weather_code(42), "Unknown");
    }
}
